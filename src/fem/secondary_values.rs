use serde::{Deserialize, Serialize};

/// Holds the secondary values (stresses and internal variables) of a deformation process
///
/// The layout of the buffers is defined by the constitutive collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecondaryValues {
    /// Stress components (e.g., per integration point)
    pub stress: Vec<f64>,

    /// Internal variables of the constitutive model
    pub internal_values: Vec<f64>,
}

impl SecondaryValues {
    /// Allocates a new instance with zeroed buffers
    pub fn new(n_stress: usize, n_internal_values: usize) -> Self {
        SecondaryValues {
            stress: vec![0.0; n_stress],
            internal_values: vec![0.0; n_internal_values],
        }
    }

    /// Allocates a new instance with empty buffers
    pub fn new_empty() -> Self {
        SecondaryValues::new(0, 0)
    }

    /// Copies the values from another instance with the same layout
    ///
    /// # Panics
    ///
    /// A panic will occur if the buffers have different lengths
    pub fn set(&mut self, other: &SecondaryValues) {
        self.stress.copy_from_slice(&other.stress);
        self.internal_values.copy_from_slice(&other.internal_values);
    }

    /// Returns true if both instances have the same layout
    pub fn same_layout(&self, other: &SecondaryValues) -> bool {
        self.stress.len() == other.stress.len() && self.internal_values.len() == other.internal_values.len()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
