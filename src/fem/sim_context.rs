use crate::StrError;
use russell_lab::Vector;
use std::collections::BTreeMap;

/// Holds the solution fields published by the processes of a simulation
///
/// A process reads the fields of the other processes by name;
/// there is no global registry of processes.
#[derive(Clone, Debug)]
pub struct SimContext {
    /// Maps process names to their latest published solution
    pub(crate) fields: BTreeMap<String, Vector>,
}

impl SimContext {
    /// Allocates a new (empty) instance
    pub fn new() -> Self {
        SimContext { fields: BTreeMap::new() }
    }

    /// Publishes (copies) the solution of a process
    pub fn publish(&mut self, name: &str, solution: &Vector) {
        match self.fields.get_mut(name) {
            Some(field) if field.dim() == solution.dim() => {
                field.as_mut_data().copy_from_slice(solution.as_data());
            }
            _ => {
                self.fields.insert(name.to_string(), solution.clone());
            }
        }
    }

    /// Returns a published field
    pub fn field(&self, name: &str) -> Result<&Vector, StrError> {
        self.fields.get(name).ok_or("field is not available in the context")
    }

    /// Returns true if the field has been published
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
