use super::{ProcessState, SecondaryValues};
use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Holds the state of a deformation process
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeformationState {
    /// State of the execution
    pub process: ProcessState,

    /// Displacements (and other unknowns), ordered in DOF blocks
    pub uu: Vector,

    /// Cumulated increment of the unknowns within the current step
    pub duu: Vector,

    /// Unknowns at the end of the last accepted step
    pub last_time_step_solution: Vector,

    /// Unknowns at the beginning of the current coupling iteration
    pub last_coupling_iteration_solution: Option<Vector>,

    /// Fluid pressure at the beginning of the simulation (poromechanics coupling)
    pub initial_fluid_pressure: Option<Vector>,

    /// Trial secondary values (updated during the iterations)
    pub secondary: SecondaryValues,

    /// Secondary values at the end of the last accepted step
    pub secondary_committed: SecondaryValues,

    /// Norm of the residual of each DOF block at the first iteration
    pub norm_rr0: Vec<f64>,
}

impl DeformationState {
    /// Allocates a new instance
    pub fn new(process: ProcessState, dim: usize, secondary: SecondaryValues) -> Self {
        let ndof = process.ndof();
        DeformationState {
            process,
            uu: Vector::new(dim),
            duu: Vector::new(dim),
            last_time_step_solution: Vector::new(dim),
            last_coupling_iteration_solution: None,
            initial_fluid_pressure: None,
            secondary_committed: secondary.clone(),
            secondary,
            norm_rr0: vec![0.0; ndof],
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
