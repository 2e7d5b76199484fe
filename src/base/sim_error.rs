use crate::solver::SolverFailure;
use crate::StrError;
use thiserror::Error;

/// Defines the run-level errors of a simulation
///
/// Recoverable conditions (non-convergence, solver failures within the allowed
/// number) are handled by rejecting and retrying the step; hence only the
/// conditions below stop a simulation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SimError {
    /// Invalid input or configuration
    #[error("{0}")]
    Precondition(StrError),

    /// Stored data does not match the expected structure
    #[error("data corruption detected: {0}")]
    Corruption(StrError),

    /// The nonlinear iterations diverged and the divergence policy is to abort
    #[error("nonlinear iterations diverged at t = {t:?}")]
    Diverged { t: f64 },

    /// The step was rejected more times than allowed
    #[error("time step rejected after {retries} retries at t = {t:?}")]
    RetriesExhausted { retries: usize, t: f64 },

    /// The reduced Δt dropped below the minimum
    #[error("Δt = {dt:e} is smaller than the allowed minimum")]
    StepTooSmall { dt: f64 },

    /// The linear solver failed more times than allowed
    #[error("linear solver failed too many times: {0}")]
    Solver(SolverFailure),
}

impl From<StrError> for SimError {
    fn from(message: StrError) -> Self {
        SimError::Precondition(message)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
