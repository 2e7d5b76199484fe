use super::{ProcessState, SecondaryValues, SimContext};
use crate::base::SimError;
use crate::solver::{LinSolParams, SolverFailure};
use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Holds the reason for the divergence of the nonlinear iterations
#[derive(Clone, Debug, PartialEq)]
pub enum DivergenceReason {
    /// The maximum number of iterations has been reached
    MaxIterations,

    /// The errors grew beyond the allowed factor
    NormGrowth,

    /// The errors are NaN or Inf
    NanOrInf,

    /// The linear solver failed
    Solver(SolverFailure),
}

impl fmt::Display for DivergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceReason::MaxIterations => write!(f, "the maximum number of iterations has been reached"),
            DivergenceReason::NormGrowth => write!(f, "the errors grew beyond the allowed factor"),
            DivergenceReason::NanOrInf => write!(f, "found NaN or Inf"),
            DivergenceReason::Solver(failure) => write!(f, "{}", failure),
        }
    }
}

/// Holds the outcome of the nonlinear (inner) iterations of one process
#[derive(Clone, Debug, PartialEq)]
pub enum NonlinearOutcome {
    /// The iterations converged
    Converged { iterations: usize },

    /// The iterations diverged
    Diverged { iterations: usize, reason: DivergenceReason },
}

impl NonlinearOutcome {
    /// Returns the number of iterations
    pub fn iterations(&self) -> usize {
        match self {
            NonlinearOutcome::Converged { iterations } => *iterations,
            NonlinearOutcome::Diverged { iterations, .. } => *iterations,
        }
    }

    /// Returns true if the iterations converged
    pub fn converged(&self) -> bool {
        matches!(self, NonlinearOutcome::Converged { .. })
    }
}

/// Holds the data to restart a process
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessCheckpoint {
    /// Name of the process
    pub name: String,

    /// State of the execution
    pub state: ProcessState,

    /// Current solution
    pub solution: Vector,

    /// Solution at the end of the last accepted step
    pub last_time_step_solution: Vector,

    /// Committed secondary values (deformation processes)
    pub secondary: Option<SecondaryValues>,

    /// Fluid pressure at the beginning of the simulation (deformation processes)
    pub initial_fluid_pressure: Option<Vector>,
}

impl ProcessCheckpoint {
    /// Checks that the checkpoint can be restored into a process
    pub fn check(&self, name: &str, dim: usize) -> Result<(), SimError> {
        if self.name != name {
            return Err(SimError::Corruption("checkpoint belongs to another process"));
        }
        if self.solution.dim() != dim || self.last_time_step_solution.dim() != dim {
            return Err(SimError::Corruption("checkpoint solution has incompatible dimension"));
        }
        Ok(())
    }
}

/// Defines a process driven by the simulation (time and coupling loops)
///
/// A step runs as: `begin_step`, then for each coupling iteration `begin_coupling_iteration`
/// and `execute_nonlinear` (and `coupling_change` after the first coupling iteration),
/// then either `accept_step` or `reject_step`.
pub trait Process {
    /// Returns the (unique) name of the process
    fn name(&self) -> &str;

    /// Returns the state of the execution
    fn state(&self) -> &ProcessState;

    /// Returns the state of the execution (e.g., to record the coupling stage)
    fn state_mut(&mut self) -> &mut ProcessState;

    /// Returns the current solution
    fn solution(&self) -> &Vector;

    /// Starts a new step with time increment dt
    fn begin_step(&mut self, dt: f64);

    /// Starts a coupling iteration (1-based); snapshots the current iterate
    fn begin_coupling_iteration(&mut self, outer: usize);

    /// Runs the nonlinear iterations of the current coupling iteration
    fn execute_nonlinear(&mut self, context: &SimContext) -> Result<NonlinearOutcome, SimError>;

    /// Returns the maximum relative change (over the DOF blocks) of the solution
    /// w.r.t. the iterate at the beginning of the current coupling iteration
    fn coupling_change(&mut self) -> f64;

    /// Accepts the current step
    fn accept_step(&mut self);

    /// Rejects the current step and restores the solution of the last accepted step
    fn reject_step(&mut self);

    /// Replaces the linear solver
    fn reconfigure_solver(&mut self, params: &LinSolParams) -> Result<(), StrError>;

    /// Returns the name of the linear solver in use
    fn solver_name(&self) -> &str;

    /// Returns the data to restart the process
    fn checkpoint(&self) -> ProcessCheckpoint;

    /// Restores the process from a checkpoint
    fn restore(&mut self, checkpoint: &ProcessCheckpoint) -> Result<(), SimError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
