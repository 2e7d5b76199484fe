use super::{LinSolParams, SolverDirect, SolverKrylov};
use crate::StrError;
use russell_lab::Vector;
use thiserror::Error;

/// Holds the statistics of a linear solve
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveReport {
    /// Number of iterations (one for direct solvers)
    pub iterations: usize,

    /// Euclidean norm of the final residual `b - A·x`
    pub residual_norm: f64,
}

/// Defines the failures of a linear solver backend
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverFailure {
    /// The iterative solver reached the maximum number of iterations
    #[error("iterative solver did not converge after {iterations} iterations (‖r‖ = {residual_norm:e})")]
    NotConverged { iterations: usize, residual_norm: f64 },

    /// The iterative solver found a vanishing denominator
    #[error("iterative solver broke down at iteration {0}")]
    Breakdown(usize),

    /// The backend reported an error
    #[error("linear solver backend failed: {0}")]
    Backend(StrError),
}

impl From<StrError> for SolverFailure {
    fn from(message: StrError) -> Self {
        SolverFailure::Backend(message)
    }
}

/// Defines the interface to the linear solver backends
///
/// The system is handed over in CRS format (the export of a [crate::sparse::BlockMatrix]).
/// With `symmetric = true`, only the upper triangle is given.
pub trait LinSolAdapter {
    /// Configures the solver (tolerance, maximum iterations, preconditioner)
    fn configure(&mut self, params: &LinSolParams) -> Result<(), StrError>;

    /// Hands over the coefficient matrix in CRS format
    fn assemble_from(
        &mut self,
        values: &[f64],
        row_pointers: &[usize],
        col_indices: &[usize],
        symmetric: bool,
    ) -> Result<(), StrError>;

    /// Solves the linear system; `x` holds the initial guess on input
    fn solve(&mut self, rhs: &Vector, x: &mut Vector) -> Result<SolveReport, SolverFailure>;

    /// Returns the name of the backend for diagnostics
    fn name(&self) -> &str;
}

/// Allocates a new linear solver backend according to the parameters
pub fn new_lin_sol_adapter(params: &LinSolParams) -> Result<Box<dyn LinSolAdapter>, StrError> {
    let mut adapter: Box<dyn LinSolAdapter> = if params.is_direct() {
        Box::new(SolverDirect::new())
    } else {
        Box::new(SolverKrylov::new())
    };
    adapter.configure(params)?;
    Ok(adapter)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
