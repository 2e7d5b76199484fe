use crate::base::CONFIG_MIN_TOL;
use serde::{Deserialize, Serialize};

/// Defines the linear solver backends
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum SolverKind {
    /// Conjugate gradient method (symmetric positive-definite systems)
    Cg,

    /// Stabilized bi-conjugate gradient method (general systems)
    BiCgStab,

    /// Direct sparse solver UMFPACK (via russell_sparse)
    Umfpack,

    /// Direct sparse solver KLU (via russell_sparse)
    Klu,
}

/// Defines the preconditioners of the iterative solvers
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum PreconditionerKind {
    /// No preconditioning
    None,

    /// Diagonal (Jacobi) preconditioning
    Jacobi,
}

/// Holds the parameters of the linear solver
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct LinSolParams {
    /// Solver backend
    pub kind: SolverKind,

    /// Preconditioner (iterative solvers only)
    pub preconditioner: PreconditionerKind,

    /// Relative tolerance `‖b - A·x‖ ≤ tolerance · ‖b‖` (iterative solvers only)
    pub tolerance: f64,

    /// Maximum number of iterations (iterative solvers only)
    pub max_iterations: usize,
}

impl LinSolParams {
    /// Allocates a new instance with the preconditioned conjugate gradient method
    pub fn new() -> Self {
        LinSolParams {
            kind: SolverKind::Cg,
            preconditioner: PreconditionerKind::Jacobi,
            tolerance: 1e-12,
            max_iterations: 1_000,
        }
    }

    /// Allocates a new instance with the direct solver UMFPACK
    pub fn new_direct() -> Self {
        LinSolParams {
            kind: SolverKind::Umfpack,
            ..LinSolParams::new()
        }
    }

    /// Returns true if the backend is a direct solver
    pub fn is_direct(&self) -> bool {
        matches!(self.kind, SolverKind::Umfpack | SolverKind::Klu)
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.is_direct() {
            return None;
        }
        if self.tolerance < CONFIG_MIN_TOL {
            return Some(format!(
                "tolerance = {:?} is incorrect; it must be ≥ {:e}",
                self.tolerance, CONFIG_MIN_TOL
            ));
        }
        if self.max_iterations < 1 {
            return Some(format!(
                "max_iterations = {} is incorrect; it must be ≥ 1",
                self.max_iterations
            ));
        }
        None // all good
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
