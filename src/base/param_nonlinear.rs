use super::{ErrorMethod, CONFIG_MIN_TOL};
use serde::{Deserialize, Serialize};

/// Holds the parameters of the nonlinear (inner) iterations of one process
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParamNonlinear {
    /// Linear problem: a single iteration per step
    pub linear: bool,

    /// Maximum number of nonlinear iterations
    pub n_max_iterations: usize,

    /// Error measure of the iterations (generic processes)
    pub error_method: ErrorMethod,

    /// Relative tolerances (one value for all DOFs or one value per DOF)
    pub tolerances: Vec<f64>,

    /// Absolute tolerance; a DOF block with a smaller absolute error is converged
    pub tol_abs: f64,

    /// Relaxation coefficient of the iterative update; 0 < damping ≤ 1
    pub damping: f64,

    /// Flags divergence if the absolute error grows beyond this factor times its first value
    pub divergence_growth: Option<f64>,
}

impl ParamNonlinear {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        ParamNonlinear {
            linear: false,
            n_max_iterations: 20,
            error_method: ErrorMethod::Enorm,
            tolerances: vec![1e-8],
            tol_abs: 1e-12,
            damping: 1.0,
            divergence_growth: Some(1e6),
        }
    }

    /// Returns the relative tolerance of a DOF
    ///
    /// # Panics
    ///
    /// A panic will occur if the tolerance table is empty
    pub fn tolerance(&self, dof: usize) -> f64 {
        if self.tolerances.len() == 1 {
            self.tolerances[0]
        } else {
            self.tolerances[dof]
        }
    }

    /// Validates all data for a process with ndof DOF blocks
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self, ndof: usize) -> Option<String> {
        if self.n_max_iterations < 1 {
            return Some(format!(
                "n_max_iterations = {} is incorrect; it must be ≥ 1",
                self.n_max_iterations
            ));
        }
        if self.tolerances.len() != 1 && self.tolerances.len() != ndof {
            return Some(format!(
                "tolerances.len() = {} is incorrect; it must be 1 or ndof = {}",
                self.tolerances.len(),
                ndof
            ));
        }
        for tol in &self.tolerances {
            if *tol < CONFIG_MIN_TOL {
                return Some(format!(
                    "tolerance = {:?} is incorrect; it must be ≥ {:e}",
                    tol, CONFIG_MIN_TOL
                ));
            }
        }
        if self.tol_abs < 0.0 {
            return Some(format!("tol_abs = {:?} is incorrect; it must be ≥ 0.0", self.tol_abs));
        }
        if self.damping <= 0.0 || self.damping > 1.0 {
            return Some(format!(
                "damping = {:?} is incorrect; it must be 0.0 < d ≤ 1.0",
                self.damping
            ));
        }
        if let Some(growth) = self.divergence_growth {
            if growth <= 1.0 {
                return Some(format!(
                    "divergence_growth = {:?} is incorrect; it must be > 1.0",
                    growth
                ));
            }
        }
        None // all good
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
