use super::ProcessState;
use crate::base::{ParamNonlinear, NORM_GUARD};
use russell_lab::{Norm, Vector};

/// Defines the outcome of the analysis of one nonlinear iteration
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConvergenceStatus {
    /// The errors are decreasing (or not yet small enough)
    Converging,

    /// All DOF blocks satisfy the tolerances
    Converged,

    /// The absolute error grew beyond the allowed factor
    Diverging,

    /// The errors are not finite
    FoundNanOrInf,
}

/// Controls the convergence of the nonlinear iterations of one process
///
/// A DOF block `d` is converged if `relative[d] ≤ tol[d]` or `absolute[d] ≤ tol_abs`.
/// The iterations are converged if all DOF blocks are converged.
///
/// The iterations diverge if the errors are NaN or Inf, or if the absolute error
/// of any DOF block grows beyond `divergence_growth` times its value at the first iteration.
pub struct ControlConvergence {
    /// Holds the relative tolerance of each DOF block
    tolerances: Vec<f64>,

    /// Holds the absolute tolerance
    tol_abs: f64,

    /// Holds the allowed growth of the absolute error
    divergence_growth: Option<f64>,

    /// Holds the absolute errors at the first iteration
    first_absolute: Vec<f64>,

    /// Holds the maximum relative error of each iteration of the current step
    history: Vec<f64>,

    /// Holds the outcome of the last analysis
    status: ConvergenceStatus,
}

impl ControlConvergence {
    /// Allocates a new instance
    pub fn new(param: &ParamNonlinear, ndof: usize) -> Self {
        ControlConvergence {
            tolerances: (0..ndof).map(|d| param.tolerance(d)).collect(),
            tol_abs: param.tol_abs,
            divergence_growth: param.divergence_growth,
            first_absolute: vec![0.0; ndof],
            history: Vec::new(),
            status: ConvergenceStatus::Converging,
        }
    }

    /// Resets the history for a new step
    pub fn reset(&mut self) {
        self.first_absolute.iter_mut().for_each(|x| *x = 0.0);
        self.history.clear();
        self.status = ConvergenceStatus::Converging;
    }

    /// Analyzes the errors stored in the state (at iteration `state.inner_iter`)
    pub fn analyze(&mut self, state: &ProcessState) -> ConvergenceStatus {
        let ndof = self.tolerances.len();
        let abs = &state.absolute_error;
        let rel = &state.relative_error;
        assert!(abs.len() == ndof && rel.len() == ndof);

        // check for NaN or Inf
        let found_nan_or_inf = abs.iter().chain(rel.iter()).any(|x| !x.is_finite());
        self.history.push(state.max_relative_error());
        if found_nan_or_inf {
            self.status = ConvergenceStatus::FoundNanOrInf;
            return self.status;
        }

        // record the first errors
        if state.inner_iter <= 1 {
            self.first_absolute.copy_from_slice(abs);
        }

        // check convergence
        let converged = (0..ndof).all(|d| rel[d] <= self.tolerances[d] || abs[d] <= self.tol_abs);

        // check divergence
        let diverging = match self.divergence_growth {
            Some(growth) if state.inner_iter > 1 => {
                (0..ndof).any(|d| abs[d] > growth * f64::max(self.first_absolute[d], NORM_GUARD))
            }
            _ => false,
        };

        // done
        self.status = if converged {
            ConvergenceStatus::Converged
        } else if diverging {
            ConvergenceStatus::Diverging
        } else {
            ConvergenceStatus::Converging
        };
        self.status
    }

    /// Returns the status of the last analysis
    pub fn status(&self) -> ConvergenceStatus {
        self.status
    }

    /// Returns the maximum relative error of each iteration of the current step
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Prints iteration data
    #[inline]
    pub fn print_iteration(&self, verbose: bool, state: &ProcessState, name: &str) {
        if !verbose {
            return;
        }
        let icon = match self.status {
            ConvergenceStatus::Converged => "✅",
            ConvergenceStatus::Converging => "👍",
            ConvergenceStatus::Diverging => "🥵",
            ConvergenceStatus::FoundNanOrInf => "😱",
        };
        println!(
            "{:>8} {:>13} {:>13} {:>5} {:>5} {:>8.2e}{} {}",
            ".",
            ".",
            ".",
            state.outer_iter,
            state.inner_iter,
            state.max_relative_error(),
            icon,
            name
        );
    }
}

/// Computes the norm of each DOF block of a vector
///
/// The vector is split into `ndof` contiguous blocks of equal length.
///
/// # Panics
///
/// A panic will occur if the dimension of the vector is not a multiple of ndof
pub fn dof_norms(v: &Vector, ndof: usize, norm: Norm) -> Vec<f64> {
    assert!(ndof > 0 && v.dim() % ndof == 0);
    let nrow = v.dim() / ndof;
    if nrow == 0 {
        return vec![0.0; ndof];
    }
    v.as_data()
        .chunks(nrow)
        .map(|block| match norm {
            Norm::Max => block.iter().fold(0.0, |acc, x| f64::max(acc, f64::abs(*x))),
            _ => block.iter().map(|x| x * x).sum::<f64>().sqrt(),
        })
        .collect()
}

/// Computes the relative errors (absolute / reference, guarded)
pub fn relative_errors(absolute: &[f64], reference: &[f64]) -> Vec<f64> {
    absolute
        .iter()
        .zip(reference)
        .map(|(a, r)| a / f64::max(*r, NORM_GUARD))
        .collect()
}

/// Computes the maximum over the DOF blocks of `‖u - u_ref‖ / ‖u‖` (Euclidean, guarded)
///
/// # Panics
///
/// A panic will occur if the dimensions differ or are not a multiple of ndof
pub fn max_relative_change(uu: &Vector, reference: &Vector, ndof: usize) -> f64 {
    assert!(ndof > 0 && uu.dim() == reference.dim() && uu.dim() % ndof == 0);
    let nrow = uu.dim() / ndof;
    if nrow == 0 {
        return 0.0;
    }
    uu.as_data()
        .chunks(nrow)
        .zip(reference.as_data().chunks(nrow))
        .map(|(u, r)| {
            let change = u.iter().zip(r).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt();
            let norm = u.iter().map(|a| a * a).sum::<f64>().sqrt();
            change / f64::max(norm, NORM_GUARD)
        })
        .fold(0.0, f64::max)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
