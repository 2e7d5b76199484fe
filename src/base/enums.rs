use serde::{Deserialize, Serialize};

/// Defines the physical layout of the sparse matrix values
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Storage {
    /// Compressed row storage
    Crs,

    /// Jagged diagonal storage
    ///
    /// Rows are permuted by decreasing number of entries and the values
    /// are stored diagonal by diagonal.
    Jds,
}

/// Defines how the nonlinear iteration error of a generic process is measured
///
/// The measure is evaluated separately for each DOF block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ErrorMethod {
    /// Euclidean norm of the iterative change relative to the Euclidean norm of the unknowns
    Enorm,

    /// Max norm of the iterative change relative to the max norm of the unknowns
    Lmax,

    /// Euclidean norm of the residual `b - A·u` relative to the Euclidean norm of `b`
    Bnorm,
}

/// Defines what happens when the nonlinear iterations diverge
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum DivergencePolicy {
    /// Rejects the step and retries with a reduced Δt
    ReduceStep,

    /// Stops the simulation with an error
    Abort,
}

/// Defines the time step size policy applied after an accepted step
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub enum StepAdaptation {
    /// Δt is given by the `dt(t)` function of the configuration
    Fixed,

    /// Δt grows when the nonlinear iterations converge quickly
    ///
    /// The growth factor is `clamp(n_optimal / n_iter, 1, growth_max)` where
    /// `n_iter` is the largest number of inner iterations in the step.
    IterationBased { n_optimal: usize, growth_max: f64 },

    /// Δt is controlled by the relative change of the unknowns within a step (PI controller)
    ///
    /// With `e` the largest relative change (over processes and DOF blocks) of the accepted
    /// step and `e_prev` the one of the previous step, the growth factor is
    ///
    /// ```text
    /// safety ⋅ (tol / e)^0.7 ⋅ (e_prev / tol)^0.4
    /// ```
    ///
    /// clamped to `[reduction_min, growth_max]`. The second term is omitted for the first
    /// step (or if `e_prev` vanishes). The step is not rejected when `e > tol`; only the
    /// next Δt is reduced.
    ErrorBased {
        tol: f64,
        safety: f64,
        growth_max: f64,
        reduction_min: f64,
    },
}
