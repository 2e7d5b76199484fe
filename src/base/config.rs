use super::{DivergencePolicy, StepAdaptation, CONFIG_MIN_DT_MIN, CONFIG_MIN_TOL};
use crate::solver::LinSolParams;
use crate::FnTime;

/// Holds the (time-loop and coupling-loop) options to control the simulation
pub struct Config {
    /// Initial time
    pub t_ini: f64,

    /// Final time
    pub t_fin: f64,

    /// Time increment function
    ///
    /// Gives the initial Δt and the Δt of every step if `step_adaptation` is Fixed
    pub dt: FnTime,

    /// Minimum allowed time increment min(Δt)
    pub dt_min: f64,

    /// Maximum allowed time increment max(Δt)
    pub dt_max: f64,

    /// Maximum number of (accepted) time steps
    pub n_max_time_steps: usize,

    /// Maximum number of coupling (outer) iterations
    pub n_max_coupling_iterations: usize,

    /// Tolerance of the maximum relative change over all coupled processes
    pub tol_coupling: f64,

    /// Time step size policy after an accepted step
    pub step_adaptation: StepAdaptation,

    /// Multiplier applied to Δt after a rejected step
    pub dt_reduction: f64,

    /// Maximum number of retries of a rejected step
    pub n_max_step_retries: usize,

    /// What to do if the nonlinear iterations diverge
    pub divergence_policy: DivergencePolicy,

    /// Also zeroes the column of prescribed equations (and corrects the right-hand side)
    pub also_eliminate_column: bool,

    /// Parameters of the linear solver
    pub lin_sol: LinSolParams,

    /// Parameters of the linear solver used after a solver failure
    pub lin_sol_fallback: Option<LinSolParams>,

    /// Maximum number of linear solver failures during the whole simulation
    pub n_max_solver_failures: usize,

    /// Verbose mode during timesteps
    pub verbose_timesteps: bool,

    /// Verbose mode during iterations
    pub verbose_iterations: bool,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            t_ini: 0.0,
            t_fin: 1.0,
            dt: |_| 0.1,
            dt_min: CONFIG_MIN_DT_MIN,
            dt_max: f64::MAX,
            n_max_time_steps: 1_000,
            n_max_coupling_iterations: 10,
            tol_coupling: 1e-6,
            step_adaptation: StepAdaptation::Fixed,
            dt_reduction: 0.5,
            n_max_step_retries: 5,
            divergence_policy: DivergencePolicy::ReduceStep,
            also_eliminate_column: false,
            lin_sol: LinSolParams::new(),
            lin_sol_fallback: None,
            n_max_solver_failures: 10,
            verbose_timesteps: false,
            verbose_iterations: false,
        }
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.t_ini < 0.0 {
            return Some(format!("t_ini = {:?} is incorrect; it must be ≥ 0.0", self.t_ini));
        }
        if self.t_fin <= self.t_ini {
            return Some(format!(
                "t_fin = {:?} is incorrect; it must be > t_ini = {:?}",
                self.t_fin, self.t_ini
            ));
        }
        if self.dt_min < CONFIG_MIN_DT_MIN {
            return Some(format!(
                "dt_min = {:?} is incorrect; it must be ≥ {:e}",
                self.dt_min, CONFIG_MIN_DT_MIN
            ));
        }
        if self.dt_max < self.dt_min {
            return Some(format!(
                "dt_max = {:?} is incorrect; it must be ≥ dt_min = {:?}",
                self.dt_max, self.dt_min
            ));
        }
        if self.n_max_time_steps < 1 {
            return Some(format!(
                "n_max_time_steps = {} is incorrect; it must be ≥ 1",
                self.n_max_time_steps
            ));
        }
        if self.n_max_coupling_iterations < 1 {
            return Some(format!(
                "n_max_coupling_iterations = {} is incorrect; it must be ≥ 1",
                self.n_max_coupling_iterations
            ));
        }
        if self.tol_coupling < CONFIG_MIN_TOL {
            return Some(format!(
                "tol_coupling = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_coupling, CONFIG_MIN_TOL
            ));
        }
        if let StepAdaptation::IterationBased { n_optimal, growth_max } = self.step_adaptation {
            if n_optimal < 1 {
                return Some(format!("n_optimal = {} is incorrect; it must be ≥ 1", n_optimal));
            }
            if growth_max < 1.0 {
                return Some(format!("growth_max = {:?} is incorrect; it must be ≥ 1.0", growth_max));
            }
        }
        if let StepAdaptation::ErrorBased {
            tol,
            safety,
            growth_max,
            reduction_min,
        } = self.step_adaptation
        {
            if tol < CONFIG_MIN_TOL {
                return Some(format!("tol = {:?} is incorrect; it must be ≥ {:e}", tol, CONFIG_MIN_TOL));
            }
            if safety <= 0.0 || safety > 1.0 {
                return Some(format!("safety = {:?} is incorrect; it must be 0.0 < s ≤ 1.0", safety));
            }
            if growth_max < 1.0 {
                return Some(format!("growth_max = {:?} is incorrect; it must be ≥ 1.0", growth_max));
            }
            if reduction_min <= 0.0 || reduction_min > 1.0 {
                return Some(format!(
                    "reduction_min = {:?} is incorrect; it must be 0.0 < r ≤ 1.0",
                    reduction_min
                ));
            }
        }
        if self.dt_reduction <= 0.0 || self.dt_reduction >= 1.0 {
            return Some(format!(
                "dt_reduction = {:?} is incorrect; it must be 0.0 < r < 1.0",
                self.dt_reduction
            ));
        }
        if let Some(message) = self.lin_sol.validate() {
            return Some(message);
        }
        if let Some(fallback) = &self.lin_sol_fallback {
            if let Some(message) = fallback.validate() {
                return Some(format!("(fallback) {}", message));
            }
        }
        None // all good
    }

    /// Prints the header of the table with timestep and iteration data
    #[inline]
    pub fn print_header(&self) {
        if self.verbose_timesteps || self.verbose_iterations {
            println!("Legend:");
            println!("✅ : converged");
            println!("👍 : converging");
            println!("🥵 : diverging");
            println!("😱 : found NaN or Inf\n");
            println!(
                "{:>8} {:>13} {:>13} {:>5} {:>5} {:>9} {:>9}",
                "timestep", "t", "Δt", "outer", "iter", "max(rel)", "coupling"
            );
        }
    }

    /// Prints timestep data
    #[inline]
    #[rustfmt::skip]
    pub fn print_timestep(&self, timestep: usize, t: f64, dt: f64) {
        if !self.verbose_timesteps {
            return ;
        }
        println!(
            "{:>8} {:>13.6e} {:>13.6e} {:>5} {:>5} {:>9} {:>9}",
            timestep+1, t, dt, ".", ".", ".", "."
        );
    }

    /// Prints the coupling iteration data
    #[inline]
    pub fn print_coupling(&self, outer: usize, max_change: f64) {
        if !self.verbose_iterations {
            return;
        }
        let icon = if !max_change.is_finite() {
            "😱"
        } else if max_change < self.tol_coupling {
            "✅"
        } else {
            "👍"
        };
        println!(
            "{:>8} {:>13} {:>13} {:>5} {:>5} {:>9} {:>8.2e}{}",
            ".",
            ".",
            ".",
            outer + 1,
            ".",
            ".",
            max_change,
            icon
        );
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
