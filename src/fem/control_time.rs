use crate::base::{Config, StepAdaptation, NORM_GUARD, PI_EXPONENT_INTEGRAL, PI_EXPONENT_PROPORTIONAL};
use crate::StrError;

/// Assists in the time loop control
///
/// Computes the time increment of the next step after an accepted or rejected step
pub struct ControlTime<'a> {
    /// Holds configuration parameters
    config: &'a Config,
}

impl<'a> ControlTime<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a Config) -> Self {
        ControlTime { config }
    }

    /// Returns the time increment of the first step
    pub fn initial_dt(&self) -> Result<f64, StrError> {
        let dt = f64::min((self.config.dt)(self.config.t_ini), self.config.dt_max);
        if !(dt >= self.config.dt_min) {
            return Err("Δt is smaller than the allowed minimum");
        }
        Ok(dt)
    }

    /// Returns the time increment of the step after an accepted step
    ///
    /// * `t` -- time at the end of the accepted step
    /// * `dt` -- time increment of the accepted step
    /// * `n_iter` -- largest number of nonlinear iterations in the accepted step
    /// * `change` -- largest relative change of the unknowns within the accepted step
    /// * `change_previous` -- the same for the step before (None for the first step)
    pub fn dt_after_accept(&self, t: f64, dt: f64, n_iter: usize, change: f64, change_previous: Option<f64>) -> f64 {
        let dt = match self.config.step_adaptation {
            StepAdaptation::Fixed => (self.config.dt)(t),
            StepAdaptation::IterationBased { n_optimal, growth_max } => {
                let ratio = n_optimal as f64 / usize::max(n_iter, 1) as f64;
                dt * f64::min(f64::max(ratio, 1.0), growth_max)
            }
            StepAdaptation::ErrorBased {
                tol,
                safety,
                growth_max,
                reduction_min,
            } => {
                if !change.is_finite() {
                    return f64::max(dt * reduction_min, self.config.dt_min);
                }
                let mut factor = safety * f64::powf(tol / f64::max(change, NORM_GUARD), PI_EXPONENT_INTEGRAL);
                if let Some(previous) = change_previous.filter(|e| e.is_finite() && *e > NORM_GUARD) {
                    factor *= f64::powf(previous / tol, PI_EXPONENT_PROPORTIONAL);
                }
                dt * f64::min(f64::max(factor, reduction_min), growth_max)
            }
        };
        f64::max(f64::min(dt, self.config.dt_max), self.config.dt_min)
    }

    /// Returns the time increment of the retry after a rejected step
    pub fn dt_after_reject(&self, dt: f64) -> Result<f64, StrError> {
        let dt = dt * self.config.dt_reduction;
        if dt < self.config.dt_min {
            return Err("Δt is smaller than the allowed minimum");
        }
        Ok(dt)
    }

    /// Clips the time increment such that the final time is not exceeded
    pub fn clip(&self, t: f64, dt: f64) -> f64 {
        if t + dt > self.config.t_fin {
            self.config.t_fin - t
        } else {
            dt
        }
    }

    /// Returns true if the final time has been reached
    pub fn finished(&self, t: f64) -> bool {
        t >= self.config.t_fin - self.config.dt_min
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ControlTime;
    use crate::base::{Config, StepAdaptation};
    use russell_lab::approx_eq;

    #[test]
    fn initial_dt_captures_errors() {
        let mut config = Config::new();
        config.dt = |_| 1e-12;
        let control = ControlTime::new(&config);
        assert_eq!(control.initial_dt().err(), Some("Δt is smaller than the allowed minimum"));
        config.dt = |_| 0.5;
        config.dt_max = 0.3;
        let control = ControlTime::new(&config);
        assert_eq!(control.initial_dt(), Ok(0.3));
    }

    #[test]
    fn fixed_policy_works() {
        let mut config = Config::new();
        config.dt = |t| if t < 0.5 { 0.1 } else { 0.2 };
        let control = ControlTime::new(&config);
        assert_eq!(control.dt_after_accept(0.1, 0.1, 7, 0.0, None), 0.1);
        assert_eq!(control.dt_after_accept(0.6, 0.1, 7, 0.0, None), 0.2);
    }

    #[test]
    fn iteration_based_policy_works() {
        let mut config = Config::new();
        config.dt_max = 0.3;
        config.step_adaptation = StepAdaptation::IterationBased {
            n_optimal: 4,
            growth_max: 2.0,
        };
        let control = ControlTime::new(&config);
        assert_eq!(control.dt_after_accept(0.1, 0.1, 1, 0.0, None), 0.2);
        approx_eq(control.dt_after_accept(0.1, 0.1, 3, 0.0, None), 0.4 / 3.0, 1e-15);
        assert_eq!(control.dt_after_accept(0.1, 0.1, 4, 0.0, None), 0.1);
        assert_eq!(control.dt_after_accept(0.1, 0.1, 10, 0.0, None), 0.1); // never shrinks
        assert_eq!(control.dt_after_accept(0.3, 0.2, 1, 0.0, None), 0.3); // capped
    }

    #[test]
    fn error_based_policy_works() {
        let mut config = Config::new();
        config.dt_max = 1.0;
        config.step_adaptation = StepAdaptation::ErrorBased {
            tol: 1e-2,
            safety: 0.9,
            growth_max: 2.0,
            reduction_min: 0.25,
        };
        let control = ControlTime::new(&config);

        // first step: integral term only
        let expected = 0.1 * 0.9 * f64::powf(1e-2 / 4e-3, 0.7);
        approx_eq(control.dt_after_accept(0.1, 0.1, 3, 4e-3, None), expected, 1e-15);

        // proportional term: the error grew from 5e-3 to 8e-3
        let expected = 0.1 * 0.9 * f64::powf(1e-2 / 8e-3, 0.7) * f64::powf(5e-3 / 1e-2, 0.4);
        approx_eq(control.dt_after_accept(0.2, 0.1, 3, 8e-3, Some(5e-3)), expected, 1e-15);
        assert!(expected < 0.1);

        // a vanishing previous error is ignored
        assert_eq!(
            control.dt_after_accept(0.2, 0.1, 3, 4e-3, Some(0.0)),
            control.dt_after_accept(0.2, 0.1, 3, 4e-3, None)
        );

        // bounds
        assert_eq!(control.dt_after_accept(0.1, 0.1, 3, 0.0, None), 0.2); // growth_max
        assert_eq!(control.dt_after_accept(0.1, 0.1, 3, 1.0, None), 0.025); // reduction_min
        assert_eq!(control.dt_after_accept(0.1, 0.1, 3, f64::NAN, None), 0.025);
        assert_eq!(control.dt_after_accept(0.1, 0.8, 3, 0.0, None), 1.0); // dt_max
        config.dt_min = 0.05;
        let control = ControlTime::new(&config);
        assert_eq!(control.dt_after_accept(0.1, 0.1, 3, 1.0, None), 0.05); // dt_min
    }

    #[test]
    fn reject_and_clip_work() {
        let mut config = Config::new();
        config.dt_min = 0.01;
        let control = ControlTime::new(&config);
        assert_eq!(control.dt_after_reject(0.1), Ok(0.05));
        assert_eq!(control.dt_after_reject(0.015).err(), Some("Δt is smaller than the allowed minimum"));
        approx_eq(control.clip(0.95, 0.1), 0.05, 1e-15);
        assert_eq!(control.clip(0.5, 0.1), 0.1);
        assert!(!control.finished(0.5));
        assert!(control.finished(1.0));
    }
}
