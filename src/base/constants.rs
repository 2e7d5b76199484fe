/// Defines an auxiliary directory where the test result files are saved
pub const DEFAULT_TEST_DIR: &str = "/tmp/pmsys/test";

/// Defines the smallest allowed dt_min (Config)
pub const CONFIG_MIN_DT_MIN: f64 = 1e-10;

/// Defines the smallest allowed tolerance (Config and ParamNonlinear)
pub const CONFIG_MIN_TOL: f64 = 1e-15;

/// Defines the value used to guard divisions by vanishing reference norms
pub const NORM_GUARD: f64 = 1e-30;

/// Defines the exponent of the current error in the PI step size controller
pub const PI_EXPONENT_INTEGRAL: f64 = 0.7;

/// Defines the exponent of the previous error in the PI step size controller
pub const PI_EXPONENT_PROPORTIONAL: f64 = 0.4;
