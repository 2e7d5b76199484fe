//! Implements the base structures for a coupled simulation

mod config;
mod constants;
mod enums;
mod essential;
mod param_nonlinear;
mod sim_error;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::enums::*;
pub use crate::base::essential::*;
pub use crate::base::param_nonlinear::*;
pub use crate::base::sim_error::*;
