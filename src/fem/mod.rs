//! Implements the process execution controller (nonlinear, coupling, and time loops)

mod checkpoint;
mod control_convergence;
mod control_time;
mod deformation_process;
mod deformation_state;
mod linear_system;
mod process;
mod process_controller;
mod process_equations;
mod process_state;
mod secondary_values;
mod sim_context;
mod simulation;
pub use crate::fem::checkpoint::*;
pub use crate::fem::control_convergence::*;
pub use crate::fem::control_time::*;
pub use crate::fem::deformation_process::*;
pub use crate::fem::deformation_state::*;
pub use crate::fem::linear_system::*;
pub use crate::fem::process::*;
pub use crate::fem::process_controller::*;
pub use crate::fem::process_equations::*;
pub use crate::fem::process_state::*;
pub use crate::fem::secondary_values::*;
pub use crate::fem::sim_context::*;
pub use crate::fem::simulation::*;
