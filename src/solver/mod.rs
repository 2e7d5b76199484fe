//! Implements the linear solve adapter and its backends

mod crs_system;
mod lin_sol_adapter;
mod lin_sol_params;
mod solver_direct;
mod solver_krylov;
pub use crate::solver::crs_system::*;
pub use crate::solver::lin_sol_adapter::*;
pub use crate::solver::lin_sol_params::*;
pub use crate::solver::solver_direct::*;
pub use crate::solver::solver_krylov::*;
