//! Coupled multi-physics finite element core
//!
//! The crate is organized in four parts:
//!
//! * [base] -- configuration, enums, prescribed values and run-level errors
//! * [sparse] -- the DOF-blocked sparse matrix storage engine (CRS and JDS layouts)
//! * [solver] -- the linear solve adapter and its backends
//! * [fem] -- the process execution controller (nonlinear, coupling and time loops)

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

/// Defines a function of time
pub type FnTime = fn(t: f64) -> f64;

pub mod base;
pub mod fem;
pub mod prelude;
pub mod solver;
pub mod sparse;
