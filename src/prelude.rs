//! Makes available common structures needed to run a simulation
//!
//! You may write `use pmsys::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{Config, DivergencePolicy, ErrorMethod, Essential, ParamNonlinear, SimError};
pub use crate::base::{StepAdaptation, Storage};
pub use crate::fem::{Checkpoint, ControllerStage, DeformationEquations, DeformationProcess};
pub use crate::fem::{Process, ProcessController, ProcessEquations, ProcessState};
pub use crate::fem::{SecondaryValues, SimContext, Simulation, StepReport};
pub use crate::solver::{LinSolAdapter, LinSolParams, PreconditionerKind, SolverKind};
pub use crate::sparse::{BlockMatrix, Connectivity, MatrixDump, SparseTopology};
pub use crate::StrError;
