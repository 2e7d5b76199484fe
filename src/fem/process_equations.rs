use super::{ProcessState, SimContext};
use crate::sparse::BlockMatrix;
use crate::StrError;
use russell_lab::Vector;

/// Defines the physics of a generic process
///
/// The assembled system `kk ⋅ u_new = rhs` gives the next iterate of the unknowns.
/// A linear process yields the solution in a single iteration; a nonlinear process
/// is solved by successive substitution (Picard iterations).
pub trait ProcessEquations {
    /// Assembles the coefficient matrix and the right-hand side
    ///
    /// * `kk` -- the (zeroed) coefficient matrix
    /// * `rhs` -- the (zeroed) right-hand side
    /// * `uu` -- the current iterate of the unknowns
    /// * `state` -- the state of the execution (time, Δt, iterations)
    /// * `context` -- the solution fields published by the other processes
    fn assemble(
        &mut self,
        kk: &mut BlockMatrix,
        rhs: &mut Vector,
        uu: &Vector,
        state: &ProcessState,
        context: &SimContext,
    ) -> Result<(), StrError>;

    /// Commits history-dependent data after an accepted step
    fn commit(&mut self, _uu: &Vector) {}
}
