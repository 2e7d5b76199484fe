//! Implements the DOF-blocked sparse matrix storage engine

mod block_matrix;
mod connectivity;
mod matrix_dump;
mod sparse_topology;
pub use crate::sparse::block_matrix::*;
pub use crate::sparse::connectivity::*;
pub use crate::sparse::matrix_dump::*;
pub use crate::sparse::sparse_topology::*;
