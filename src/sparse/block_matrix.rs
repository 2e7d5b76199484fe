use super::SparseTopology;
use crate::StrError;
use russell_lab::{Matrix, Vector};
use std::fmt;

/// Holds a DOF-blocked sparse matrix over a shared topology
///
/// The global system has `dim = ndof × nrow` rows. The global index `i` corresponds
/// to the DOF block `bi = i / nrow` and the topology row `ir = i % nrow`. The values
/// of block `(bi, bj)` are stored contiguously starting at `(bi × ndof + bj) × nnz`,
/// where `nnz` is the number of entries of the topology.
///
/// The CRS arrays of the block-expanded system and the gather map from the CRS
/// positions to the storage positions are computed once, at allocation.
pub struct BlockMatrix<'a> {
    /// Holds the shared non-zero pattern of each block
    topology: &'a SparseTopology,

    /// Number of DOF blocks
    ndof: usize,

    /// Holds all values (ndof² × nnz)
    values: Vec<f64>,

    /// Receives (and discards) writes to entries that are not stored
    scratch: f64,

    /// CRS row pointers of the expanded system (dim + 1)
    row_pointers: Vec<usize>,

    /// CRS column indices of the expanded system (ndof² × nnz)
    col_indices: Vec<usize>,

    /// Maps each CRS position to the storage position (ndof² × nnz)
    entry_index: Vec<usize>,
}

impl<'a> BlockMatrix<'a> {
    /// Allocates a new instance with all (stored) values equal to zero
    ///
    /// # Input
    ///
    /// * `topology` -- the non-zero pattern shared by all blocks
    /// * `ndof` -- the number of DOF blocks (≥ 1; must be 1 with symmetric topologies)
    pub fn new(topology: &'a SparseTopology, ndof: usize) -> Result<Self, StrError> {
        if ndof < 1 {
            return Err("ndof must be ≥ 1");
        }
        if topology.symmetric() && ndof > 1 {
            return Err("symmetric storage requires a single DOF block");
        }
        let nrow = topology.nrow();
        let nnz = topology.nnz();
        let total = ndof * ndof * nnz;
        let mut row_pointers = Vec::with_capacity(ndof * nrow + 1);
        let mut col_indices = Vec::with_capacity(total);
        let mut entry_index = Vec::with_capacity(total);
        row_pointers.push(0);
        for bi in 0..ndof {
            for ir in 0..nrow {
                for bj in 0..ndof {
                    let start = (bi * ndof + bj) * nnz;
                    for (offset, col) in topology.row_entries(ir) {
                        col_indices.push(bj * nrow + col);
                        entry_index.push(start + offset);
                    }
                }
                row_pointers.push(col_indices.len());
            }
        }
        Ok(BlockMatrix {
            topology,
            ndof,
            values: vec![0.0; total],
            scratch: 0.0,
            row_pointers,
            col_indices,
            entry_index,
        })
    }

    /// Returns the topology
    pub fn topology(&self) -> &'a SparseTopology {
        self.topology
    }

    /// Returns the number of DOF blocks
    pub fn ndof(&self) -> usize {
        self.ndof
    }

    /// Returns the dimension of the (square) expanded system
    pub fn dim(&self) -> usize {
        self.ndof * self.topology.nrow()
    }

    /// Returns the number of stored values
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns true if only the upper triangle is stored
    pub fn symmetric(&self) -> bool {
        self.topology.symmetric()
    }

    /// Returns the storage position of the entry (i, j), if stored
    ///
    /// # Panics
    ///
    /// A panic will occur if `i` or `j` is out of range
    fn locate(&self, i: usize, j: usize) -> Option<usize> {
        let dim = self.dim();
        assert!(i < dim && j < dim, "BlockMatrix index is out of range");
        let (i, j) = if self.topology.symmetric() && i > j { (j, i) } else { (i, j) };
        let nrow = self.topology.nrow();
        let (bi, ir) = (i / nrow, i % nrow);
        let (bj, jr) = (j / nrow, j % nrow);
        self.topology
            .find_column_offset(ir, jr)
            .map(|offset| (bi * self.ndof + bj) * self.topology.nnz() + offset)
    }

    /// Returns the value of the entry (i, j); zero if the entry is not stored
    ///
    /// # Panics
    ///
    /// A panic will occur if `i` or `j` is out of range
    pub fn value(&self, i: usize, j: usize) -> f64 {
        match self.locate(i, j) {
            Some(p) => self.values[p],
            None => 0.0,
        }
    }

    /// Returns a mutable reference to the entry (i, j), if stored
    ///
    /// # Panics
    ///
    /// A panic will occur if `i` or `j` is out of range
    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut f64> {
        match self.locate(i, j) {
            Some(p) => Some(&mut self.values[p]),
            None => None,
        }
    }

    /// Returns a mutable reference to the entry (i, j)
    ///
    /// If the entry is not stored, returns a reference to a scratch value;
    /// writes to it do not change the matrix.
    ///
    /// # Panics
    ///
    /// A panic will occur if `i` or `j` is out of range
    pub fn at_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        match self.locate(i, j) {
            Some(p) => &mut self.values[p],
            None => {
                self.scratch = 0.0;
                &mut self.scratch
            }
        }
    }

    /// Adds a local (element) matrix to the global matrix
    ///
    /// Entries that are not stored are ignored. With symmetric storage, only the
    /// upper triangle (in global numbering) of the local matrix is added.
    ///
    /// # Panics
    ///
    /// A panic will occur if a global index is out of range
    pub fn assemble(&mut self, local_to_global: &[usize], local: &Matrix) -> Result<(), StrError> {
        let n = local_to_global.len();
        if local.dims() != (n, n) {
            return Err("local matrix dimensions are incompatible with local_to_global");
        }
        let symmetric = self.topology.symmetric();
        for (l, i) in local_to_global.iter().enumerate() {
            for (m, j) in local_to_global.iter().enumerate() {
                if symmetric && i > j {
                    continue;
                }
                if let Some(p) = self.locate(*i, *j) {
                    self.values[p] += local.get(l, m);
                }
            }
        }
        Ok(())
    }

    /// Sets all stored values to the same value
    pub fn fill(&mut self, value: f64) {
        self.values.iter_mut().for_each(|x| *x = value);
    }

    /// Multiplies all stored values by a scalar
    pub fn scale(&mut self, alpha: f64) {
        self.values.iter_mut().for_each(|x| *x *= alpha);
    }

    /// Adds a scalar to all stored values
    pub fn add_scalar(&mut self, alpha: f64) {
        self.values.iter_mut().for_each(|x| *x += alpha);
    }

    /// Copies all values from another matrix
    ///
    /// The matrices must have the same topology and number of DOFs.
    pub fn copy_from(&mut self, other: &BlockMatrix) -> Result<(), StrError> {
        self.check_compatible(other)?;
        self.values.copy_from_slice(&other.values);
        Ok(())
    }

    /// Adds another matrix to this matrix
    ///
    /// The matrices must have the same topology and number of DOFs.
    pub fn add_matrix(&mut self, other: &BlockMatrix) -> Result<(), StrError> {
        self.check_compatible(other)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += *b;
        }
        Ok(())
    }

    /// Subtracts another matrix from this matrix
    ///
    /// The matrices must have the same topology and number of DOFs.
    pub fn sub_matrix(&mut self, other: &BlockMatrix) -> Result<(), StrError> {
        self.check_compatible(other)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a -= *b;
        }
        Ok(())
    }

    /// Checks whether the other matrix shares the structure of this matrix
    fn check_compatible(&self, other: &BlockMatrix) -> Result<(), StrError> {
        let same_topology = std::ptr::eq(self.topology, other.topology) || self.topology == other.topology;
        if self.ndof != other.ndof || !same_topology {
            return Err("matrices must have the same topology and number of DOFs");
        }
        Ok(())
    }

    /// Eliminates a prescribed (Dirichlet) equation
    ///
    /// Zeroes all entries of the row `row` in every DOF block, except the diagonal,
    /// and sets `rhs[row] = diagonal × prescribed`. The diagonal keeps its value, unless it
    /// is zero: a zero diagonal is set to one, otherwise the eliminated row would be empty
    /// and the prescribed value could not be enforced.
    ///
    /// If `also_column` is true, also zeroes the column `row` in all other rows,
    /// subtracting `a[k][row] × prescribed` from `rhs[k]`. With symmetric storage the
    /// column is always eliminated because the lower part of the row is stored as a column.
    ///
    /// The row and column elimination is idempotent for the same prescribed value.
    pub fn eliminate_row(
        &mut self,
        row: usize,
        prescribed: f64,
        rhs: &mut Vector,
        also_column: bool,
    ) -> Result<(), StrError> {
        // check
        let dim = self.dim();
        if row >= dim {
            return Err("prescribed equation is out of range");
        }
        if rhs.dim() != dim {
            return Err("rhs vector has incompatible dimension");
        }

        // diagonal
        let nrow = self.topology.nrow();
        let nnz = self.topology.nnz();
        let (bi, ir) = (row / nrow, row % nrow);
        let p_diag = (bi * self.ndof + bi) * nnz + self.topology.diag_entry(ir);
        if self.values[p_diag] == 0.0 {
            self.values[p_diag] = 1.0;
        }
        let diagonal = self.values[p_diag];

        // column pass (must read the values before the row pass clears the folded entries)
        if also_column || self.topology.symmetric() {
            for k in 0..dim {
                if k == row {
                    continue;
                }
                if let Some(p) = self.locate(k, row) {
                    rhs[k] -= self.values[p] * prescribed;
                    self.values[p] = 0.0;
                }
            }
        }

        // row pass
        for bj in 0..self.ndof {
            let start = (bi * self.ndof + bj) * nnz;
            for (offset, col) in self.topology.row_entries(ir) {
                if bj == bi && col == ir {
                    continue;
                }
                self.values[start + offset] = 0.0;
            }
        }

        // right-hand side
        rhs[row] = diagonal * prescribed;
        Ok(())
    }

    /// Gathers the values in CRS order (row_pointers and col_indices)
    ///
    /// The layout of the storage (CRS or JDS) does not change the result.
    pub fn export_crs(&self, out: &mut [f64]) -> Result<(), StrError> {
        if out.len() != self.entry_index.len() {
            return Err("CRS value buffer has incompatible length");
        }
        for (v, index) in out.iter_mut().zip(&self.entry_index) {
            *v = self.values[*index];
        }
        Ok(())
    }

    /// Scatters values given in CRS order into the storage (inverse of export_crs)
    pub fn import_crs(&mut self, values: &[f64]) -> Result<(), StrError> {
        if values.len() != self.entry_index.len() {
            return Err("CRS value buffer has incompatible length");
        }
        for (v, index) in values.iter().zip(&self.entry_index) {
            self.values[*index] = *v;
        }
        Ok(())
    }

    /// Returns the CRS row pointers of the expanded system (dim + 1)
    pub fn crs_row_pointers(&self) -> &[usize] {
        &self.row_pointers
    }

    /// Returns the CRS column indices of the expanded system
    pub fn crs_col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    /// Returns the values in storage order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Performs the matrix-vector multiplication `v := a ⋅ u`
    pub fn mat_vec(&self, v: &mut Vector, u: &Vector) -> Result<(), StrError> {
        let dim = self.dim();
        if v.dim() != dim || u.dim() != dim {
            return Err("vectors have incompatible dimensions");
        }
        let symmetric = self.topology.symmetric();
        v.fill(0.0);
        for i in 0..dim {
            for p in self.row_pointers[i]..self.row_pointers[i + 1] {
                let j = self.col_indices[p];
                let a = self.values[self.entry_index[p]];
                v[i] += a * u[j];
                if symmetric && i != j {
                    v[j] += a * u[i];
                }
            }
        }
        Ok(())
    }
}

impl<'a> fmt::Display for BlockMatrix<'a> {
    /// Prints all stored entries (row, column, value)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} matrix: dim = {}, ndof = {}, symmetric = {}\n",
            self.topology.storage(),
            self.dim(),
            self.ndof,
            self.topology.symmetric()
        )?;
        for i in 0..self.dim() {
            for p in self.row_pointers[i]..self.row_pointers[i + 1] {
                write!(f, "{} {} {:?}\n", i, self.col_indices[p], self.values[self.entry_index[p]])?;
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
