use crate::StrError;
use russell_lab::{vec_norm, Norm, Vector};

/// Holds a copy of a square system in compressed row storage
#[derive(Clone, Debug)]
pub struct CrsSystem {
    /// Number of rows (and columns)
    pub nrow: usize,

    /// Row pointers (nrow + 1)
    pub row_pointers: Vec<usize>,

    /// Column indices (nnz)
    pub col_indices: Vec<usize>,

    /// Values (nnz)
    pub values: Vec<f64>,

    /// Only the upper triangle is stored
    pub symmetric: bool,
}

impl CrsSystem {
    /// Allocates a new instance (copying and checking the CRS arrays)
    pub fn new(
        values: &[f64],
        row_pointers: &[usize],
        col_indices: &[usize],
        symmetric: bool,
    ) -> Result<Self, StrError> {
        if row_pointers.len() < 2 {
            return Err("CRS row pointers must have at least two entries");
        }
        let nrow = row_pointers.len() - 1;
        let nnz = row_pointers[nrow];
        if row_pointers[0] != 0 || row_pointers.windows(2).any(|w| w[1] < w[0]) {
            return Err("CRS row pointers are inconsistent");
        }
        if col_indices.len() != nnz || values.len() != nnz {
            return Err("CRS arrays have inconsistent lengths");
        }
        if col_indices.iter().any(|j| *j >= nrow) {
            return Err("CRS column index is out of range");
        }
        Ok(CrsSystem {
            nrow,
            row_pointers: row_pointers.to_vec(),
            col_indices: col_indices.to_vec(),
            values: values.to_vec(),
            symmetric,
        })
    }

    /// Replaces the values keeping the structure
    pub fn set_values(&mut self, values: &[f64]) -> Result<(), StrError> {
        if values.len() != self.values.len() {
            return Err("CRS arrays have inconsistent lengths");
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    /// Checks whether the structure equals the given CRS arrays
    pub fn same_structure(&self, row_pointers: &[usize], col_indices: &[usize], symmetric: bool) -> bool {
        self.symmetric == symmetric && self.row_pointers == row_pointers && self.col_indices == col_indices
    }

    /// Performs the matrix-vector multiplication `v := A ⋅ u`
    ///
    /// # Panics
    ///
    /// A panic will occur if the vectors have incompatible dimensions
    pub fn mat_vec(&self, v: &mut Vector, u: &Vector) {
        assert!(v.dim() == self.nrow && u.dim() == self.nrow);
        v.fill(0.0);
        for i in 0..self.nrow {
            for p in self.row_pointers[i]..self.row_pointers[i + 1] {
                let j = self.col_indices[p];
                let a = self.values[p];
                v[i] += a * u[j];
                if self.symmetric && i != j {
                    v[j] += a * u[i];
                }
            }
        }
    }

    /// Returns the diagonal of the matrix
    pub fn diagonal(&self) -> Vector {
        let mut d = Vector::new(self.nrow);
        for i in 0..self.nrow {
            for p in self.row_pointers[i]..self.row_pointers[i + 1] {
                if self.col_indices[p] == i {
                    d[i] += self.values[p];
                }
            }
        }
        d
    }

    /// Computes `r := b - A ⋅ x` and returns its Euclidean norm
    pub fn residual(&self, r: &mut Vector, b: &Vector, x: &Vector) -> f64 {
        self.mat_vec(r, x);
        for i in 0..self.nrow {
            r[i] = b[i] - r[i];
        }
        vec_norm(r, Norm::Euc)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
