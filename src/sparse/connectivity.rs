use crate::StrError;
use gemlab::mesh::Mesh;
use std::collections::BTreeSet;

/// Holds the connectivity graph of the rows (points) of a system
///
/// Each row holds the ordered set of connected columns. The diagonal is always present.
#[derive(Clone, Debug)]
pub struct Connectivity {
    /// Holds the connected columns of each row
    rows: Vec<BTreeSet<usize>>,
}

impl Connectivity {
    /// Allocates a new instance with only the diagonal entries
    pub fn new(nrow: usize) -> Result<Self, StrError> {
        if nrow < 1 {
            return Err("nrow must be ≥ 1");
        }
        let rows = (0..nrow).map(|i| BTreeSet::from([i])).collect();
        Ok(Connectivity { rows })
    }

    /// Allocates a new instance from the list of columns of each row
    ///
    /// The graph is made structurally symmetric, i.e., if `j` is in row `i`,
    /// then `i` is added to row `j`.
    pub fn from_rows(nrow: usize, rows: &[Vec<usize>]) -> Result<Self, StrError> {
        if rows.len() != nrow {
            return Err("the number of rows must equal nrow");
        }
        let mut graph = Connectivity::new(nrow)?;
        for (i, columns) in rows.iter().enumerate() {
            for j in columns {
                graph.connect(i, *j)?;
            }
        }
        Ok(graph)
    }

    /// Allocates a new instance from the points and cells of a mesh
    ///
    /// Each mesh point is a row and all points of a cell are connected to each other.
    pub fn from_mesh(mesh: &Mesh) -> Result<Self, StrError> {
        let mut graph = Connectivity::new(mesh.points.len())?;
        for cell in &mesh.cells {
            graph.connect_all(&cell.points)?;
        }
        Ok(graph)
    }

    /// Connects two rows (in both directions)
    pub fn connect(&mut self, i: usize, j: usize) -> Result<&mut Self, StrError> {
        let nrow = self.rows.len();
        if i >= nrow || j >= nrow {
            return Err("row index is out of range");
        }
        self.rows[i].insert(j);
        self.rows[j].insert(i);
        Ok(self)
    }

    /// Connects all rows of a group to each other (clique)
    pub fn connect_all(&mut self, group: &[usize]) -> Result<&mut Self, StrError> {
        let nrow = self.rows.len();
        if group.iter().any(|i| *i >= nrow) {
            return Err("row index is out of range");
        }
        for i in group {
            for j in group {
                self.rows[*i].insert(*j);
            }
        }
        Ok(self)
    }

    /// Returns the number of rows
    pub fn nrow(&self) -> usize {
        self.rows.len()
    }

    /// Returns the ordered set of columns of a row
    ///
    /// # Panics
    ///
    /// A panic will occur if the row is out of range
    pub fn columns(&self, row: usize) -> &BTreeSet<usize> {
        &self.rows[row]
    }

    /// Returns the number of (structural) non-zero entries of the full graph
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
