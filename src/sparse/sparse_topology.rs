use super::Connectivity;
use crate::base::Storage;
use crate::StrError;

/// Describes the non-zero pattern of a (single DOF block) sparse matrix
///
/// The same topology is shared by all DOF blocks of a [crate::sparse::BlockMatrix].
///
/// # Layouts
///
/// * **CRS** -- `num_column_entries` holds the row starts (nrow + 1 values)
///   and `entry_column` holds the columns of each row in ascending order.
/// * **JDS** -- the rows are permuted by decreasing number of entries
///   (`new_to_old` and `old_to_new`); the values are stored diagonal by
///   diagonal; `num_column_entries[k]` holds the number of (permuted) rows
///   owning a k-th entry. The columns of each row are also ascending.
///
/// With `symmetric = true`, only the upper triangle (`col ≥ row`) is stored.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseTopology {
    storage: Storage,
    symmetric: bool,
    nrow: usize,
    entry_column: Vec<usize>,
    num_column_entries: Vec<usize>,
    diag_start: Vec<usize>,
    new_to_old: Vec<usize>,
    old_to_new: Vec<usize>,
    diag_entry: Vec<usize>,
    max_columns: usize,
}

/// Iterates over the `(offset, column)` pairs of a row in ascending column order
pub struct RowEntries<'a> {
    topology: &'a SparseTopology,
    position: usize,
    k: usize,
    offset: usize,
    end: usize,
}

impl SparseTopology {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `graph` -- the connectivity graph (the diagonal is always present)
    /// * `storage` -- the physical layout
    /// * `symmetric` -- only the upper triangle is stored and addressed
    pub fn new(graph: &Connectivity, storage: Storage, symmetric: bool) -> Result<Self, StrError> {
        // columns of each row
        let nrow = graph.nrow();
        let rows: Vec<Vec<usize>> = (0..nrow)
            .map(|i| {
                graph
                    .columns(i)
                    .iter()
                    .copied()
                    .filter(|j| !symmetric || *j >= i)
                    .collect()
            })
            .collect();
        let max_columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let nnz: usize = rows.iter().map(|r| r.len()).sum();

        // allocate new instance
        let mut topology = match storage {
            Storage::Crs => {
                let mut row_start = vec![0; nrow + 1];
                let mut entry_column = Vec::with_capacity(nnz);
                for i in 0..nrow {
                    entry_column.extend_from_slice(&rows[i]);
                    row_start[i + 1] = entry_column.len();
                }
                SparseTopology {
                    storage,
                    symmetric,
                    nrow,
                    entry_column,
                    num_column_entries: row_start,
                    diag_start: Vec::new(),
                    new_to_old: (0..nrow).collect(),
                    old_to_new: (0..nrow).collect(),
                    diag_entry: vec![0; nrow],
                    max_columns,
                }
            }
            Storage::Jds => {
                // permutation by decreasing row length (stable)
                let mut new_to_old: Vec<usize> = (0..nrow).collect();
                new_to_old.sort_by(|a, b| rows[*b].len().cmp(&rows[*a].len()));
                let mut old_to_new = vec![0; nrow];
                for (new, old) in new_to_old.iter().enumerate() {
                    old_to_new[*old] = new;
                }

                // length and start of each jagged diagonal
                let mut num_column_entries = vec![0; max_columns];
                let mut diag_start = vec![0; max_columns + 1];
                for k in 0..max_columns {
                    num_column_entries[k] = new_to_old.iter().take_while(|old| rows[**old].len() > k).count();
                    diag_start[k + 1] = diag_start[k] + num_column_entries[k];
                }

                // columns stored diagonal by diagonal
                let mut entry_column = vec![0; nnz];
                for k in 0..max_columns {
                    for new in 0..num_column_entries[k] {
                        entry_column[diag_start[k] + new] = rows[new_to_old[new]][k];
                    }
                }
                SparseTopology {
                    storage,
                    symmetric,
                    nrow,
                    entry_column,
                    num_column_entries,
                    diag_start,
                    new_to_old,
                    old_to_new,
                    diag_entry: vec![0; nrow],
                    max_columns,
                }
            }
        };

        // cache the offsets of the diagonal
        for i in 0..nrow {
            topology.diag_entry[i] = topology.find_column_offset(i, i).ok_or("the diagonal entry is missing")?;
        }
        Ok(topology)
    }

    /// Finds the in-storage offset of the entry (row, col)
    ///
    /// Returns None if the entry is not stored (mathematical zero). With symmetric
    /// storage, entries of the lower triangle are never stored; fold them first.
    ///
    /// # Panics
    ///
    /// A panic will occur if the row is out of range
    pub fn find_column_offset(&self, row: usize, col: usize) -> Option<usize> {
        match self.storage {
            Storage::Crs => {
                let start = self.num_column_entries[row];
                let end = self.num_column_entries[row + 1];
                self.entry_column[start..end]
                    .binary_search(&col)
                    .ok()
                    .map(|k| start + k)
            }
            Storage::Jds => {
                let position = self.old_to_new[row];
                let mut counter = position;
                for k in 0..self.max_columns {
                    if position >= self.num_column_entries[k] {
                        return None;
                    }
                    let current = self.entry_column[counter];
                    if current == col {
                        return Some(counter);
                    }
                    if current > col {
                        return None; // columns are ascending
                    }
                    counter += self.num_column_entries[k];
                }
                None
            }
        }
    }

    /// Returns an iterator over the (offset, column) pairs of a row
    ///
    /// # Panics
    ///
    /// A panic will occur if the row is out of range
    pub fn row_entries(&self, row: usize) -> RowEntries<'_> {
        match self.storage {
            Storage::Crs => RowEntries {
                topology: self,
                position: row,
                k: 0,
                offset: self.num_column_entries[row],
                end: self.num_column_entries[row + 1],
            },
            Storage::Jds => {
                let position = self.old_to_new[row];
                RowEntries {
                    topology: self,
                    position,
                    k: 0,
                    offset: position,
                    end: 0,
                }
            }
        }
    }

    /// Returns the number of stored entries of a row
    pub fn row_len(&self, row: usize) -> usize {
        self.row_entries(row).count()
    }

    /// Returns the physical layout
    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// Returns true if only the upper triangle is stored
    pub fn symmetric(&self) -> bool {
        self.symmetric
    }

    /// Returns the number of rows
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    /// Returns the number of stored entries
    pub fn nnz(&self) -> usize {
        self.entry_column.len()
    }

    /// Returns the largest number of entries in a row
    pub fn max_columns(&self) -> usize {
        self.max_columns
    }

    /// Returns the in-storage offset of the diagonal entry of a row
    pub fn diag_entry(&self, row: usize) -> usize {
        self.diag_entry[row]
    }

    /// Returns the column of each stored entry
    pub fn entry_column(&self) -> &[usize] {
        &self.entry_column
    }

    /// Returns the row starts (CRS) or the length of each jagged diagonal (JDS)
    pub fn num_column_entries(&self) -> &[usize] {
        &self.num_column_entries
    }

    /// Returns the original row of each permuted row
    pub fn new_to_old(&self) -> &[usize] {
        &self.new_to_old
    }

    /// Returns the permuted row of each original row
    pub fn old_to_new(&self) -> &[usize] {
        &self.old_to_new
    }
}

impl<'a> Iterator for RowEntries<'a> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let topology = self.topology;
        match topology.storage {
            Storage::Crs => {
                if self.offset >= self.end {
                    return None;
                }
                let offset = self.offset;
                self.offset += 1;
                Some((offset, topology.entry_column[offset]))
            }
            Storage::Jds => {
                if self.k >= topology.max_columns || self.position >= topology.num_column_entries[self.k] {
                    return None;
                }
                let offset = topology.diag_start[self.k] + self.position;
                self.k += 1;
                Some((offset, topology.entry_column[offset]))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SparseTopology;
    use crate::base::Storage;
    use crate::sparse::Connectivity;

    fn sample_graph() -> Connectivity {
        // ┌         ┐
        // │ x x . x │
        // │ x x . . │
        // │ . . x . │
        // │ x . . x │
        // └         ┘
        Connectivity::from_rows(4, &[vec![1, 3], vec![], vec![], vec![]]).unwrap()
    }

    #[test]
    fn crs_works() {
        let topo = SparseTopology::new(&sample_graph(), Storage::Crs, false).unwrap();
        assert_eq!(topo.storage(), Storage::Crs);
        assert_eq!(topo.symmetric(), false);
        assert_eq!(topo.nrow(), 4);
        assert_eq!(topo.nnz(), 8);
        assert_eq!(topo.max_columns(), 3);
        assert_eq!(topo.num_column_entries(), &[0, 3, 5, 6, 8]);
        assert_eq!(topo.entry_column(), &[0, 1, 3, 0, 1, 2, 0, 3]);
        assert_eq!(topo.new_to_old(), &[0, 1, 2, 3]);
        assert_eq!((0..4).map(|i| topo.diag_entry(i)).collect::<Vec<_>>(), &[0, 4, 5, 7]);
        assert_eq!(topo.find_column_offset(0, 3), Some(2));
        assert_eq!(topo.find_column_offset(3, 0), Some(6));
        assert_eq!(topo.find_column_offset(1, 3), None);
        assert_eq!(topo.find_column_offset(2, 0), None);
        assert_eq!(topo.row_entries(0).collect::<Vec<_>>(), &[(0, 0), (1, 1), (2, 3)]);
        assert_eq!(topo.row_len(2), 1);
    }

    #[test]
    fn jds_works() {
        let topo = SparseTopology::new(&sample_graph(), Storage::Jds, false).unwrap();
        assert_eq!(topo.nnz(), 8);
        assert_eq!(topo.max_columns(), 3);
        assert_eq!(topo.new_to_old(), &[0, 1, 3, 2]);
        assert_eq!(topo.old_to_new(), &[0, 1, 3, 2]);
        assert_eq!(topo.num_column_entries(), &[4, 3, 1]);
        assert_eq!(topo.entry_column(), &[0, 0, 0, 2, 1, 1, 3, 3]);
        assert_eq!((0..4).map(|i| topo.diag_entry(i)).collect::<Vec<_>>(), &[0, 5, 3, 6]);
        assert_eq!(topo.find_column_offset(0, 3), Some(7));
        assert_eq!(topo.find_column_offset(3, 3), Some(6));
        assert_eq!(topo.find_column_offset(1, 3), None);
        assert_eq!(topo.find_column_offset(2, 1), None);
        assert_eq!(topo.row_entries(0).collect::<Vec<_>>(), &[(0, 0), (4, 1), (7, 3)]);
        assert_eq!(topo.row_entries(3).collect::<Vec<_>>(), &[(2, 0), (6, 3)]);
        assert_eq!(topo.row_entries(2).collect::<Vec<_>>(), &[(3, 2)]);
    }

    #[test]
    fn symmetric_keeps_upper_triangle() {
        let topo = SparseTopology::new(&sample_graph(), Storage::Crs, true).unwrap();
        assert_eq!(topo.nnz(), 6);
        assert_eq!(topo.num_column_entries(), &[0, 3, 4, 5, 6]);
        assert_eq!(topo.entry_column(), &[0, 1, 3, 1, 2, 3]);
        assert_eq!(topo.find_column_offset(1, 0), None);
        assert_eq!(topo.find_column_offset(0, 1), Some(1));
        let jds = SparseTopology::new(&sample_graph(), Storage::Jds, true).unwrap();
        assert_eq!(jds.nnz(), 6);
        assert_eq!(jds.new_to_old(), &[0, 1, 2, 3]);
        assert_eq!(jds.num_column_entries(), &[4, 1, 1]);
    }

    #[test]
    fn crs_and_jds_find_the_same_entries() {
        let mut graph = Connectivity::new(12).unwrap();
        for i in 0..12 {
            graph.connect(i, (i * 7 + 3) % 12).unwrap();
            graph.connect(i, (i * i) % 12).unwrap();
        }
        let crs = SparseTopology::new(&graph, Storage::Crs, false).unwrap();
        let jds = SparseTopology::new(&graph, Storage::Jds, false).unwrap();
        assert_eq!(crs.nnz(), jds.nnz());
        for i in 0..12 {
            let cols_crs: Vec<_> = crs.row_entries(i).map(|(_, j)| j).collect();
            let cols_jds: Vec<_> = jds.row_entries(i).map(|(_, j)| j).collect();
            assert_eq!(cols_crs, cols_jds);
            for j in 0..12 {
                let expected = graph.columns(i).contains(&j);
                assert_eq!(crs.find_column_offset(i, j).is_some(), expected);
                assert_eq!(jds.find_column_offset(i, j).is_some(), expected);
            }
            // offsets are consistent with the iterators
            for (offset, j) in jds.row_entries(i) {
                assert_eq!(jds.find_column_offset(i, j), Some(offset));
                assert_eq!(jds.entry_column()[offset], j);
            }
        }
    }
}
