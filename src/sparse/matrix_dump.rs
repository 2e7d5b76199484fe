use super::BlockMatrix;
use crate::StrError;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Holds the CRS arrays of a matrix in the binary dump format
///
/// The binary format is little-endian:
///
/// ```text
/// i32        nrow
/// i32[nrow+1] row_start
/// i32[nnz]   col_index
/// f64[nnz]   values
/// ```
///
/// Multi-DOF matrices are dumped in the block-expanded row space (`ndof × nrow` rows).
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixDump {
    /// Number of rows
    pub nrow: usize,

    /// Row starts (nrow + 1)
    pub row_start: Vec<i32>,

    /// Column indices (nnz)
    pub col_index: Vec<i32>,

    /// Values (nnz)
    pub values: Vec<f64>,
}

impl MatrixDump {
    /// Allocates a new instance from the CRS export of a matrix
    pub fn from_matrix(kk: &BlockMatrix) -> Result<Self, StrError> {
        let to_i32 = |x: &usize| i32::try_from(*x).map_err(|_| "matrix is too large for the binary dump format");
        let row_start = kk.crs_row_pointers().iter().map(to_i32).collect::<Result<Vec<_>, _>>()?;
        let col_index = kk.crs_col_indices().iter().map(to_i32).collect::<Result<Vec<_>, _>>()?;
        let mut values = vec![0.0; kk.nnz()];
        kk.export_crs(&mut values)?;
        Ok(MatrixDump {
            nrow: kk.dim(),
            row_start,
            col_index,
            values,
        })
    }

    /// Returns the number of stored values
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Checks the consistency of the CRS arrays (the same checks performed by `read`)
    pub fn validate(&self) -> Result<(), StrError> {
        if self.row_start.len() != self.nrow + 1 {
            return Err("binary dump row_start must have nrow + 1 entries");
        }
        if self.row_start[0] != 0 {
            return Err("binary dump row_start must begin with zero");
        }
        if self.row_start.windows(2).any(|w| w[1] < w[0]) {
            return Err("binary dump row_start is not monotonic");
        }
        let nnz = self.row_start[self.nrow] as usize;
        if self.col_index.len() != nnz || self.values.len() != nnz {
            return Err("binary dump arrays are inconsistent with row_start");
        }
        if self.col_index.iter().any(|col| *col < 0 || *col as usize >= self.nrow) {
            return Err("binary dump column index is out of range");
        }
        Ok(())
    }

    /// Writes the binary dump
    ///
    /// The arrays are validated first; hence, a dump rejected by `read` is never written.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), StrError> {
        self.validate()?;
        let mut bytes = Vec::with_capacity(4 * (2 + self.nrow + self.nnz()) + 8 * self.nnz());
        let nrow = i32::try_from(self.nrow).map_err(|_| "matrix is too large for the binary dump format")?;
        bytes.extend_from_slice(&nrow.to_le_bytes());
        for x in &self.row_start {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        for x in &self.col_index {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        for x in &self.values {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        writer.write_all(&bytes).map_err(|_| "cannot write binary dump")?;
        Ok(())
    }

    /// Reads a binary dump and validates its structure
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, StrError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|_| "cannot read binary dump")?;
        let mut cursor = ByteCursor { bytes: &bytes, position: 0 };

        // header
        let nrow = cursor.read_i32()?;
        if nrow < 0 {
            return Err("binary dump has a negative number of rows");
        }
        let nrow = nrow as usize;
        if cursor.remaining() < 4 * (nrow + 1) {
            return Err("binary dump is truncated");
        }

        // row starts
        let mut row_start = Vec::with_capacity(nrow + 1);
        for _ in 0..(nrow + 1) {
            row_start.push(cursor.read_i32()?);
        }
        if row_start[0] != 0 {
            return Err("binary dump row_start must begin with zero");
        }
        if row_start.windows(2).any(|w| w[1] < w[0]) {
            return Err("binary dump row_start is not monotonic");
        }
        let nnz = row_start[nrow] as usize;
        if cursor.remaining() < 12 * nnz {
            return Err("binary dump is truncated");
        }

        // columns and values
        let mut col_index = Vec::with_capacity(nnz);
        for _ in 0..nnz {
            let col = cursor.read_i32()?;
            if col < 0 || col as usize >= nrow {
                return Err("binary dump column index is out of range");
            }
            col_index.push(col);
        }
        let mut values = Vec::with_capacity(nnz);
        for _ in 0..nnz {
            values.push(cursor.read_f64()?);
        }
        if cursor.position != bytes.len() {
            return Err("binary dump has trailing bytes");
        }
        Ok(MatrixDump {
            nrow,
            row_start,
            col_index,
            values,
        })
    }

    /// Writes the binary dump to a file
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_file<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let file = File::create(&path).map_err(|_| "cannot create file")?;
        let mut buffered = BufWriter::new(file);
        self.write(&mut buffered)?;
        buffered.flush().map_err(|_| "cannot write binary dump")?;
        Ok(())
    }

    /// Reads a binary dump from a file
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_file<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let file = File::open(path).map_err(|_| "cannot open file")?;
        let mut buffered = BufReader::new(file);
        MatrixDump::read(&mut buffered)
    }

    /// Checks that another dump holds exactly the same matrix (parity check)
    ///
    /// The structure must be identical and the values must be bit-identical.
    pub fn check_same(&self, other: &MatrixDump) -> Result<(), StrError> {
        if self.nrow != other.nrow {
            return Err("matrices have different number of rows");
        }
        if self.row_start != other.row_start || self.col_index != other.col_index {
            return Err("matrices have different structure");
        }
        let same = self
            .values
            .iter()
            .zip(&other.values)
            .all(|(a, b)| a.to_bits() == b.to_bits());
        if !same {
            return Err("matrices have different values");
        }
        Ok(())
    }

    /// Restores the values of a matrix from the dump
    ///
    /// The dump must have been obtained from a matrix with the same structure.
    pub fn restore_values(&self, kk: &mut BlockMatrix) -> Result<(), StrError> {
        let same_rows = self.nrow == kk.dim()
            && self.row_start.len() == kk.crs_row_pointers().len()
            && self.row_start.iter().zip(kk.crs_row_pointers()).all(|(a, b)| *a as usize == *b);
        let same_columns = self.col_index.len() == kk.crs_col_indices().len()
            && self.col_index.iter().zip(kk.crs_col_indices()).all(|(a, b)| *a as usize == *b);
        if !same_rows || !same_columns {
            return Err("binary dump does not match the matrix structure");
        }
        kk.import_crs(&self.values)
    }
}

/// Reads little-endian values from a byte slice
struct ByteCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], StrError> {
        let end = self.position + N;
        if end > self.bytes.len() {
            return Err("binary dump is truncated");
        }
        let mut buffer = [0u8; N];
        buffer.copy_from_slice(&self.bytes[self.position..end]);
        self.position = end;
        Ok(buffer)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn read_i32(&mut self) -> Result<i32, StrError> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    fn read_f64(&mut self) -> Result<f64, StrError> {
        Ok(f64::from_le_bytes(self.take::<8>()?))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
