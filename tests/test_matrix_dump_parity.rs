use pmsys::base::DEFAULT_TEST_DIR;
use pmsys::prelude::*;

// GRAPHS
//
// sample: 3 rows with entries (0,0) (0,2) (1,1) (2,0) (2,2)
//
// dense: 50 rows, all rows connected to all rows
//
// chain: 4 rows connected in sequence (0-1-2-3), with 3 DOF blocks
//
// PROPERTIES
//
// * writing a dump, reading it back, and writing it again gives the same bytes
// * the CRS export does not depend on the storage layout (CRS or JDS)
// * the values restored from a dump are identical to the original ones

fn fill(kk: &mut BlockMatrix) {
    let dim = kk.dim();
    for i in 0..dim {
        for j in 0..dim {
            if let Some(v) = kk.get_mut(i, j) {
                *v = 1.0 / 3.0 + 0.37 * (i * dim + j) as f64 - 7.0 * (i as f64);
            }
        }
    }
}

fn round_trip(dump: &MatrixDump) -> Result<(), StrError> {
    let mut bytes = Vec::new();
    dump.write(&mut bytes)?;
    let read = MatrixDump::read(&mut bytes.as_slice())?;
    assert_eq!(&read, dump);
    let mut again = Vec::new();
    read.write(&mut again)?;
    assert_eq!(again, bytes);
    Ok(())
}

#[test]
fn test_matrix_dump_parity_sample() -> Result<(), StrError> {
    let conn = Connectivity::from_rows(3, &[vec![2], vec![], vec![]])?;
    let topology = SparseTopology::new(&conn, Storage::Crs, false)?;
    let mut kk = BlockMatrix::new(&topology, 1)?;
    fill(&mut kk);
    let dump = MatrixDump::from_matrix(&kk)?;
    assert_eq!(dump.nrow, 3);
    assert_eq!(dump.row_start, &[0, 2, 3, 5]);
    assert_eq!(dump.col_index, &[0, 2, 1, 0, 2]);
    round_trip(&dump)?;

    // header
    let mut bytes = Vec::new();
    dump.write(&mut bytes)?;
    assert_eq!(&bytes[0..4], &[3, 0, 0, 0]);
    assert_eq!(bytes.len(), 4 + 4 * 4 + 4 * 5 + 8 * 5);
    Ok(())
}

#[test]
fn test_matrix_dump_parity_dense() -> Result<(), StrError> {
    let n = 50;
    let all: Vec<usize> = (0..n).collect();
    let mut conn = Connectivity::new(n)?;
    conn.connect_all(&all)?;
    let crs = SparseTopology::new(&conn, Storage::Crs, false)?;
    let jds = SparseTopology::new(&conn, Storage::Jds, false)?;
    let mut kk_crs = BlockMatrix::new(&crs, 1)?;
    let mut kk_jds = BlockMatrix::new(&jds, 1)?;
    fill(&mut kk_crs);
    fill(&mut kk_jds);
    let dump_crs = MatrixDump::from_matrix(&kk_crs)?;
    let dump_jds = MatrixDump::from_matrix(&kk_jds)?;
    assert_eq!(dump_crs.nnz(), n * n);
    dump_crs.check_same(&dump_jds)?;
    round_trip(&dump_crs)?;

    // file
    let path = format!("{}/test_matrix_dump_parity_dense.bin", DEFAULT_TEST_DIR);
    dump_jds.write_file(&path)?;
    let read = MatrixDump::read_file(&path)?;
    read.check_same(&dump_crs)?;

    // restore
    let mut restored = BlockMatrix::new(&jds, 1)?;
    read.restore_values(&mut restored)?;
    assert_eq!(restored.values(), kk_jds.values());
    Ok(())
}

#[test]
fn test_matrix_dump_parity_multi_dof() -> Result<(), StrError> {
    let mut conn = Connectivity::new(4)?;
    conn.connect_all(&[0, 1])?.connect_all(&[1, 2])?.connect_all(&[2, 3])?;
    let crs = SparseTopology::new(&conn, Storage::Crs, false)?;
    let jds = SparseTopology::new(&conn, Storage::Jds, false)?;
    let mut kk_crs = BlockMatrix::new(&crs, 3)?;
    let mut kk_jds = BlockMatrix::new(&jds, 3)?;
    fill(&mut kk_crs);
    fill(&mut kk_jds);
    let dump = MatrixDump::from_matrix(&kk_crs)?;
    assert_eq!(dump.nrow, 12);
    assert_eq!(dump.nnz(), 9 * conn.nnz());
    dump.check_same(&MatrixDump::from_matrix(&kk_jds)?)?;
    round_trip(&dump)?;

    // a changed value breaks the parity
    *kk_jds.at_mut(5, 6) += 1e-12;
    assert_eq!(
        dump.check_same(&MatrixDump::from_matrix(&kk_jds)?).err(),
        Some("matrices have different values")
    );
    Ok(())
}
