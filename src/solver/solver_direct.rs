use super::{CrsSystem, LinSolAdapter, LinSolParams, SolveReport, SolverFailure, SolverKind};
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{Genie, LinSolver, SparseMatrix, Sym};

/// Implements the direct sparse solvers (UMFPACK and KLU) via russell_sparse
///
/// The CRS arrays are expanded into a full (non-symmetric) COO matrix.
pub struct SolverDirect {
    /// Holds the selected backend
    genie: Genie,

    /// Holds the system (for the residual norm)
    system: Option<CrsSystem>,

    /// Holds the coefficient matrix handed over to the backend
    kk: Option<SparseMatrix>,
}

impl SolverDirect {
    /// Allocates a new instance
    pub fn new() -> Self {
        SolverDirect {
            genie: Genie::Umfpack,
            system: None,
            kk: None,
        }
    }
}

impl LinSolAdapter for SolverDirect {
    fn configure(&mut self, params: &LinSolParams) -> Result<(), StrError> {
        self.genie = match params.kind {
            SolverKind::Umfpack => Genie::Umfpack,
            SolverKind::Klu => Genie::Klu,
            _ => return Err("direct solver requires the Umfpack or Klu kind"),
        };
        Ok(())
    }

    fn assemble_from(
        &mut self,
        values: &[f64],
        row_pointers: &[usize],
        col_indices: &[usize],
        symmetric: bool,
    ) -> Result<(), StrError> {
        let system = CrsSystem::new(values, row_pointers, col_indices, symmetric)?;
        let n = system.nrow;
        let mut max_nnz = 0;
        for i in 0..n {
            for p in system.row_pointers[i]..system.row_pointers[i + 1] {
                max_nnz += if symmetric && system.col_indices[p] != i { 2 } else { 1 };
            }
        }
        let mut kk = SparseMatrix::new_coo(n, n, usize::max(max_nnz, 1), Sym::No)?;
        for i in 0..n {
            for p in system.row_pointers[i]..system.row_pointers[i + 1] {
                let j = system.col_indices[p];
                let a = system.values[p];
                kk.put(i, j, a)?;
                if symmetric && i != j {
                    kk.put(j, i, a)?;
                }
            }
        }
        self.system = Some(system);
        self.kk = Some(kk);
        Ok(())
    }

    fn solve(&mut self, rhs: &Vector, x: &mut Vector) -> Result<SolveReport, SolverFailure> {
        // check
        let system = self.system.as_ref().ok_or("the system must be assembled before solving")?;
        let kk = self.kk.as_mut().ok_or("the system must be assembled before solving")?;
        if rhs.dim() != system.nrow || x.dim() != system.nrow {
            return Err(SolverFailure::Backend("vectors have incompatible dimensions"));
        }

        // factorize and solve
        let mut solver = LinSolver::new(self.genie)?;
        solver.actual.factorize(kk, None)?;
        solver.actual.solve(x, kk, rhs, false)?;

        // check the solution
        let mut r = Vector::new(system.nrow);
        let residual_norm = system.residual(&mut r, rhs, x);
        if !residual_norm.is_finite() {
            return Err(SolverFailure::Backend("direct solver produced NaN or Inf"));
        }
        Ok(SolveReport {
            iterations: 1,
            residual_norm,
        })
    }

    fn name(&self) -> &str {
        match self.genie {
            Genie::Klu => "Klu",
            _ => "Umfpack",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SolverDirect;
    use crate::solver::{LinSolAdapter, LinSolParams, SolverKind};
    use russell_lab::{approx_eq, Vector};

    #[test]
    fn configure_captures_errors() {
        let mut solver = SolverDirect::new();
        assert_eq!(
            solver.configure(&LinSolParams::new()).err(),
            Some("direct solver requires the Umfpack or Klu kind")
        );
    }

    #[test]
    fn umfpack_and_klu_work() {
        // ┌       ┐
        // │ 4 1 0 │
        // │ 2 5 1 │
        // │ 0 3 6 │
        // └       ┘
        let values = [4.0, 1.0, 2.0, 5.0, 1.0, 3.0, 6.0];
        let row_pointers = [0, 2, 5, 7];
        let col_indices = [0, 1, 0, 1, 2, 1, 2];
        for kind in [SolverKind::Umfpack, SolverKind::Klu] {
            let mut params = LinSolParams::new_direct();
            params.kind = kind;
            let mut solver = SolverDirect::new();
            solver.configure(&params).unwrap();
            solver.assemble_from(&values, &row_pointers, &col_indices, false).unwrap();
            let rhs = Vector::from(&[6.0, 15.0, 24.0]);
            let mut x = Vector::new(3);
            let report = solver.solve(&rhs, &mut x).unwrap();
            assert_eq!(report.iterations, 1);
            approx_eq(x[0], 1.0, 1e-13);
            approx_eq(x[1], 2.0, 1e-13);
            approx_eq(x[2], 3.0, 1e-13);
        }
    }

    #[test]
    fn symmetric_upper_triangle_works() {
        let mut solver = SolverDirect::new();
        solver.configure(&LinSolParams::new_direct()).unwrap();
        solver.assemble_from(&[4.0, 1.0, 3.0], &[0, 2, 3], &[0, 1, 1], true).unwrap();
        let rhs = Vector::from(&[1.0, 2.0]);
        let mut x = Vector::new(2);
        solver.solve(&rhs, &mut x).unwrap();
        approx_eq(x[0], 1.0 / 11.0, 1e-14);
        approx_eq(x[1], 7.0 / 11.0, 1e-14);
    }
}
