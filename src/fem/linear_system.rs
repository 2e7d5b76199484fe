use crate::solver::{new_lin_sol_adapter, LinSolAdapter, LinSolParams, SolveReport, SolverFailure};
use crate::sparse::{BlockMatrix, SparseTopology};
use crate::StrError;
use russell_lab::Vector;

/// Holds variables to solve the global linear system of a process
///
/// The calls must follow the order: assembly of `kk` and `rhs`, then [LinearSystem::eliminate],
/// then [LinearSystem::solve].
pub struct LinearSystem<'a> {
    /// Global coefficient matrix
    pub kk: BlockMatrix<'a>,

    /// Global right-hand side vector
    pub rhs: Vector,

    /// Holds the values of kk in CRS order (handed over to the solver)
    crs_values: Vec<f64>,

    /// Linear solver
    adapter: Box<dyn LinSolAdapter>,
}

impl<'a> LinearSystem<'a> {
    /// Allocates new instance
    pub fn new(topology: &'a SparseTopology, ndof: usize, params: &LinSolParams) -> Result<Self, StrError> {
        let kk = BlockMatrix::new(topology, ndof)?;
        let dim = kk.dim();
        let nnz = kk.nnz();
        Ok(LinearSystem {
            kk,
            rhs: Vector::new(dim),
            crs_values: vec![0.0; nnz],
            adapter: new_lin_sol_adapter(params)?,
        })
    }

    /// Returns the dimension of the system
    pub fn dim(&self) -> usize {
        self.rhs.dim()
    }

    /// Clears the coefficient matrix and the right-hand side
    pub fn reset(&mut self) {
        self.kk.fill(0.0);
        self.rhs.fill(0.0);
    }

    /// Eliminates the prescribed equations (sorted pairs of equation and value)
    pub fn eliminate(&mut self, prescribed: &[(usize, f64)], also_column: bool) -> Result<(), StrError> {
        for (eq, value) in prescribed {
            self.kk.eliminate_row(*eq, *value, &mut self.rhs, also_column)?;
        }
        Ok(())
    }

    /// Solves the system; `x` holds the initial guess on input
    pub fn solve(&mut self, x: &mut Vector) -> Result<SolveReport, SolverFailure> {
        self.kk.export_crs(&mut self.crs_values)?;
        self.adapter.assemble_from(
            &self.crs_values,
            self.kk.crs_row_pointers(),
            self.kk.crs_col_indices(),
            self.kk.symmetric(),
        )?;
        let report = self.adapter.solve(&self.rhs, x)?;
        log::debug!(
            "{}: {} iterations, residual norm = {:e}",
            self.adapter.name(),
            report.iterations,
            report.residual_norm
        );
        Ok(report)
    }

    /// Replaces the linear solver
    pub fn reconfigure(&mut self, params: &LinSolParams) -> Result<(), StrError> {
        self.adapter = new_lin_sol_adapter(params)?;
        Ok(())
    }

    /// Returns the name of the linear solver
    pub fn solver_name(&self) -> &str {
        self.adapter.name()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::LinearSystem;
    use crate::base::Storage;
    use crate::solver::LinSolParams;
    use crate::sparse::{Connectivity, SparseTopology};
    use russell_lab::{approx_eq, Vector};

    #[test]
    fn solve_with_prescribed_values_works() {
        // chain of three springs with unit stiffness; u0 = 0 and u3 = 3
        let mut conn = Connectivity::new(4).unwrap();
        for e in 0..3 {
            conn.connect_all(&[e, e + 1]).unwrap();
        }
        for storage in [Storage::Crs, Storage::Jds] {
            let topology = SparseTopology::new(&conn, storage, false).unwrap();
            let mut lin_sys = LinearSystem::new(&topology, 1, &LinSolParams::new_direct()).unwrap();
            assert_eq!(lin_sys.dim(), 4);
            assert_eq!(lin_sys.solver_name(), "Umfpack");
            for e in 0..3 {
                *lin_sys.kk.at_mut(e, e) += 1.0;
                *lin_sys.kk.at_mut(e, e + 1) -= 1.0;
                *lin_sys.kk.at_mut(e + 1, e) -= 1.0;
                *lin_sys.kk.at_mut(e + 1, e + 1) += 1.0;
            }
            lin_sys.eliminate(&[(0, 0.0), (3, 3.0)], true).unwrap();
            let mut x = Vector::new(4);
            lin_sys.solve(&mut x).unwrap();
            approx_eq(x[0], 0.0, 1e-14);
            approx_eq(x[1], 1.0, 1e-14);
            approx_eq(x[2], 2.0, 1e-14);
            approx_eq(x[3], 3.0, 1e-14);

            // switch to the iterative solver
            lin_sys.reconfigure(&LinSolParams::new()).unwrap();
            assert_eq!(lin_sys.solver_name(), "Cg");
            let mut x = Vector::new(4);
            lin_sys.solve(&mut x).unwrap();
            approx_eq(x[1], 1.0, 1e-10);
            approx_eq(x[2], 2.0, 1e-10);

            lin_sys.reset();
            assert_eq!(lin_sys.kk.value(1, 1), 0.0);
            assert_eq!(lin_sys.rhs.as_data(), &[0.0, 0.0, 0.0, 0.0]);
        }
    }
}
