use super::{CrsSystem, LinSolAdapter, LinSolParams, PreconditionerKind, SolveReport, SolverFailure, SolverKind};
use crate::StrError;
use russell_lab::{vec_copy, vec_inner, vec_norm, vec_update, Norm, Vector};

/// Implements the preconditioned Krylov solvers (CG and BiCGStab)
pub struct SolverKrylov {
    /// Holds the parameters
    params: LinSolParams,

    /// Holds the system (copied by assemble_from)
    system: Option<CrsSystem>,

    /// Holds the inverse of the diagonal (Jacobi preconditioner)
    inv_diag: Vector,
}

impl SolverKrylov {
    /// Allocates a new instance
    pub fn new() -> Self {
        SolverKrylov {
            params: LinSolParams::new(),
            system: None,
            inv_diag: Vector::new(0),
        }
    }

    /// Applies the preconditioner `z := M⁻¹ ⋅ r`
    fn precondition(&self, z: &mut Vector, r: &Vector) {
        match self.params.preconditioner {
            PreconditionerKind::None => {
                vec_copy(z, r).unwrap(); // cannot fail (same dims)
            }
            PreconditionerKind::Jacobi => {
                for i in 0..r.dim() {
                    z[i] = self.inv_diag[i] * r[i];
                }
            }
        }
    }

    /// Runs the conjugate gradient method
    fn run_cg(&self, system: &CrsSystem, b: &Vector, x: &mut Vector, target: f64) -> Result<usize, SolverFailure> {
        let n = system.nrow;
        let mut r = Vector::new(n);
        let mut z = Vector::new(n);
        let mut q = Vector::new(n);
        let mut norm_r = system.residual(&mut r, b, x);
        if norm_r <= target {
            return Ok(0);
        }
        self.precondition(&mut z, &r);
        let mut p = z.clone();
        let mut rz = vec_inner(&r, &z);
        for k in 1..=self.params.max_iterations {
            system.mat_vec(&mut q, &p);
            let pq = vec_inner(&p, &q);
            if pq == 0.0 || !pq.is_finite() {
                return Err(SolverFailure::Breakdown(k));
            }
            let alpha = rz / pq;
            vec_update(x, alpha, &p)?;
            vec_update(&mut r, -alpha, &q)?;
            norm_r = vec_norm(&r, Norm::Euc);
            if norm_r <= target {
                return Ok(k);
            }
            self.precondition(&mut z, &r);
            let rz_new = vec_inner(&r, &z);
            let beta = rz_new / rz;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
            rz = rz_new;
        }
        Err(SolverFailure::NotConverged {
            iterations: self.params.max_iterations,
            residual_norm: norm_r,
        })
    }

    /// Runs the (right-preconditioned) stabilized bi-conjugate gradient method
    fn run_bicgstab(
        &self,
        system: &CrsSystem,
        b: &Vector,
        x: &mut Vector,
        target: f64,
    ) -> Result<usize, SolverFailure> {
        let n = system.nrow;
        let mut r = Vector::new(n);
        let mut norm_r = system.residual(&mut r, b, x);
        if norm_r <= target {
            return Ok(0);
        }
        let r_hat = r.clone();
        let mut p = Vector::new(n);
        let mut v = Vector::new(n);
        let mut p_hat = Vector::new(n);
        let mut s = Vector::new(n);
        let mut s_hat = Vector::new(n);
        let mut t = Vector::new(n);
        let (mut rho, mut alpha, mut omega) = (1.0, 1.0, 1.0);
        for k in 1..=self.params.max_iterations {
            let rho_new = vec_inner(&r_hat, &r);
            if rho_new == 0.0 || !rho_new.is_finite() {
                return Err(SolverFailure::Breakdown(k));
            }
            let beta = (rho_new / rho) * (alpha / omega);
            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
            }
            self.precondition(&mut p_hat, &p);
            system.mat_vec(&mut v, &p_hat);
            let denominator = vec_inner(&r_hat, &v);
            if denominator == 0.0 || !denominator.is_finite() {
                return Err(SolverFailure::Breakdown(k));
            }
            alpha = rho_new / denominator;
            for i in 0..n {
                s[i] = r[i] - alpha * v[i];
            }
            if vec_norm(&s, Norm::Euc) <= target {
                vec_update(x, alpha, &p_hat)?;
                return Ok(k);
            }
            self.precondition(&mut s_hat, &s);
            system.mat_vec(&mut t, &s_hat);
            let tt = vec_inner(&t, &t);
            if tt == 0.0 || !tt.is_finite() {
                return Err(SolverFailure::Breakdown(k));
            }
            omega = vec_inner(&t, &s) / tt;
            for i in 0..n {
                x[i] += alpha * p_hat[i] + omega * s_hat[i];
                r[i] = s[i] - omega * t[i];
            }
            norm_r = vec_norm(&r, Norm::Euc);
            if norm_r <= target {
                return Ok(k);
            }
            if omega == 0.0 {
                return Err(SolverFailure::Breakdown(k));
            }
            rho = rho_new;
        }
        Err(SolverFailure::NotConverged {
            iterations: self.params.max_iterations,
            residual_norm: norm_r,
        })
    }
}

impl LinSolAdapter for SolverKrylov {
    fn configure(&mut self, params: &LinSolParams) -> Result<(), StrError> {
        if params.is_direct() {
            return Err("Krylov solver requires the Cg or BiCgStab kind");
        }
        if params.validate().is_some() {
            return Err("Krylov solver parameters are invalid");
        }
        self.params = *params;
        Ok(())
    }

    fn assemble_from(
        &mut self,
        values: &[f64],
        row_pointers: &[usize],
        col_indices: &[usize],
        symmetric: bool,
    ) -> Result<(), StrError> {
        // reuse the structure when possible
        match self.system.as_mut() {
            Some(system) if system.same_structure(row_pointers, col_indices, symmetric) => {
                system.set_values(values)?;
            }
            _ => {
                self.system = Some(CrsSystem::new(values, row_pointers, col_indices, symmetric)?);
            }
        }

        // inverse of the diagonal (a zero diagonal is not scaled)
        if let Some(system) = self.system.as_ref() {
            let diagonal = system.diagonal();
            self.inv_diag = Vector::filled(system.nrow, 1.0);
            for i in 0..system.nrow {
                if diagonal[i] != 0.0 {
                    self.inv_diag[i] = 1.0 / diagonal[i];
                }
            }
        }
        Ok(())
    }

    fn solve(&mut self, rhs: &Vector, x: &mut Vector) -> Result<SolveReport, SolverFailure> {
        // check
        let system = self.system.as_ref().ok_or("the system must be assembled before solving")?;
        if rhs.dim() != system.nrow || x.dim() != system.nrow {
            return Err(SolverFailure::Backend("vectors have incompatible dimensions"));
        }

        // trivial solution
        let norm_b = vec_norm(rhs, Norm::Euc);
        if norm_b == 0.0 {
            x.fill(0.0);
            return Ok(SolveReport {
                iterations: 0,
                residual_norm: 0.0,
            });
        }

        // run
        let target = self.params.tolerance * norm_b;
        let iterations = match self.params.kind {
            SolverKind::BiCgStab => self.run_bicgstab(system, rhs, x, target)?,
            _ => self.run_cg(system, rhs, x, target)?,
        };
        let mut r = Vector::new(system.nrow);
        let residual_norm = system.residual(&mut r, rhs, x);
        Ok(SolveReport {
            iterations,
            residual_norm,
        })
    }

    fn name(&self) -> &str {
        match self.params.kind {
            SolverKind::BiCgStab => "BiCgStab",
            _ => "Cg",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SolverKrylov;
    use crate::solver::{LinSolAdapter, LinSolParams, PreconditionerKind, SolverFailure, SolverKind};
    use russell_lab::{approx_eq, Vector};

    // tridiagonal SPD matrix (2, -1) of dimension n in CRS format
    fn laplacian(n: usize) -> (Vec<f64>, Vec<usize>, Vec<usize>) {
        let mut values = Vec::new();
        let mut row_pointers = vec![0];
        let mut col_indices = Vec::new();
        for i in 0..n {
            if i > 0 {
                values.push(-1.0);
                col_indices.push(i - 1);
            }
            values.push(2.0);
            col_indices.push(i);
            if i + 1 < n {
                values.push(-1.0);
                col_indices.push(i + 1);
            }
            row_pointers.push(values.len());
        }
        (values, row_pointers, col_indices)
    }

    #[test]
    fn configure_captures_errors() {
        let mut solver = SolverKrylov::new();
        assert_eq!(
            solver.configure(&LinSolParams::new_direct()).err(),
            Some("Krylov solver requires the Cg or BiCgStab kind")
        );
        let mut params = LinSolParams::new();
        params.tolerance = 0.0;
        assert_eq!(
            solver.configure(&params).err(),
            Some("Krylov solver parameters are invalid")
        );
        let rhs = Vector::new(2);
        let mut x = Vector::new(2);
        assert_eq!(
            solver.solve(&rhs, &mut x).err(),
            Some(SolverFailure::Backend("the system must be assembled before solving"))
        );
    }

    #[test]
    fn cg_works() {
        let n = 20;
        let (values, row_pointers, col_indices) = laplacian(n);
        for preconditioner in [PreconditionerKind::None, PreconditionerKind::Jacobi] {
            let mut params = LinSolParams::new();
            params.preconditioner = preconditioner;
            let mut solver = SolverKrylov::new();
            solver.configure(&params).unwrap();
            solver.assemble_from(&values, &row_pointers, &col_indices, false).unwrap();
            // x = (1, 1, ..., 1) gives b = (1, 0, ..., 0, 1)
            let mut rhs = Vector::new(n);
            rhs[0] = 1.0;
            rhs[n - 1] = 1.0;
            let mut x = Vector::new(n);
            let report = solver.solve(&rhs, &mut x).unwrap();
            assert!(report.iterations <= 2 * n);
            assert!(report.residual_norm < 1e-10);
            for i in 0..n {
                approx_eq(x[i], 1.0, 1e-8);
            }
        }
    }

    #[test]
    fn cg_works_with_upper_triangle() {
        let values = [4.0, 1.0, 3.0];
        let mut solver = SolverKrylov::new();
        solver.configure(&LinSolParams::new()).unwrap();
        solver.assemble_from(&values, &[0, 2, 3], &[0, 1, 1], true).unwrap();
        let rhs = Vector::from(&[1.0, 2.0]);
        let mut x = Vector::new(2);
        solver.solve(&rhs, &mut x).unwrap();
        approx_eq(x[0], 1.0 / 11.0, 1e-12);
        approx_eq(x[1], 7.0 / 11.0, 1e-12);
    }

    #[test]
    fn bicgstab_works() {
        // ┌       ┐
        // │ 4 1 0 │
        // │ 2 5 1 │
        // │ 0 3 6 │
        // └       ┘
        let values = [4.0, 1.0, 2.0, 5.0, 1.0, 3.0, 6.0];
        let row_pointers = [0, 2, 5, 7];
        let col_indices = [0, 1, 0, 1, 2, 1, 2];
        let mut params = LinSolParams::new();
        params.kind = SolverKind::BiCgStab;
        let mut solver = SolverKrylov::new();
        solver.configure(&params).unwrap();
        solver.assemble_from(&values, &row_pointers, &col_indices, false).unwrap();
        assert_eq!(solver.name(), "BiCgStab");
        // x = (1, 2, 3)
        let rhs = Vector::from(&[6.0, 15.0, 24.0]);
        let mut x = Vector::new(3);
        let report = solver.solve(&rhs, &mut x).unwrap();
        assert!(report.residual_norm < 1e-10);
        approx_eq(x[0], 1.0, 1e-9);
        approx_eq(x[1], 2.0, 1e-9);
        approx_eq(x[2], 3.0, 1e-9);
    }

    #[test]
    fn solve_reports_non_convergence() {
        let n = 50;
        let (values, row_pointers, col_indices) = laplacian(n);
        let mut params = LinSolParams::new();
        params.preconditioner = PreconditionerKind::None;
        params.max_iterations = 2;
        let mut solver = SolverKrylov::new();
        solver.configure(&params).unwrap();
        solver.assemble_from(&values, &row_pointers, &col_indices, false).unwrap();
        let rhs = Vector::filled(n, 1.0);
        let mut x = Vector::new(n);
        match solver.solve(&rhs, &mut x) {
            Err(SolverFailure::NotConverged { iterations, .. }) => assert_eq!(iterations, 2),
            _ => panic!("NotConverged should have been reported"),
        }
    }

    #[test]
    fn solve_handles_zero_rhs() {
        let (values, row_pointers, col_indices) = laplacian(3);
        let mut solver = SolverKrylov::new();
        solver.configure(&LinSolParams::new()).unwrap();
        solver.assemble_from(&values, &row_pointers, &col_indices, false).unwrap();
        let rhs = Vector::new(3);
        let mut x = Vector::filled(3, 7.0);
        let report = solver.solve(&rhs, &mut x).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(x.as_data(), &[0.0, 0.0, 0.0]);
    }
}
