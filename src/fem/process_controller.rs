use super::{dof_norms, max_relative_change, relative_errors, ControlConvergence, ConvergenceStatus, LinearSystem};
use super::{ControllerStage, DivergenceReason, NonlinearOutcome, Process, ProcessCheckpoint, ProcessEquations};
use super::{ProcessState, SimContext};
use crate::base::{Config, ErrorMethod, Essential, ParamNonlinear, SimError};
use crate::solver::LinSolParams;
use crate::sparse::SparseTopology;
use crate::StrError;
use russell_lab::{vec_norm, Norm, Vector};

/// Executes a generic (linear or Picard-iterated) process
///
/// Each iteration runs, in this order: assembly of `kk ⋅ u_new = rhs`, elimination of the
/// prescribed equations, solution of the linear system (warm-started with the current
/// iterate), and the relaxed update `u += damping ⋅ (u_new - u)`.
pub struct ProcessController<'a, E: ProcessEquations> {
    /// Name of the process (key of the published field)
    name: String,

    /// Holds configuration parameters
    config: &'a Config,

    /// Holds the parameters of the nonlinear iterations
    param: ParamNonlinear,

    /// Holds the prescribed equations
    essential: &'a Essential,

    /// Holds the physics
    equations: E,

    /// Holds the global linear system
    lin_sys: LinearSystem<'a>,

    /// Controls the convergence of the iterations
    control: ControlConvergence,

    /// State of the execution
    state: ProcessState,

    /// Current iterate of the unknowns
    uu: Vector,

    /// Solution at the end of the last accepted step
    uu_last_step: Vector,

    /// Iterate at the beginning of the current coupling iteration
    uu_last_coupling: Vector,

    /// Solution of the linear system (the new iterate)
    uu_new: Vector,

    /// Change of the iterate
    delta: Vector,

    /// Residual of the free equations (for ErrorMethod::Bnorm)
    residual: Vector,

    /// Right-hand side of the free equations (for ErrorMethod::Bnorm)
    rhs_free: Vector,
}

impl<'a, E: ProcessEquations> ProcessController<'a, E> {
    /// Allocates a new instance
    ///
    /// The unknowns are ordered in DOF blocks of `topology.nrow()` rows each.
    pub fn new(
        name: &str,
        topology: &'a SparseTopology,
        ndof: usize,
        config: &'a Config,
        param: ParamNonlinear,
        essential: &'a Essential,
        equations: E,
    ) -> Result<Self, StrError> {
        if let Some(message) = param.validate(ndof) {
            log::error!("{}", message);
            return Err("cannot allocate process because param.validate() failed");
        }
        let lin_sys = LinearSystem::new(topology, ndof, &config.lin_sol)?;
        let dim = lin_sys.dim();
        essential.validate(dim)?;
        Ok(ProcessController {
            name: name.to_string(),
            config,
            control: ControlConvergence::new(&param, ndof),
            state: ProcessState::new(ndof, config.t_ini, param.n_max_iterations, config.n_max_coupling_iterations),
            param,
            essential,
            equations,
            lin_sys,
            uu: Vector::new(dim),
            uu_last_step: Vector::new(dim),
            uu_last_coupling: Vector::new(dim),
            uu_new: Vector::new(dim),
            delta: Vector::new(dim),
            residual: Vector::new(dim),
            rhs_free: Vector::new(dim),
        })
    }

    /// Sets the initial values of the unknowns
    pub fn set_initial_solution(&mut self, values: &Vector) -> Result<(), StrError> {
        if values.dim() != self.uu.dim() {
            return Err("initial solution has incompatible dimension");
        }
        self.uu.as_mut_data().copy_from_slice(values.as_data());
        self.uu_last_step.as_mut_data().copy_from_slice(values.as_data());
        self.uu_last_coupling.as_mut_data().copy_from_slice(values.as_data());
        Ok(())
    }

    /// Returns the physics
    pub fn equations(&self) -> &E {
        &self.equations
    }

    /// Returns the convergence control (e.g., to inspect the error history)
    pub fn control(&self) -> &ControlConvergence {
        &self.control
    }

    /// Returns the solution at the end of the last accepted step
    pub fn last_time_step_solution(&self) -> &Vector {
        &self.uu_last_step
    }

    /// Computes the residual of the free equations before the elimination (ErrorMethod::Bnorm)
    fn free_residual(&mut self, prescribed: &[(usize, f64)]) -> Result<(), StrError> {
        self.lin_sys.kk.mat_vec(&mut self.residual, &self.uu)?;
        for i in 0..self.residual.dim() {
            self.residual[i] = self.lin_sys.rhs[i] - self.residual[i];
            self.rhs_free[i] = self.lin_sys.rhs[i];
        }
        for (eq, _) in prescribed {
            self.residual[*eq] = 0.0;
            self.rhs_free[*eq] = 0.0;
        }
        Ok(())
    }

    /// Returns the diverged outcome (and records it in the state)
    fn diverged(&mut self, iterations: usize, reason: DivergenceReason) -> NonlinearOutcome {
        log::debug!("{}: nonlinear iterations diverged ({}) at t = {:?}", self.name, reason, self.state.current_time);
        self.state.diverged = true;
        self.state.stage = ControllerStage::NonlinearDiverged;
        NonlinearOutcome::Diverged { iterations, reason }
    }
}

impl<'a, E: ProcessEquations> Process for ProcessController<'a, E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &ProcessState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcessState {
        &mut self.state
    }

    fn solution(&self) -> &Vector {
        &self.uu
    }

    fn begin_step(&mut self, dt: f64) {
        self.state.begin_step(dt);
    }

    fn begin_coupling_iteration(&mut self, outer: usize) {
        self.state.outer_iter = outer;
        self.state.inner_iter = 0;
        self.state.stage = ControllerStage::Idle;
        self.uu_last_coupling.as_mut_data().copy_from_slice(self.uu.as_data());
    }

    fn execute_nonlinear(&mut self, context: &SimContext) -> Result<NonlinearOutcome, SimError> {
        let ndof = self.state.ndof();
        let prescribed = self.essential.values(self.state.current_time);
        for (eq, value) in &prescribed {
            self.uu[*eq] = *value;
        }
        self.control.reset();
        let n_max = if self.param.linear { 1 } else { self.param.n_max_iterations };
        for iteration in 1..=n_max {
            self.state.inner_iter = iteration;

            // assemble
            self.state.stage = ControllerStage::Assembling;
            self.lin_sys.reset();
            self.equations.assemble(
                &mut self.lin_sys.kk,
                &mut self.lin_sys.rhs,
                &self.uu,
                &self.state,
                context,
            )?;
            if self.param.error_method == ErrorMethod::Bnorm {
                self.free_residual(&prescribed)?;
            }
            self.lin_sys.eliminate(&prescribed, self.config.also_eliminate_column)?;

            // solve
            self.state.stage = ControllerStage::LinearSolving;
            self.uu_new.as_mut_data().copy_from_slice(self.uu.as_data());
            if let Err(failure) = self.lin_sys.solve(&mut self.uu_new) {
                return Ok(self.diverged(iteration, DivergenceReason::Solver(failure)));
            }

            // update
            for i in 0..self.uu.dim() {
                self.delta[i] = self.uu_new[i] - self.uu[i];
                self.uu[i] += self.param.damping * self.delta[i];
            }

            // errors
            let (absolute, reference) = match self.param.error_method {
                ErrorMethod::Enorm => (dof_norms(&self.delta, ndof, Norm::Euc), dof_norms(&self.uu, ndof, Norm::Euc)),
                ErrorMethod::Lmax => (dof_norms(&self.delta, ndof, Norm::Max), dof_norms(&self.uu, ndof, Norm::Max)),
                ErrorMethod::Bnorm => (
                    dof_norms(&self.residual, ndof, Norm::Euc),
                    dof_norms(&self.rhs_free, ndof, Norm::Euc),
                ),
            };
            self.state.relative_error = relative_errors(&absolute, &reference);
            self.state.absolute_error = absolute;
            self.state.unknowns_norm = vec_norm(&self.uu, Norm::Euc);

            // check
            let status = self.control.analyze(&self.state);
            self.control.print_iteration(self.config.verbose_iterations, &self.state, &self.name);
            match status {
                ConvergenceStatus::FoundNanOrInf => return Ok(self.diverged(iteration, DivergenceReason::NanOrInf)),
                _ if self.param.linear => break,
                ConvergenceStatus::Converged => break,
                ConvergenceStatus::Diverging => return Ok(self.diverged(iteration, DivergenceReason::NormGrowth)),
                ConvergenceStatus::Converging => {
                    if iteration == n_max {
                        return Ok(self.diverged(iteration, DivergenceReason::MaxIterations));
                    }
                }
            }
        }
        self.state.stage = ControllerStage::NonlinearConverged;
        Ok(NonlinearOutcome::Converged {
            iterations: self.state.inner_iter,
        })
    }

    fn coupling_change(&mut self) -> f64 {
        let max_change = max_relative_change(&self.uu, &self.uu_last_coupling, self.state.ndof());
        self.state.max_coupling_relative_error = max_change;
        max_change
    }

    fn accept_step(&mut self) {
        let step_change = max_relative_change(&self.uu, &self.uu_last_step, self.state.ndof());
        self.equations.commit(&self.uu);
        self.uu_last_step.as_mut_data().copy_from_slice(self.uu.as_data());
        self.state.accept(step_change);
    }

    fn reject_step(&mut self) {
        self.uu.as_mut_data().copy_from_slice(self.uu_last_step.as_data());
        self.state.reject();
    }

    fn reconfigure_solver(&mut self, params: &LinSolParams) -> Result<(), StrError> {
        self.lin_sys.reconfigure(params)
    }

    fn solver_name(&self) -> &str {
        self.lin_sys.solver_name()
    }

    fn checkpoint(&self) -> ProcessCheckpoint {
        ProcessCheckpoint {
            name: self.name.clone(),
            state: self.state.clone(),
            solution: self.uu.clone(),
            last_time_step_solution: self.uu_last_step.clone(),
            secondary: None,
            initial_fluid_pressure: None,
        }
    }

    fn restore(&mut self, checkpoint: &ProcessCheckpoint) -> Result<(), SimError> {
        checkpoint.check(&self.name, self.uu.dim())?;
        if checkpoint.state.ndof() != self.state.ndof() {
            return Err(SimError::Corruption("checkpoint state has incompatible number of DOFs"));
        }
        self.state = checkpoint.state.clone();
        self.uu.as_mut_data().copy_from_slice(checkpoint.solution.as_data());
        self.uu_last_step
            .as_mut_data()
            .copy_from_slice(checkpoint.last_time_step_solution.as_data());
        self.uu_last_coupling.as_mut_data().copy_from_slice(checkpoint.solution.as_data());
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ProcessController;
    use crate::base::{Config, ErrorMethod, Essential, ParamNonlinear, SimError};
    use crate::fem::{ControllerStage, DivergenceReason, NonlinearOutcome, Process, ProcessEquations};
    use crate::fem::{ProcessState, SimContext};
    use crate::solver::LinSolParams;
    use crate::sparse::{BlockMatrix, Connectivity, SparseTopology};
    use crate::StrError;
    use russell_lab::{approx_eq, Vector};

    /// Solves x = cos(x) / 2 by successive substitution
    struct FixedPoint {
        n_commit: usize,
    }

    impl ProcessEquations for FixedPoint {
        fn assemble(
            &mut self,
            kk: &mut BlockMatrix,
            rhs: &mut Vector,
            uu: &Vector,
            _state: &ProcessState,
            _context: &SimContext,
        ) -> Result<(), StrError> {
            *kk.at_mut(0, 0) = 1.0;
            rhs[0] = f64::cos(uu[0]) / 2.0;
            Ok(())
        }
        fn commit(&mut self, _uu: &Vector) {
            self.n_commit += 1;
        }
    }

    /// Solves x = 2 x + 1 by successive substitution (diverges)
    struct Unstable;

    impl ProcessEquations for Unstable {
        fn assemble(
            &mut self,
            kk: &mut BlockMatrix,
            rhs: &mut Vector,
            uu: &Vector,
            _state: &ProcessState,
            _context: &SimContext,
        ) -> Result<(), StrError> {
            *kk.at_mut(0, 0) = 1.0;
            rhs[0] = 2.0 * uu[0] + 1.0;
            Ok(())
        }
    }

    /// Implements a Laplacian chain with `t` prescribed at the right end
    struct Chain;

    impl ProcessEquations for Chain {
        fn assemble(
            &mut self,
            kk: &mut BlockMatrix,
            _rhs: &mut Vector,
            _uu: &Vector,
            _state: &ProcessState,
            _context: &SimContext,
        ) -> Result<(), StrError> {
            let n = kk.dim();
            for e in 0..(n - 1) {
                *kk.at_mut(e, e) += 1.0;
                *kk.at_mut(e, e + 1) -= 1.0;
                *kk.at_mut(e + 1, e) -= 1.0;
                *kk.at_mut(e + 1, e + 1) += 1.0;
            }
            Ok(())
        }
    }

    fn scalar_topology() -> SparseTopology {
        let conn = Connectivity::new(1).unwrap();
        SparseTopology::new(&conn, crate::base::Storage::Crs, false).unwrap()
    }

    #[test]
    fn new_captures_errors() {
        let topology = scalar_topology();
        let config = Config::new();
        let mut param = ParamNonlinear::new();
        param.damping = 0.0;
        let essential = Essential::new();
        let equations = FixedPoint { n_commit: 0 };
        assert_eq!(
            ProcessController::new("x", &topology, 1, &config, param, &essential, equations).err(),
            Some("cannot allocate process because param.validate() failed")
        );
        let mut essential = Essential::new();
        essential.at(&[1], |_| 0.0);
        let equations = FixedPoint { n_commit: 0 };
        assert_eq!(
            ProcessController::new("x", &topology, 1, &config, ParamNonlinear::new(), &essential, equations).err(),
            Some("prescribed equation is out of range")
        );
    }

    #[test]
    fn picard_iterations_work() {
        let topology = scalar_topology();
        let mut config = Config::new();
        config.lin_sol = LinSolParams::new_direct();
        let essential = Essential::new();
        let mut param = ParamNonlinear::new();
        param.tolerances = vec![1e-10];
        let equations = FixedPoint { n_commit: 0 };
        let mut process = ProcessController::new("x", &topology, 1, &config, param, &essential, equations).unwrap();
        let context = SimContext::new();
        process.begin_step(0.1);
        process.begin_coupling_iteration(1);
        let outcome = process.execute_nonlinear(&context).unwrap();
        assert!(outcome.converged());
        assert!(outcome.iterations() > 3);
        assert_eq!(process.state().stage, ControllerStage::NonlinearConverged);
        let x = process.solution()[0];
        approx_eq(x, f64::cos(x) / 2.0, 1e-9);
        approx_eq(x, 0.4501836112948736, 1e-9);

        // the errors decrease monotonically (contraction)
        let history = process.control().history();
        for k in 1..history.len() {
            assert!(history[k] < history[k - 1]);
        }

        process.accept_step();
        assert_eq!(process.equations().n_commit, 1);
        assert_eq!(process.last_time_step_solution()[0], x);
        assert_eq!(process.state().accepted_time, 0.1);
    }

    #[test]
    fn divergence_is_detected_and_rolled_back() {
        let topology = scalar_topology();
        let mut config = Config::new();
        config.lin_sol = LinSolParams::new_direct();
        let essential = Essential::new();
        let mut param = ParamNonlinear::new();
        param.divergence_growth = Some(10.0);
        let mut process = ProcessController::new("x", &topology, 1, &config, param, &essential, Unstable).unwrap();
        process.set_initial_solution(&Vector::from(&[1.0])).unwrap();
        let context = SimContext::new();
        process.begin_step(0.1);
        process.begin_coupling_iteration(1);
        let outcome = process.execute_nonlinear(&context).unwrap();
        assert_eq!(
            outcome,
            NonlinearOutcome::Diverged {
                iterations: 5,
                reason: DivergenceReason::NormGrowth
            }
        );
        assert!(process.state().diverged);
        process.reject_step();
        assert_eq!(process.solution().as_data(), &[1.0]);
        assert_eq!(process.state().current_time, 0.0);
        assert_eq!(process.state().steps_rejected, 1);
    }

    #[test]
    fn max_iterations_is_detected() {
        let topology = scalar_topology();
        let mut config = Config::new();
        config.lin_sol = LinSolParams::new_direct();
        let essential = Essential::new();
        let mut param = ParamNonlinear::new();
        param.n_max_iterations = 3;
        param.divergence_growth = None;
        let mut process = ProcessController::new("x", &topology, 1, &config, param, &essential, Unstable).unwrap();
        let context = SimContext::new();
        process.begin_step(0.1);
        process.begin_coupling_iteration(1);
        let outcome = process.execute_nonlinear(&context).unwrap();
        assert_eq!(
            outcome,
            NonlinearOutcome::Diverged {
                iterations: 3,
                reason: DivergenceReason::MaxIterations
            }
        );
    }

    #[test]
    fn linear_process_with_prescribed_values_works() {
        let conn = Connectivity::from_rows(5, &[vec![1], vec![2], vec![3], vec![4], vec![]]).unwrap();
        for method in [ErrorMethod::Enorm, ErrorMethod::Lmax, ErrorMethod::Bnorm] {
            let topology = SparseTopology::new(&conn, crate::base::Storage::Jds, false).unwrap();
            let mut config = Config::new();
            config.also_eliminate_column = true;
            let mut essential = Essential::new();
            essential.at(&[0], |_| 0.0).at(&[4], |t| 4.0 * t);
            let mut param = ParamNonlinear::new();
            param.linear = true;
            param.error_method = method;
            let mut process = ProcessController::new("u", &topology, 1, &config, param, &essential, Chain).unwrap();
            let context = SimContext::new();
            process.begin_step(0.5);
            process.begin_coupling_iteration(1);
            let outcome = process.execute_nonlinear(&context).unwrap();
            assert_eq!(outcome, NonlinearOutcome::Converged { iterations: 1 });
            for i in 0..5 {
                approx_eq(process.solution()[i], 0.5 * i as f64, 1e-10);
            }
            assert!(process.coupling_change() > 0.99);
        }
    }

    #[test]
    fn checkpoint_and_restore_work() {
        let topology = scalar_topology();
        let mut config = Config::new();
        config.lin_sol = LinSolParams::new_direct();
        let essential = Essential::new();
        let equations = FixedPoint { n_commit: 0 };
        let mut process =
            ProcessController::new("x", &topology, 1, &config, ParamNonlinear::new(), &essential, equations).unwrap();
        let context = SimContext::new();
        process.begin_step(0.1);
        process.begin_coupling_iteration(1);
        process.execute_nonlinear(&context).unwrap();
        process.accept_step();
        let checkpoint = process.checkpoint();
        assert_eq!(checkpoint.name, "x");

        let equations = FixedPoint { n_commit: 0 };
        let mut other =
            ProcessController::new("x", &topology, 1, &config, ParamNonlinear::new(), &essential, equations).unwrap();
        other.restore(&checkpoint).unwrap();
        assert_eq!(other.state(), process.state());
        assert_eq!(other.solution().as_data(), process.solution().as_data());

        let equations = FixedPoint { n_commit: 0 };
        let mut wrong =
            ProcessController::new("y", &topology, 1, &config, ParamNonlinear::new(), &essential, equations).unwrap();
        assert_eq!(
            wrong.restore(&checkpoint).err(),
            Some(SimError::Corruption("checkpoint belongs to another process"))
        );
    }
}
