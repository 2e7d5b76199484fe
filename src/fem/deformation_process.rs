use super::{dof_norms, max_relative_change, relative_errors, ControlConvergence, ConvergenceStatus};
use super::{DeformationState, LinearSystem};
use super::{ControllerStage, DivergenceReason, NonlinearOutcome, Process, ProcessCheckpoint, ProcessState};
use super::{SecondaryValues, SimContext};
use crate::base::{Config, Essential, ParamNonlinear, SimError};
use crate::solver::LinSolParams;
use crate::sparse::{BlockMatrix, SparseTopology};
use crate::StrError;
use russell_lab::{vec_norm, Norm, Vector};

/// Defines the mechanics of a deformation process
pub trait DeformationEquations {
    /// Calculates the residual vector `R = F_int - F_ext` at time t
    fn residual(
        &mut self,
        rr: &mut Vector,
        uu: &Vector,
        secondary: &SecondaryValues,
        t: f64,
        context: &SimContext,
    ) -> Result<(), StrError>;

    /// Calculates the tangent (Jacobian) matrix `K = ∂R/∂u`
    ///
    /// The matrix is zeroed before the call.
    fn tangent(
        &mut self,
        kk: &mut BlockMatrix,
        uu: &Vector,
        secondary: &SecondaryValues,
        context: &SimContext,
    ) -> Result<(), StrError>;

    /// Updates the trial secondary values (e.g., stresses) from the committed ones
    ///
    /// * `duu` -- cumulated increment of the unknowns within the current step
    fn update_secondary(
        &mut self,
        trial: &mut SecondaryValues,
        committed: &SecondaryValues,
        uu: &Vector,
        duu: &Vector,
    ) -> Result<(), StrError>;
}

/// Executes a deformation process with the Newton-Raphson method
///
/// The prescribed displacements are applied (as increments) at the beginning of each
/// coupling iteration; hence, the prescribed equations of the linear systems always
/// have zero corrections.
pub struct DeformationProcess<'a, E: DeformationEquations> {
    /// Name of the process
    name: String,

    /// Holds configuration parameters
    config: &'a Config,

    /// Holds the parameters of the nonlinear iterations
    param: ParamNonlinear,

    /// Holds the prescribed equations
    essential: &'a Essential,

    /// Holds the mechanics
    equations: E,

    /// Holds the global linear system `K ⋅ mdu = R`
    lin_sys: LinearSystem<'a>,

    /// Controls the convergence of the iterations
    control: ControlConvergence,

    /// Holds the state
    data: DeformationState,

    /// Residual vector
    rr: Vector,

    /// Minus the correction of the unknowns
    mdu: Vector,
}

impl<'a, E: DeformationEquations> DeformationProcess<'a, E> {
    /// Allocates a new instance
    ///
    /// * `secondary` -- the initial (committed) secondary values
    pub fn new(
        name: &str,
        topology: &'a SparseTopology,
        ndof: usize,
        config: &'a Config,
        param: ParamNonlinear,
        essential: &'a Essential,
        equations: E,
        secondary: SecondaryValues,
    ) -> Result<Self, StrError> {
        if let Some(message) = param.validate(ndof) {
            log::error!("{}", message);
            return Err("cannot allocate process because param.validate() failed");
        }
        let lin_sys = LinearSystem::new(topology, ndof, &config.lin_sol)?;
        let dim = lin_sys.dim();
        essential.validate(dim)?;
        let process = ProcessState::new(ndof, config.t_ini, param.n_max_iterations, config.n_max_coupling_iterations);
        Ok(DeformationProcess {
            name: name.to_string(),
            config,
            control: ControlConvergence::new(&param, ndof),
            param,
            essential,
            equations,
            lin_sys,
            data: DeformationState::new(process, dim, secondary),
            rr: Vector::new(dim),
            mdu: Vector::new(dim),
        })
    }

    /// Sets the initial displacements
    pub fn set_initial_solution(&mut self, values: &Vector) -> Result<(), StrError> {
        if values.dim() != self.data.uu.dim() {
            return Err("initial solution has incompatible dimension");
        }
        self.data.uu.as_mut_data().copy_from_slice(values.as_data());
        self.data.last_time_step_solution.as_mut_data().copy_from_slice(values.as_data());
        Ok(())
    }

    /// Stores the fluid pressure at the beginning of the simulation
    ///
    /// The pressure is typically published by a flow process and used by the
    /// mechanics to compute effective stresses w.r.t. the initial state.
    pub fn set_initial_fluid_pressure(&mut self, pressure: &Vector) {
        self.data.initial_fluid_pressure = Some(pressure.clone());
    }

    /// Returns the fluid pressure at the beginning of the simulation
    pub fn initial_fluid_pressure(&self) -> Option<&Vector> {
        self.data.initial_fluid_pressure.as_ref()
    }

    /// Returns the state
    pub fn deformation_state(&self) -> &DeformationState {
        &self.data
    }

    /// Returns the mechanics
    pub fn equations(&self) -> &E {
        &self.equations
    }

    /// Returns the convergence control
    pub fn control(&self) -> &ControlConvergence {
        &self.control
    }

    /// Returns the diverged outcome (and records it in the state)
    fn diverged(&mut self, iterations: usize, reason: DivergenceReason) -> NonlinearOutcome {
        let t = self.data.process.current_time;
        log::debug!("{}: Newton-Raphson iterations diverged ({}) at t = {:?}", self.name, reason, t);
        self.data.process.diverged = true;
        self.data.process.stage = ControllerStage::NonlinearDiverged;
        NonlinearOutcome::Diverged { iterations, reason }
    }
}

impl<'a, E: DeformationEquations> Process for DeformationProcess<'a, E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &ProcessState {
        &self.data.process
    }

    fn state_mut(&mut self) -> &mut ProcessState {
        &mut self.data.process
    }

    fn solution(&self) -> &Vector {
        &self.data.uu
    }

    fn begin_step(&mut self, dt: f64) {
        self.data.process.begin_step(dt);
        self.data.duu.fill(0.0);
        self.data.secondary.set(&self.data.secondary_committed);
    }

    fn begin_coupling_iteration(&mut self, outer: usize) {
        self.data.process.outer_iter = outer;
        self.data.process.inner_iter = 0;
        self.data.process.stage = ControllerStage::Idle;
        self.data.last_coupling_iteration_solution = Some(self.data.uu.clone());
    }

    fn execute_nonlinear(&mut self, context: &SimContext) -> Result<NonlinearOutcome, SimError> {
        let ndof = self.data.process.ndof();
        let t = self.data.process.current_time;

        // apply the prescribed displacements
        let prescribed = self.essential.values(t);
        for (eq, value) in &prescribed {
            self.data.duu[*eq] += value - self.data.uu[*eq];
            self.data.uu[*eq] = *value;
        }
        let data = &mut self.data;
        self.equations
            .update_secondary(&mut data.secondary, &data.secondary_committed, &data.uu, &data.duu)?;
        let homogeneous: Vec<(usize, f64)> = prescribed.iter().map(|(eq, _)| (*eq, 0.0)).collect();

        // iterations
        self.control.reset();
        let n_max = if self.param.linear { 1 } else { self.param.n_max_iterations };
        let mut n_solves = 0;
        loop {
            self.data.process.inner_iter = n_solves + 1;

            // residual
            self.data.process.stage = ControllerStage::Assembling;
            let data = &mut self.data;
            self.equations.residual(&mut self.rr, &data.uu, &data.secondary, t, context)?;
            for (eq, _) in &prescribed {
                self.rr[*eq] = 0.0;
            }

            // errors
            let absolute = dof_norms(&self.rr, ndof, Norm::Euc);
            if n_solves == 0 {
                self.data.norm_rr0.copy_from_slice(&absolute);
            }
            self.data.process.relative_error = relative_errors(&absolute, &self.data.norm_rr0);
            self.data.process.absolute_error = absolute;

            // check
            let status = self.control.analyze(&self.data.process);
            self.control
                .print_iteration(self.config.verbose_iterations, &self.data.process, &self.name);
            match status {
                ConvergenceStatus::FoundNanOrInf => return Ok(self.diverged(n_solves, DivergenceReason::NanOrInf)),
                ConvergenceStatus::Converged
                    if n_solves > 0 || self.data.norm_rr0.iter().all(|r| *r <= self.param.tol_abs) =>
                {
                    break
                }
                ConvergenceStatus::Diverging => return Ok(self.diverged(n_solves, DivergenceReason::NormGrowth)),
                _ => (),
            }
            if self.param.linear && n_solves == 1 {
                break;
            }
            if n_solves == n_max {
                return Ok(self.diverged(n_solves, DivergenceReason::MaxIterations));
            }

            // tangent
            self.lin_sys.reset();
            let data = &self.data;
            self.equations
                .tangent(&mut self.lin_sys.kk, &data.uu, &data.secondary, context)?;
            self.lin_sys.rhs.as_mut_data().copy_from_slice(self.rr.as_data());
            self.lin_sys.eliminate(&homogeneous, self.config.also_eliminate_column)?;

            // solve K ⋅ mdu = R
            self.data.process.stage = ControllerStage::LinearSolving;
            self.mdu.fill(0.0);
            n_solves += 1;
            if let Err(failure) = self.lin_sys.solve(&mut self.mdu) {
                return Ok(self.diverged(n_solves, DivergenceReason::Solver(failure)));
            }

            // update
            for i in 0..self.mdu.dim() {
                self.data.uu[i] -= self.mdu[i];
                self.data.duu[i] -= self.mdu[i];
            }
            let data = &mut self.data;
            self.equations
                .update_secondary(&mut data.secondary, &data.secondary_committed, &data.uu, &data.duu)?;
            data.process.unknowns_norm = vec_norm(&data.uu, Norm::Euc);
        }
        self.data.process.stage = ControllerStage::NonlinearConverged;
        Ok(NonlinearOutcome::Converged { iterations: n_solves })
    }

    fn coupling_change(&mut self) -> f64 {
        let ndof = self.data.process.ndof();
        let previous = match self.data.last_coupling_iteration_solution.as_ref() {
            Some(uu) => uu,
            None => return 0.0,
        };
        let max_change = max_relative_change(&self.data.uu, previous, ndof);
        self.data.process.max_coupling_relative_error = max_change;
        max_change
    }

    fn accept_step(&mut self) {
        let data = &mut self.data;
        let step_change = max_relative_change(&data.uu, &data.last_time_step_solution, data.process.ndof());
        data.secondary_committed.set(&data.secondary);
        data.last_time_step_solution.as_mut_data().copy_from_slice(data.uu.as_data());
        data.process.accept(step_change);
    }

    fn reject_step(&mut self) {
        let data = &mut self.data;
        data.uu.as_mut_data().copy_from_slice(data.last_time_step_solution.as_data());
        data.duu.fill(0.0);
        data.secondary.set(&data.secondary_committed);
        data.process.reject();
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
            state: self.data.process.clone(),
            solution: self.data.uu.clone(),
            last_time_step_solution: self.data.last_time_step_solution.clone(),
            secondary: Some(self.data.secondary_committed.clone()),
            initial_fluid_pressure: self.data.initial_fluid_pressure.clone(),
        }
    }

    fn restore(&mut self, checkpoint: &ProcessCheckpoint) -> Result<(), SimError> {
        checkpoint.check(&self.name, self.data.uu.dim())?;
        let secondary = match checkpoint.secondary.as_ref() {
            Some(s) if s.same_layout(&self.data.secondary_committed) => s,
            _ => return Err(SimError::Corruption("checkpoint secondary values have incompatible layout")),
        };
        if checkpoint.state.ndof() != self.data.process.ndof() {
            return Err(SimError::Corruption("checkpoint state has incompatible number of DOFs"));
        }
        let data = &mut self.data;
        data.process = checkpoint.state.clone();
        data.uu.as_mut_data().copy_from_slice(checkpoint.solution.as_data());
        data.last_time_step_solution
            .as_mut_data()
            .copy_from_slice(checkpoint.last_time_step_solution.as_data());
        data.duu.fill(0.0);
        data.last_coupling_iteration_solution = None;
        data.secondary_committed.set(secondary);
        data.secondary.set(secondary);
        data.initial_fluid_pressure = checkpoint.initial_fluid_pressure.clone();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
