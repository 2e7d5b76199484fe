use super::{Checkpoint, ControlTime, ControllerStage, DivergenceReason, NonlinearOutcome, Process, SimContext};
use crate::base::{Config, DivergencePolicy, SimError};
use crate::solver::SolverFailure;
use crate::StrError;

/// Holds the summary of an accepted time step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Time at the end of the step
    pub t: f64,

    /// Time increment of the (accepted) step
    pub dt: f64,

    /// Largest number of nonlinear iterations of a process in the step
    pub n_iterations: usize,

    /// Number of coupling iterations
    pub n_coupling_iterations: usize,

    /// Number of rejections before the step was accepted
    pub n_rejections: usize,

    /// Largest relative change of the unknowns (over processes and DOF blocks) within the step
    pub step_change: f64,
}

/// Defines the outcome of one attempt to run a time step
enum Attempt {
    Accepted { n_iterations: usize, n_coupling: usize },
    Rejected { diverged: bool },
}

/// Returns true if the coupling iterations converged
///
/// The criterion is the maximum of the relative changes of all processes;
/// hence, a single process with a large change prevents convergence.
pub fn coupling_converged(changes: &[f64], tol: f64) -> bool {
    changes.iter().all(|change| *change < tol)
}

/// Runs the time loop of a coupled simulation
///
/// Within a time step, the processes are executed in strict alternation (in the order
/// they were added); after each nonlinear solution, the process publishes its solution
/// to the context, where the other processes read it. The coupling (outer) iterations
/// continue until the maximum relative change over all processes is below `tol_coupling`.
///
/// If any process diverges, or the coupling iterations do not converge, all processes
/// roll back to the last accepted step and the step is retried with a reduced Δt.
pub struct Simulation<'a> {
    /// Holds configuration parameters
    config: &'a Config,

    /// Holds the published solution fields
    context: SimContext,

    /// Holds the processes (in execution order)
    processes: Vec<Box<dyn Process + 'a>>,

    /// Time at the end of the last accepted step
    t: f64,

    /// Time increment of the next step
    dt_next: f64,

    /// Number of accepted steps
    timestep: usize,

    /// Number of linear solver failures so far
    n_solver_failures: usize,

    /// The processes use the fallback linear solver parameters
    using_fallback: bool,
}

impl<'a> Simulation<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a Config) -> Result<Self, StrError> {
        if let Some(message) = config.validate() {
            log::error!("{}", message);
            return Err("cannot allocate simulation because config.validate() failed");
        }
        let dt_next = ControlTime::new(config).initial_dt()?;
        Ok(Simulation {
            config,
            context: SimContext::new(),
            processes: Vec::new(),
            t: config.t_ini,
            dt_next,
            timestep: 0,
            n_solver_failures: 0,
            using_fallback: false,
        })
    }

    /// Adds a process (executed after the previously added ones)
    ///
    /// The initial solution of the process is published to the context.
    pub fn add_process(&mut self, process: Box<dyn Process + 'a>) -> Result<&mut Self, StrError> {
        if self.processes.iter().any(|p| p.name() == process.name()) {
            return Err("process name must be unique");
        }
        self.context.publish(process.name(), process.solution());
        self.processes.push(process);
        Ok(self)
    }

    /// Returns the time at the end of the last accepted step
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Returns the time increment of the next step
    pub fn dt_next(&self) -> f64 {
        self.dt_next
    }

    /// Returns the number of accepted steps
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    /// Returns the number of linear solver failures so far
    pub fn n_solver_failures(&self) -> usize {
        self.n_solver_failures
    }

    /// Returns the published solution fields
    pub fn context(&self) -> &SimContext {
        &self.context
    }

    /// Returns a process by name
    pub fn process(&self, name: &str) -> Option<&dyn Process> {
        self.processes.iter().find(|p| p.name() == name).map(|p| p.as_ref() as &dyn Process)
    }

    /// Returns true if the final time has been reached
    pub fn finished(&self) -> bool {
        ControlTime::new(self.config).finished(self.t)
    }

    /// Runs the time loop until the final time (or the maximum number of steps)
    pub fn run(&mut self) -> Result<(), SimError> {
        self.config.print_header();
        while !self.finished() {
            if self.timestep >= self.config.n_max_time_steps {
                log::warn!("stopping at t = {:?}: the maximum number of time steps has been reached", self.t);
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    /// Runs one time step (including the retries of rejected attempts)
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        if self.processes.is_empty() {
            return Err(SimError::Precondition("simulation has no processes"));
        }
        if self.finished() {
            return Err(SimError::Precondition("the final time has already been reached"));
        }
        let control = ControlTime::new(self.config);
        let mut dt = control.clip(self.t, self.dt_next);
        let mut n_rejections = 0;
        loop {
            self.config.print_timestep(self.timestep, self.t + dt, dt);
            match self.attempt(dt)? {
                Attempt::Accepted { n_iterations, n_coupling } => {
                    self.t += dt;
                    self.timestep += 1;
                    let (change, change_previous) = self.step_changes();
                    self.dt_next = control.dt_after_accept(self.t, dt, n_iterations, change, change_previous);
                    log::debug!(
                        "step {} accepted at t = {:?} (Δt = {:?}, {} iterations, {} coupling iterations)",
                        self.timestep,
                        self.t,
                        dt,
                        n_iterations,
                        n_coupling
                    );
                    return Ok(StepReport {
                        t: self.t,
                        dt,
                        n_iterations,
                        n_coupling_iterations: n_coupling,
                        n_rejections,
                        step_change: change,
                    });
                }
                Attempt::Rejected { diverged } => {
                    for process in self.processes.iter_mut() {
                        process.reject_step();
                        self.context.publish(process.name(), process.solution());
                    }
                    n_rejections += 1;
                    if diverged && self.config.divergence_policy == DivergencePolicy::Abort {
                        return Err(SimError::Diverged { t: self.t + dt });
                    }
                    if n_rejections > self.config.n_max_step_retries {
                        return Err(SimError::RetriesExhausted {
                            retries: self.config.n_max_step_retries,
                            t: self.t,
                        });
                    }
                    dt = control.dt_after_reject(dt).map_err(|_| SimError::StepTooSmall {
                        dt: dt * self.config.dt_reduction,
                    })?;
                    log::warn!("step rejected at t = {:?}; retrying with Δt = {:?}", self.t, dt);
                }
            }
        }
    }

    /// Runs the coupling iterations of one attempt with time increment dt
    fn attempt(&mut self, dt: f64) -> Result<Attempt, SimError> {
        for process in self.processes.iter_mut() {
            process.begin_step(dt);
        }
        let single = self.processes.len() == 1;
        let n_outer_max = if single { 1 } else { self.config.n_max_coupling_iterations };
        let mut n_iterations = 0;
        let mut changes = vec![0.0; self.processes.len()];
        for outer in 1..=n_outer_max {
            for index in 0..self.processes.len() {
                let process = &mut self.processes[index];
                process.begin_coupling_iteration(outer);
                match process.execute_nonlinear(&self.context)? {
                    NonlinearOutcome::Converged { iterations } => n_iterations = usize::max(n_iterations, iterations),
                    NonlinearOutcome::Diverged { reason, .. } => {
                        if let DivergenceReason::Solver(failure) = reason {
                            self.solver_failed(failure)?;
                        }
                        return Ok(Attempt::Rejected { diverged: true });
                    }
                }
                changes[index] = process.coupling_change();
                self.context.publish(process.name(), process.solution());
            }

            // check coupling convergence
            let converged = single || coupling_converged(&changes, self.config.tol_coupling);
            let max_change = changes.iter().fold(0.0, |acc: f64, c| acc.max(*c));
            self.config.print_coupling(outer - 1, max_change);
            if converged {
                for process in self.processes.iter_mut() {
                    process.state_mut().stage = ControllerStage::CouplingConverged;
                    process.accept_step();
                    self.context.publish(process.name(), process.solution());
                }
                return Ok(Attempt::Accepted {
                    n_iterations,
                    n_coupling: outer,
                });
            }
            for process in self.processes.iter_mut() {
                process.state_mut().stage = ControllerStage::CouplingContinuing;
            }
        }
        log::debug!("coupling iterations did not converge after {} iterations", n_outer_max);
        Ok(Attempt::Rejected { diverged: false })
    }

    /// Returns the largest relative changes of the last two accepted steps over all processes
    ///
    /// The second value is None if fewer than two steps have been accepted.
    fn step_changes(&self) -> (f64, Option<f64>) {
        let change = self.processes.iter().fold(0.0, |acc, p| f64::max(acc, p.state().step_change));
        if self.timestep < 2 {
            return (change, None);
        }
        let previous = self
            .processes
            .iter()
            .fold(0.0, |acc, p| f64::max(acc, p.state().step_change_previous));
        (change, Some(previous))
    }

    /// Records a linear solver failure and switches to the fallback solver
    fn solver_failed(&mut self, failure: SolverFailure) -> Result<(), SimError> {
        self.n_solver_failures += 1;
        log::warn!(
            "linear solver failed ({}); {} of {} allowed failures",
            failure,
            self.n_solver_failures,
            self.config.n_max_solver_failures
        );
        if self.n_solver_failures > self.config.n_max_solver_failures {
            return Err(SimError::Solver(failure));
        }
        if let Some(fallback) = self.config.lin_sol_fallback.as_ref() {
            if !self.using_fallback {
                log::info!("switching to the fallback linear solver ({:?})", fallback.kind);
                for process in self.processes.iter_mut() {
                    process.reconfigure_solver(fallback)?;
                }
                self.using_fallback = true;
            }
        }
        Ok(())
    }

    /// Returns the data to restart the simulation
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            t: self.t,
            dt_next: self.dt_next,
            timestep: self.timestep,
            n_solver_failures: self.n_solver_failures,
            using_fallback: self.using_fallback,
            fields: self.context.fields.clone(),
            processes: self.processes.iter().map(|p| p.checkpoint()).collect(),
        }
    }

    /// Restores the simulation from a checkpoint
    ///
    /// The processes must have been added in the same order as in the checkpointed simulation.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), SimError> {
        if checkpoint.processes.len() != self.processes.len() {
            return Err(SimError::Corruption("checkpoint has a different number of processes"));
        }
        for (process, data) in self.processes.iter_mut().zip(&checkpoint.processes) {
            process.restore(data)?;
        }
        if checkpoint.using_fallback != self.using_fallback {
            let params = if checkpoint.using_fallback {
                self.config
                    .lin_sol_fallback
                    .as_ref()
                    .ok_or(SimError::Corruption("checkpoint requires the fallback linear solver"))?
            } else {
                &self.config.lin_sol
            };
            for process in self.processes.iter_mut() {
                process.reconfigure_solver(params)?;
            }
            self.using_fallback = checkpoint.using_fallback;
        }
        self.t = checkpoint.t;
        self.dt_next = checkpoint.dt_next;
        self.timestep = checkpoint.timestep;
        self.n_solver_failures = checkpoint.n_solver_failures;
        self.context.fields = checkpoint.fields.clone();
        log::info!("simulation restored at t = {:?} (step {})", self.t, self.timestep);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
