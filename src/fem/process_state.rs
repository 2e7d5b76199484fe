use serde::{Deserialize, Serialize};

/// Defines the stages of the execution of a process within a time step
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ControllerStage {
    /// Waiting for the next step (or coupling iteration)
    Idle,

    /// Assembling the global system
    Assembling,

    /// Solving the linear system
    LinearSolving,

    /// The nonlinear iterations converged
    NonlinearConverged,

    /// The nonlinear iterations diverged (or the solver failed)
    NonlinearDiverged,

    /// The coupling iterations converged
    CouplingConverged,

    /// The coupling iterations must continue
    CouplingContinuing,

    /// The step was accepted
    StepAccepted,

    /// The step was rejected
    StepRejected,
}

/// Holds the state of the execution of a process
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ProcessState {
    /// Time at the end of the current step
    pub current_time: f64,

    /// Time at the end of the last accepted step
    pub accepted_time: f64,

    /// Time increment of the current step
    pub dt: f64,

    /// Time increment of the last accepted step
    pub dt_previous: f64,

    /// The last finished step was accepted
    pub step_accepted: bool,

    /// Number of accepted steps
    pub steps_accepted: usize,

    /// Number of rejected steps
    pub steps_rejected: usize,

    /// The nonlinear iterations of the current step diverged
    pub diverged: bool,

    /// Current nonlinear (inner) iteration (1-based; zero before the first iteration)
    pub inner_iter: usize,

    /// Maximum number of nonlinear iterations
    pub inner_iter_max: usize,

    /// Current coupling (outer) iteration (1-based; zero before the first iteration)
    pub outer_iter: usize,

    /// Maximum number of coupling iterations
    pub outer_iter_max: usize,

    /// Relative error of each DOF block (last iteration)
    pub relative_error: Vec<f64>,

    /// Absolute error of each DOF block (last iteration)
    pub absolute_error: Vec<f64>,

    /// Maximum relative change of the unknowns between two coupling iterations
    pub max_coupling_relative_error: f64,

    /// Euclidean norm of the unknowns
    pub unknowns_norm: f64,

    /// Maximum relative change of the unknowns (over the DOF blocks) within the last accepted step
    pub step_change: f64,

    /// Maximum relative change of the unknowns within the accepted step before the last one
    pub step_change_previous: f64,

    /// Current stage of the execution
    pub stage: ControllerStage,
}

impl ProcessState {
    /// Allocates a new instance
    pub fn new(ndof: usize, t_ini: f64, inner_iter_max: usize, outer_iter_max: usize) -> Self {
        ProcessState {
            current_time: t_ini,
            accepted_time: t_ini,
            dt: 0.0,
            dt_previous: 0.0,
            step_accepted: false,
            steps_accepted: 0,
            steps_rejected: 0,
            diverged: false,
            inner_iter: 0,
            inner_iter_max,
            outer_iter: 0,
            outer_iter_max,
            relative_error: vec![0.0; ndof],
            absolute_error: vec![0.0; ndof],
            max_coupling_relative_error: 0.0,
            unknowns_norm: 0.0,
            step_change: 0.0,
            step_change_previous: 0.0,
            stage: ControllerStage::Idle,
        }
    }

    /// Returns the number of DOF blocks
    pub fn ndof(&self) -> usize {
        self.relative_error.len()
    }

    /// Starts a new step from the last accepted time
    pub fn begin_step(&mut self, dt: f64) {
        self.dt = dt;
        self.current_time = self.accepted_time + dt;
        self.diverged = false;
        self.inner_iter = 0;
        self.outer_iter = 0;
        self.max_coupling_relative_error = 0.0;
        self.relative_error.iter_mut().for_each(|x| *x = 0.0);
        self.absolute_error.iter_mut().for_each(|x| *x = 0.0);
        self.stage = ControllerStage::Idle;
    }

    /// Records the acceptance of the current step
    ///
    /// * `step_change` -- maximum relative change of the unknowns within the step
    pub fn accept(&mut self, step_change: f64) {
        self.step_change_previous = self.step_change;
        self.step_change = step_change;
        self.accepted_time = self.current_time;
        self.dt_previous = self.dt;
        self.step_accepted = true;
        self.steps_accepted += 1;
        self.stage = ControllerStage::StepAccepted;
    }

    /// Records the rejection of the current step (the time is rolled back)
    pub fn reject(&mut self) {
        self.current_time = self.accepted_time;
        self.step_accepted = false;
        self.steps_rejected += 1;
        self.stage = ControllerStage::StepRejected;
    }

    /// Returns the largest relative error over the DOF blocks
    pub fn max_relative_error(&self) -> f64 {
        self.relative_error.iter().fold(0.0, |acc, x| f64::max(acc, *x))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
