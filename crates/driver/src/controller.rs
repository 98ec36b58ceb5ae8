//! The time-step controller.
//!
//! A [`Controller`] owns the [`SimulationClock`], the [`Model`], the solver,
//! the ordered hooks and the optional output gate, and sequences every call
//! between them. It moves through [`Lifecycle`] states exactly once:
//!
//! ```text
//! Uninitialized --initialize--> Initialized --solve_loop--> Running --finalize--> Finalized
//!        \                           \                          \
//!         +---------------------------+--------------------------+--> Aborted (on error)
//! ```
//!
//! # Call order
//!
//! Construction runs the solver's `AddVariables`, `ImportModelPart` and
//! `AddDofs`. Then:
//!
//! 1. `initialize`: hooks `ExecuteInitialize`, solver `Initialize` and
//!    `SetEchoLevel`, gate `ExecuteInitialize`, hooks
//!    `ExecuteBeforeSolutionLoop`, gate `ExecuteBeforeSolutionLoop`.
//! 2. `solve_loop`, once per step while the [`EndTimeGuard`] allows: advance
//!    the clock, hooks `ExecuteInitializeSolutionStep`, gate
//!    `ExecuteInitializeSolutionStep`, solver `Solve`, hooks
//!    `ExecuteFinalizeSolutionStep`, gate `ExecuteFinalizeSolutionStep`, hooks
//!    `ExecuteBeforeOutputStep`, gate `PrintOutput` if `IsOutputStep`, hooks
//!    `ExecuteAfterOutputStep`.
//! 3. `finalize`: hooks `ExecuteFinalize`, gate `ExecuteFinalize`.
//!
//! Hooks always run in registration order. Gate calls are skipped entirely
//! when no gate is set.

use std::fmt;

use serde::{Deserialize, Serialize};
use stride_core::{
    BoxError, Context, EndTimeGuard, Hook, Model, OutputGate, Phase, SimulationClock, Solver,
};
use tracing::{debug, error, info, trace, warn};
use uom::si::{f64::Time, time::second};

use crate::{Error, FinalizeError, SetupError, SolverStage, Stage, StepError};

/// The controller's position in its one-way state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Running,
    Finalized,
    /// Terminal state entered when any transition fails.
    Aborted,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Finalized => "finalized",
            Self::Aborted => "aborted",
        })
    }
}

/// What the controller does after a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return the error immediately. No finalize callback runs.
    #[default]
    FailFast,

    /// Run every hook's and the gate's finalize callback before returning the
    /// error. Failures during this cleanup are logged and otherwise ignored.
    Finalize,
}

/// The result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Number of steps taken.
    pub steps: usize,

    /// Clock time after the last step.
    pub time: Time,
}

/// Drives a simulation from setup to finalize.
///
/// See the [module docs](self) for the exact call order.
pub struct Controller {
    lifecycle: Lifecycle,
    clock: SimulationClock,
    model: Model,
    solver: Box<dyn Solver>,
    hooks: Vec<Box<dyn Hook>>,
    output: Option<Box<dyn OutputGate>>,
    guard: EndTimeGuard,
    policy: FailurePolicy,
    echo_level: u32,
}

/// A hook callback failure, before it is attributed to a lifecycle stage.
struct HookFailure {
    name: String,
    phase: Phase,
    source: BoxError,
}

impl HookFailure {
    fn stage(self) -> (Stage, BoxError) {
        let stage = Stage::Hook {
            name: self.name,
            phase: self.phase,
        };
        (stage, self.source)
    }
}

/// Invokes `phase` on every hook in order, stopping at the first failure.
fn run_hooks(
    hooks: &mut [Box<dyn Hook>],
    phase: Phase,
    clock: &SimulationClock,
    model: &mut Model,
) -> Result<(), HookFailure> {
    for hook in hooks.iter_mut() {
        trace!(hook = hook.name(), %phase, "dispatch");
        let mut ctx = Context::new(clock, model);
        hook.dispatch(phase, &mut ctx).map_err(|source| HookFailure {
            name: hook.name().to_owned(),
            phase,
            source,
        })?;
    }
    Ok(())
}

impl Controller {
    /// Creates a controller and runs the solver's setup calls.
    ///
    /// On success the model contains every variable, part and degree of
    /// freedom the solver declares, so hooks can be built against it.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Solver`] if `AddVariables`, `ImportModelPart` or
    /// `AddDofs` fails.
    pub fn new(
        mut model: Model,
        clock: SimulationClock,
        mut solver: Box<dyn Solver>,
    ) -> Result<Self, Error> {
        let solver_setup = |stage| move |source| SetupError::Solver { stage, source };

        solver
            .add_variables(&mut model)
            .map_err(solver_setup(SolverStage::AddVariables))?;
        solver
            .import_model_part(&mut model)
            .map_err(solver_setup(SolverStage::ImportModelPart))?;
        solver
            .add_dofs(&mut model)
            .map_err(solver_setup(SolverStage::AddDofs))?;

        debug!(model = model.name(), "solver setup complete");

        Ok(Self {
            lifecycle: Lifecycle::Uninitialized,
            clock,
            model,
            solver,
            hooks: Vec::new(),
            output: None,
            guard: EndTimeGuard::default(),
            policy: FailurePolicy::default(),
            echo_level: 0,
        })
    }

    /// Sets how the loop compares the clock against the end time.
    #[must_use]
    pub fn with_end_time_guard(mut self, guard: EndTimeGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Sets what happens after a step fails.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the echo level passed to the solver during initialization.
    #[must_use]
    pub fn with_echo_level(mut self, echo_level: u32) -> Self {
        self.echo_level = echo_level;
        self
    }

    /// Appends a hook. Hooks run in the order they are added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] once the controller has been initialized.
    pub fn add_hook(&mut self, hook: Box<dyn Hook>) -> Result<(), Error> {
        self.ensure(Lifecycle::Uninitialized)?;
        self.hooks.push(hook);
        Ok(())
    }

    /// Enables output through `gate`, replacing any gate set before.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] once the controller has been initialized.
    pub fn set_output(&mut self, gate: Box<dyn OutputGate>) -> Result<(), Error> {
        self.ensure(Lifecycle::Uninitialized)?;
        self.output = Some(gate);
        Ok(())
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Returns the names of the registered hooks in invocation order.
    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|hook| hook.name())
    }

    /// Runs the whole lifecycle: initialize, solution loop, finalize.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any transition.
    pub fn run(&mut self) -> Result<RunSummary, Error> {
        self.initialize()?;
        self.solve_loop()?;
        self.finalize()?;

        Ok(RunSummary {
            steps: self.clock.step(),
            time: self.clock.time(),
        })
    }

    /// Moves from `Uninitialized` to `Initialized`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] if called in any other state, or a
    /// [`SetupError`] if a hook, the solver or the gate fails.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.ensure(Lifecycle::Uninitialized)?;
        info!(
            hooks = self.hooks.len(),
            output = self.output.is_some(),
            computing_part = self.solver.computing_model_part().unwrap_or(self.model.name()),
            "initializing"
        );

        match self.run_initialize() {
            Ok(()) => {
                self.lifecycle = Lifecycle::Initialized;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "initialization failed");
                self.lifecycle = Lifecycle::Aborted;
                Err(err.into())
            }
        }
    }

    fn run_initialize(&mut self) -> Result<(), SetupError> {
        let hook_failed = |failure: HookFailure| {
            let (stage, source) = failure.stage();
            SetupError::Callback { stage, source }
        };
        let output_failed = |call| {
            move |source| SetupError::Callback {
                stage: Stage::Output { call },
                source,
            }
        };

        run_hooks(&mut self.hooks, Phase::Initialize, &self.clock, &mut self.model)
            .map_err(hook_failed)?;

        self.solver
            .initialize(&mut self.model)
            .map_err(|source| SetupError::Solver {
                stage: SolverStage::Initialize,
                source,
            })?;
        self.solver.set_echo_level(self.echo_level);

        if let Some(gate) = self.output.as_mut() {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            gate.execute_initialize(&mut ctx)
                .map_err(output_failed("ExecuteInitialize"))?;
        }

        run_hooks(
            &mut self.hooks,
            Phase::BeforeSolutionLoop,
            &self.clock,
            &mut self.model,
        )
        .map_err(hook_failed)?;

        if let Some(gate) = self.output.as_mut() {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            gate.execute_before_solution_loop(&mut ctx)
                .map_err(output_failed("ExecuteBeforeSolutionLoop"))?;
        }

        Ok(())
    }

    /// Moves from `Initialized` to `Running` and steps until the end time.
    ///
    /// With no steps to take (end time before start time) this returns
    /// immediately, leaving the controller ready to finalize.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] if called in any other state, or the
    /// [`StepError`] of the first failing callback. After a step error the
    /// controller is `Aborted`; whether finalize callbacks ran depends on the
    /// [`FailurePolicy`].
    pub fn solve_loop(&mut self) -> Result<(), Error> {
        self.ensure(Lifecycle::Initialized)?;
        self.lifecycle = Lifecycle::Running;
        info!(
            start = self.clock.start_time().get::<second>(),
            end = self.clock.end_time().get::<second>(),
            dt = %self.clock.delta_time(),
            guard = ?self.guard,
            "entering solution loop"
        );

        while self.clock.should_continue(self.guard) {
            self.clock.advance();
            info!(step = self.clock.step(), time = self.clock.seconds(), "solution step");

            if let Err(err) = self.solve_step() {
                return Err(self.abort(err));
            }
        }

        Ok(())
    }

    fn solve_step(&mut self) -> Result<(), StepError> {
        let step = self.clock.step();
        let time = self.clock.seconds();
        let fail = |stage, source| StepError {
            step,
            time,
            stage,
            source,
        };
        let hook_failed = |failure: HookFailure| {
            let (stage, source) = failure.stage();
            fail(stage, source)
        };
        let output_failed = |call| move |source| fail(Stage::Output { call }, source);

        run_hooks(
            &mut self.hooks,
            Phase::InitializeSolutionStep,
            &self.clock,
            &mut self.model,
        )
        .map_err(hook_failed)?;

        if let Some(gate) = self.output.as_mut() {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            gate.execute_initialize_solution_step(&mut ctx)
                .map_err(output_failed("ExecuteInitializeSolutionStep"))?;
        }

        {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            self.solver
                .solve(&mut ctx)
                .map_err(|source| fail(Stage::Solve, source))?;
        }

        run_hooks(
            &mut self.hooks,
            Phase::FinalizeSolutionStep,
            &self.clock,
            &mut self.model,
        )
        .map_err(hook_failed)?;

        if let Some(gate) = self.output.as_mut() {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            gate.execute_finalize_solution_step(&mut ctx)
                .map_err(output_failed("ExecuteFinalizeSolutionStep"))?;
        }

        run_hooks(
            &mut self.hooks,
            Phase::BeforeOutputStep,
            &self.clock,
            &mut self.model,
        )
        .map_err(hook_failed)?;

        if let Some(gate) = self.output.as_mut()
            && gate.is_output_step(&self.clock)
        {
            debug!(step, "printing output");
            let mut ctx = Context::new(&self.clock, &mut self.model);
            gate.print_output(&mut ctx)
                .map_err(output_failed("PrintOutput"))?;
        }

        run_hooks(
            &mut self.hooks,
            Phase::AfterOutputStep,
            &self.clock,
            &mut self.model,
        )
        .map_err(hook_failed)?;

        Ok(())
    }

    /// Applies the failure policy to a step error and enters `Aborted`.
    fn abort(&mut self, err: StepError) -> Error {
        error!(error = %err, policy = ?self.policy, "solution step failed");

        if self.policy == FailurePolicy::Finalize {
            self.cleanup();
        }

        self.lifecycle = Lifecycle::Aborted;
        err.into()
    }

    /// Runs every finalize callback, logging failures instead of stopping.
    fn cleanup(&mut self) {
        for hook in &mut self.hooks {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            if let Err(err) = hook.execute_finalize(&mut ctx) {
                warn!(hook = hook.name(), error = %err, "finalize after failed step also failed");
            }
        }

        if let Some(gate) = self.output.as_mut() {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            if let Err(err) = gate.execute_finalize(&mut ctx) {
                warn!(error = %err, "output finalize after failed step also failed");
            }
        }
    }

    /// Moves from `Running` to `Finalized`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] if the solution loop has not completed, or
    /// a [`FinalizeError`] if a hook or the gate fails.
    pub fn finalize(&mut self) -> Result<(), Error> {
        self.ensure(Lifecycle::Running)?;

        match self.run_finalize() {
            Ok(()) => {
                self.lifecycle = Lifecycle::Finalized;
                info!(
                    steps = self.clock.step(),
                    time = self.clock.seconds(),
                    "analysis finished"
                );
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "finalize failed");
                self.lifecycle = Lifecycle::Aborted;
                Err(err.into())
            }
        }
    }

    fn run_finalize(&mut self) -> Result<(), FinalizeError> {
        run_hooks(&mut self.hooks, Phase::Finalize, &self.clock, &mut self.model).map_err(
            |failure| {
                let (stage, source) = failure.stage();
                FinalizeError { stage, source }
            },
        )?;

        if let Some(gate) = self.output.as_mut() {
            let mut ctx = Context::new(&self.clock, &mut self.model);
            gate.execute_finalize(&mut ctx)
                .map_err(|source| FinalizeError {
                    stage: Stage::Output {
                        call: "ExecuteFinalize",
                    },
                    source,
                })?;
        }

        Ok(())
    }

    fn ensure(&self, expected: Lifecycle) -> Result<(), Error> {
        if self.lifecycle == expected {
            Ok(())
        } else {
            Err(Error::Lifecycle {
                expected,
                actual: self.lifecycle,
            })
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("lifecycle", &self.lifecycle)
            .field("clock", &self.clock)
            .field("hooks", &self.hook_names().collect::<Vec<_>>())
            .field("output", &self.output.is_some())
            .field("guard", &self.guard)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
