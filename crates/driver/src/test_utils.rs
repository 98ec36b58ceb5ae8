//! Instrumented hooks, solvers and gates that record every call they receive.

use std::{cell::RefCell, rc::Rc};

use stride_core::{BoxError, Context, Hook, Model, OutputGate, Phase, SimulationClock, Solver};

/// A shared, append-only invocation log.
#[derive(Debug, Clone, Default)]
pub(crate) struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Entries excluding the solver's setup calls.
    pub(crate) fn run_entries(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| !entry.starts_with("Solver."))
            .collect()
    }

    pub(crate) fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }
}

fn short_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Initialize => "Init",
        Phase::BeforeSolutionLoop => "BeforeLoop",
        Phase::InitializeSolutionStep => "InitStep",
        Phase::FinalizeSolutionStep => "FinStep",
        Phase::BeforeOutputStep => "BeforeOutput",
        Phase::AfterOutputStep => "AfterOutput",
        Phase::Finalize => "Finalize",
    }
}

/// Logs `<label>.<phase>` for every callback.
pub(crate) struct RecordingHook {
    label: String,
    log: Log,
    fail_at: Option<(Phase, usize)>,
}

impl RecordingHook {
    pub(crate) fn new(label: impl Into<String>, log: Log) -> Self {
        Self {
            label: label.into(),
            log,
            fail_at: None,
        }
    }

    /// Fails `phase` once the clock reaches `step`, after logging the call.
    pub(crate) fn failing_at(mut self, phase: Phase, step: usize) -> Self {
        self.fail_at = Some((phase, step));
        self
    }

    fn record(&mut self, phase: Phase, ctx: &Context<'_>) -> Result<(), BoxError> {
        self.log.push(format!("{}.{}", self.label, short_name(phase)));
        match self.fail_at {
            Some((at, step)) if at == phase && ctx.clock.step() == step => {
                Err(format!("{} failed", self.label).into())
            }
            _ => Ok(()),
        }
    }
}

impl Hook for RecordingHook {
    fn name(&self) -> &str {
        &self.label
    }

    fn execute_initialize(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.record(Phase::Initialize, ctx)
    }

    fn execute_before_solution_loop(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.record(Phase::BeforeSolutionLoop, ctx)
    }

    fn execute_initialize_solution_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.record(Phase::InitializeSolutionStep, ctx)
    }

    fn execute_finalize_solution_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.record(Phase::FinalizeSolutionStep, ctx)
    }

    fn execute_before_output_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.record(Phase::BeforeOutputStep, ctx)
    }

    fn execute_after_output_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.record(Phase::AfterOutputStep, ctx)
    }

    fn execute_finalize(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.record(Phase::Finalize, ctx)
    }
}

/// A solver that does nothing.
pub(crate) struct NullSolver;

impl Solver for NullSolver {
    fn solve(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Logs `Solver.<call>` for setup calls and `Solve` for each step.
pub(crate) struct RecordingSolver {
    log: Log,
    fail_at_step: Option<usize>,
}

impl RecordingSolver {
    pub(crate) fn new(log: Log) -> Self {
        Self {
            log,
            fail_at_step: None,
        }
    }

    pub(crate) fn failing_at(mut self, step: usize) -> Self {
        self.fail_at_step = Some(step);
        self
    }
}

impl Solver for RecordingSolver {
    fn add_variables(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        self.log.push("Solver.AddVariables");
        Ok(())
    }

    fn import_model_part(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        self.log.push("Solver.ImportModelPart");
        Ok(())
    }

    fn add_dofs(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        self.log.push("Solver.AddDofs");
        Ok(())
    }

    fn initialize(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        self.log.push("Solver.Initialize");
        Ok(())
    }

    fn set_echo_level(&mut self, level: u32) {
        self.log.push(format!("Solver.SetEchoLevel({level})"));
    }

    fn solve(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.log.push("Solve");
        if self.fail_at_step == Some(ctx.clock.step()) {
            return Err("diverged".into());
        }
        Ok(())
    }
}

/// Logs `Gate.<call>` for every call and outputs every `every` steps.
pub(crate) struct RecordingGate {
    every: usize,
    log: Log,
}

impl RecordingGate {
    pub(crate) fn every(every: usize, log: Log) -> Self {
        Self { every, log }
    }
}

impl OutputGate for RecordingGate {
    fn execute_initialize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.log.push("Gate.Init");
        Ok(())
    }

    fn execute_before_solution_loop(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.log.push("Gate.BeforeLoop");
        Ok(())
    }

    fn execute_initialize_solution_step(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.log.push("Gate.InitStep");
        Ok(())
    }

    fn execute_finalize_solution_step(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.log.push("Gate.FinStep");
        Ok(())
    }

    fn is_output_step(&self, clock: &SimulationClock) -> bool {
        self.log.push("Gate.IsOutputStep");
        clock.step() % self.every == 0
    }

    fn print_output(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.log.push("Gate.PrintOutput");
        Ok(())
    }

    fn execute_finalize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.log.push("Gate.Finalize");
        Ok(())
    }
}
