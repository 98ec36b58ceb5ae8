use std::fmt;

use crate::{BoxError, Context};

/// The points in the simulation lifecycle at which hooks are invoked.
///
/// Variants are listed in the order they occur. `Initialize` and
/// `BeforeSolutionLoop` run once before the loop, the four step phases run
/// once per step, and `Finalize` runs once after the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initialize,
    BeforeSolutionLoop,
    InitializeSolutionStep,
    FinalizeSolutionStep,
    BeforeOutputStep,
    AfterOutputStep,
    Finalize,
}

impl Phase {
    /// All phases in lifecycle order.
    pub const ALL: [Phase; 7] = [
        Phase::Initialize,
        Phase::BeforeSolutionLoop,
        Phase::InitializeSolutionStep,
        Phase::FinalizeSolutionStep,
        Phase::BeforeOutputStep,
        Phase::AfterOutputStep,
        Phase::Finalize,
    ];

    /// Returns the callback name for this phase, e.g. `ExecuteInitialize`.
    #[must_use]
    pub fn callback_name(self) -> &'static str {
        match self {
            Phase::Initialize => "ExecuteInitialize",
            Phase::BeforeSolutionLoop => "ExecuteBeforeSolutionLoop",
            Phase::InitializeSolutionStep => "ExecuteInitializeSolutionStep",
            Phase::FinalizeSolutionStep => "ExecuteFinalizeSolutionStep",
            Phase::BeforeOutputStep => "ExecuteBeforeOutputStep",
            Phase::AfterOutputStep => "ExecuteAfterOutputStep",
            Phase::Finalize => "ExecuteFinalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.callback_name())
    }
}

/// A unit of work invoked by the controller at fixed lifecycle points.
///
/// Every callback defaults to a no-op, so a hook only implements the phases it
/// cares about. Callbacks communicate exclusively through side effects on the
/// [`Context`]: they return nothing that alters control flow, and any error
/// aborts the run.
///
/// Within one phase, hooks run in registration order, and that order is the
/// same for every phase.
///
/// # Example
///
/// ```
/// use stride_core::{BoxError, Context, Hook};
///
/// /// Counts the steps it has seen.
/// #[derive(Default)]
/// struct StepCounter {
///     steps: usize,
/// }
///
/// impl Hook for StepCounter {
///     fn name(&self) -> &str {
///         "step_counter"
///     }
///
///     fn execute_finalize_solution_step(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
///         self.steps += 1;
///         Ok(())
///     }
/// }
/// ```
pub trait Hook {
    /// A short name identifying the hook in logs and errors.
    fn name(&self) -> &str;

    /// Runs once before the solver is initialized.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_initialize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs once after the solver is initialized, before the first step.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_before_solution_loop(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs at the start of each step, after the clock has advanced.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_initialize_solution_step(
        &mut self,
        _ctx: &mut Context<'_>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after the solver has completed the step.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_finalize_solution_step(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs before the output gate is consulted.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_before_output_step(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after output has (or has not) been written for the step.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_after_output_step(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs once after the last step.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_finalize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Invokes the callback for `phase`.
    ///
    /// # Errors
    ///
    /// Returns whatever the callback returns.
    fn dispatch(&mut self, phase: Phase, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        match phase {
            Phase::Initialize => self.execute_initialize(ctx),
            Phase::BeforeSolutionLoop => self.execute_before_solution_loop(ctx),
            Phase::InitializeSolutionStep => self.execute_initialize_solution_step(ctx),
            Phase::FinalizeSolutionStep => self.execute_finalize_solution_step(ctx),
            Phase::BeforeOutputStep => self.execute_before_output_step(ctx),
            Phase::AfterOutputStep => self.execute_after_output_step(ctx),
            Phase::Finalize => self.execute_finalize(ctx),
        }
    }
}
