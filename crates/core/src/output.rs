use crate::{BoxError, Context, SimulationClock};

/// Decides, step by step, whether results are written, and writes them.
///
/// An output gate is optional for a run. When present, the controller calls
/// it around the hook phases:
///
/// - `execute_initialize` and `execute_before_solution_loop` once before the loop
/// - `execute_initialize_solution_step` and `execute_finalize_solution_step`
///   every step, whether or not the step produces output
/// - `print_output` only on steps where `is_output_step` is `true`
/// - `execute_finalize` once after the loop, closing any open resource
pub trait OutputGate {
    /// Opens output resources.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_initialize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_before_solution_loop(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_initialize_solution_step(
        &mut self,
        _ctx: &mut Context<'_>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_finalize_solution_step(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Returns whether the current step should produce output.
    ///
    /// Implementations must derive the answer from the clock and their
    /// configuration alone, so repeated calls within a step agree and nothing
    /// carries over from previous steps.
    fn is_output_step(&self, clock: &SimulationClock) -> bool;

    /// Writes output for the current step.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn print_output(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError>;

    /// Flushes and closes output resources.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn execute_finalize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        Ok(())
    }
}
