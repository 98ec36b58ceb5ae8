use crate::{BoxError, Context, Model};

/// The stepping engine that performs the numerical work of each step.
///
/// The controller owns the only instance for a run. The setup calls run once,
/// in declaration order, before any hook is initialized:
///
/// 1. [`add_variables`](Self::add_variables)
/// 2. [`import_model_part`](Self::import_model_part)
/// 3. [`add_dofs`](Self::add_dofs)
///
/// After the hooks' `ExecuteInitialize`, the controller calls
/// [`initialize`](Self::initialize) and [`set_echo_level`](Self::set_echo_level),
/// then [`solve`](Self::solve) once per step.
///
/// A call to `solve` either completes the step or fails. The controller never
/// retries a failed step.
pub trait Solver {
    /// Adds the solution variables the solver needs to the model.
    ///
    /// # Errors
    ///
    /// Any error aborts setup.
    fn add_variables(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        Ok(())
    }

    /// Populates the model's parts.
    ///
    /// # Errors
    ///
    /// Any error aborts setup.
    fn import_model_part(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        Ok(())
    }

    /// Registers degrees of freedom on the model.
    ///
    /// # Errors
    ///
    /// Any error aborts setup.
    fn add_dofs(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        Ok(())
    }

    /// Prepares internal state once the hooks have been initialized.
    ///
    /// # Errors
    ///
    /// Any error aborts setup.
    fn initialize(&mut self, _model: &mut Model) -> Result<(), BoxError> {
        Ok(())
    }

    /// Sets how verbose the solver's own logging is.
    fn set_echo_level(&mut self, _level: u32) {}

    /// Advances the model by one step to the clock's current time.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn solve(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError>;

    /// Returns the name of the part the solver computes on, `None` for the
    /// whole model.
    fn computing_model_part(&self) -> Option<&str> {
        None
    }
}
