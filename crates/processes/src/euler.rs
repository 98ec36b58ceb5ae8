//! Forward Euler solver over the model's scalar degrees of freedom.
//!
//! Each step updates every free state variable on every part:
//!
//! ```text
//! x_{n+1} = x_n + rate_n * dt
//! ```
//!
//! Fixed variables are left untouched, so a process that constrains a
//! variable holds it at the value it assigned.

use serde::Deserialize;
use serde_json::Value;
use stride_core::{BoxError, BuildContext, Context, Model, ModelError, Solver};
use thiserror::Error;
use tracing::debug;

/// Errors building a [`ForwardEuler`] solver from its settings.
#[derive(Debug, Error)]
pub enum ForwardEulerError {
    #[error("invalid forward_euler settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("state variable `{0}` cannot be its own rate")]
    SelfRate(String),
}

/// A state variable and the variable holding its rate of change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateVariable {
    pub variable: String,
    pub rate_variable: String,
}

impl StateVariable {
    pub fn new(variable: impl Into<String>, rate_variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            rate_variable: rate_variable.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default)]
    state_variables: Vec<StateVariable>,

    #[serde(default)]
    processes_sub_model_part_list: Vec<String>,
}

/// Explicit Euler integration of scalar state variables.
#[derive(Debug, Clone)]
pub struct ForwardEuler {
    state_variables: Vec<StateVariable>,
    sub_parts: Vec<String>,
    echo_level: u32,
}

impl ForwardEuler {
    /// The `solver_type` that selects this solver.
    pub const TYPE: &'static str = "forward_euler";

    /// Creates a solver integrating `state_variables` on the root part and on
    /// each of `sub_parts`, which it creates during `ImportModelPart`.
    #[must_use]
    pub fn new(state_variables: Vec<StateVariable>, sub_parts: Vec<String>) -> Self {
        Self {
            state_variables,
            sub_parts,
            echo_level: 0,
        }
    }

    /// Builds the solver from a `solver_settings` block.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are malformed or a state variable
    /// names itself as its rate.
    pub fn from_settings(settings: &Value, _ctx: &BuildContext<'_>) -> Result<Self, ForwardEulerError> {
        let settings = Settings::deserialize(settings)?;

        if let Some(state) = settings
            .state_variables
            .iter()
            .find(|state| state.variable == state.rate_variable)
        {
            return Err(ForwardEulerError::SelfRate(state.variable.clone()));
        }

        Ok(Self::new(
            settings.state_variables,
            settings.processes_sub_model_part_list,
        ))
    }
}

impl Solver for ForwardEuler {
    fn add_variables(&mut self, model: &mut Model) -> Result<(), BoxError> {
        for state in &self.state_variables {
            model.add_variable(state.variable.as_str());
            model.add_variable(state.rate_variable.as_str());
        }
        Ok(())
    }

    fn import_model_part(&mut self, model: &mut Model) -> Result<(), BoxError> {
        for name in &self.sub_parts {
            model.create_sub_part(name.as_str())?;
        }
        Ok(())
    }

    fn add_dofs(&mut self, model: &mut Model) -> Result<(), BoxError> {
        for state in &self.state_variables {
            model.add_dof(&state.variable)?;
        }
        Ok(())
    }

    fn set_echo_level(&mut self, level: u32) {
        self.echo_level = level;
    }

    fn solve(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        let dt = ctx.clock.delta_time().seconds();
        let parts: Vec<String> = ctx.model.part_names().map(str::to_owned).collect();

        for part in &parts {
            for state in &self.state_variables {
                step(ctx.model, part, state, dt)?;
            }
        }

        if self.echo_level > 0 {
            debug!(step = ctx.clock.step(), parts = parts.len(), "forward euler step");
        }
        Ok(())
    }
}

fn step(model: &mut Model, part: &str, state: &StateVariable, dt: f64) -> Result<(), ModelError> {
    let model_part = model.part(part)?;
    if !model_part.has_dof(&state.variable) || model_part.is_fixed(&state.variable) {
        return Ok(());
    }

    let value = model_part.value(&state.variable) + model_part.value(&state.rate_variable) * dt;
    model.set_value(part, &state.variable, value)
}
