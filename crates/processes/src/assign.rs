use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use stride_core::{BoxError, BuildContext, Context, Hook, ModelError};
use thiserror::Error;
use tracing::trace;

/// Errors building an [`AssignScalarVariable`] process.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("invalid assign_scalar_variable parameters: {0}")]
    Parameters(#[from] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// An interval end that is neither a number nor `"End"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("interval end must be a number or \"End\", got {0:?}")]
pub struct IntervalError(String);

/// A closed time interval whose end may be open.
///
/// Deserialized from `[start, end]`, where `end` is a number or the keyword
/// `"End"` for an interval that never closes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, IntervalEnd)")]
pub struct Interval {
    start: f64,
    end: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntervalEnd {
    Time(f64),
    Keyword(String),
}

impl TryFrom<(f64, IntervalEnd)> for Interval {
    type Error = IntervalError;

    fn try_from((start, end): (f64, IntervalEnd)) -> Result<Self, Self::Error> {
        match end {
            IntervalEnd::Time(end) => Ok(Self::closed(start, end)),
            IntervalEnd::Keyword(keyword) if keyword == "End" => Ok(Self::starting_at(start)),
            IntervalEnd::Keyword(other) => Err(IntervalError(other)),
        }
    }
}

impl Interval {
    /// Creates the interval `[start, end]`.
    #[must_use]
    pub fn closed(start: f64, end: f64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Creates the interval `[start, ∞)`.
    #[must_use]
    pub fn starting_at(start: f64) -> Self {
        Self { start, end: None }
    }

    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && self.end.is_none_or(|end| time <= end)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::starting_at(0.0)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {end}]", self.start),
            None => write!(f, "[{}, End]", self.start),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Parameters {
    model_part_name: String,
    variable_name: String,
    value: f64,
    #[serde(default)]
    interval: Interval,
    #[serde(default)]
    constrained: bool,
}

/// Assigns a fixed value to a scalar variable on one part while the clock is
/// inside an interval.
///
/// The value is written at the start of each step, before the solver runs.
/// With `constrained` set, the variable is also fixed for the duration of
/// the step, so the solver leaves it alone, and released once the step is
/// finalized.
#[derive(Debug, Clone)]
pub struct AssignScalarVariable {
    name: String,
    part: String,
    variable: String,
    value: f64,
    interval: Interval,
    constrained: bool,
}

impl AssignScalarVariable {
    /// The `process_name` that selects this process.
    pub const NAME: &'static str = "assign_scalar_variable";

    pub fn new(
        part: impl Into<String>,
        variable: impl Into<String>,
        value: f64,
        interval: Interval,
        constrained: bool,
    ) -> Self {
        let (part, variable) = (part.into(), variable.into());
        Self {
            name: format!("{}({variable} on {part})", Self::NAME),
            part,
            variable,
            value,
            interval,
            constrained,
        }
    }

    /// Builds the process from its `Parameters` block.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are malformed, or if the part or
    /// the variable does not exist in the model.
    pub fn from_parameters(params: &Value, ctx: &BuildContext<'_>) -> Result<Self, AssignError> {
        let params = Parameters::deserialize(params)?;
        ctx.model.value(&params.model_part_name, &params.variable_name)?;

        Ok(Self::new(
            params.model_part_name,
            params.variable_name,
            params.value,
            params.interval,
            params.constrained,
        ))
    }

    fn is_active(&self, ctx: &Context<'_>) -> bool {
        self.interval.contains(ctx.clock.seconds())
    }
}

impl Hook for AssignScalarVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute_initialize_solution_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        if !self.is_active(ctx) {
            return Ok(());
        }

        trace!(part = %self.part, variable = %self.variable, value = self.value, "assign");
        ctx.model.set_value(&self.part, &self.variable, self.value)?;
        if self.constrained {
            ctx.model.fix(&self.part, &self.variable)?;
        }
        Ok(())
    }

    fn execute_finalize_solution_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        if self.constrained && self.is_active(ctx) {
            ctx.model.free(&self.part, &self.variable)?;
        }
        Ok(())
    }
}
