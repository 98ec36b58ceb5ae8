use std::{
    fs, io,
    path::{Path, PathBuf},
};

use approx::relative_eq;
use serde::Deserialize;
use serde_json::Value;
use stride_core::{BoxError, BuildContext, Context, Hook, ModelError};
use thiserror::Error;
use tracing::debug;

use crate::Results;

/// Errors building or running a [`CheckJsonResults`] process.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid check_json_results parameters: {0}")]
    Parameters(#[source] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to read reference `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid reference `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("reference has no `{variable}` on part `{part}`")]
    MissingSeries { part: String, variable: String },

    #[error("t = {time} s lies outside the reference range [{first}, {last}]")]
    OutsideReference { time: f64, first: f64, last: f64 },

    #[error("`{variable}` on `{part}` at t = {time} s is {actual}, reference is {expected}")]
    Mismatch {
        part: String,
        variable: String,
        time: f64,
        actual: f64,
        expected: f64,
    },
}

#[derive(Debug, Deserialize)]
struct Parameters {
    #[serde(default)]
    model_part_name: Option<String>,
    check_variables: Vec<String>,
    input_file_name: String,
    #[serde(default = "default_tolerance")]
    tolerance: f64,
    #[serde(default = "default_relative_tolerance")]
    relative_tolerance: f64,
}

fn default_tolerance() -> f64 {
    1e-3
}

fn default_relative_tolerance() -> f64 {
    1e-6
}

/// Compares variables against a reference [`Results`] file after every step.
///
/// The reference is read during `ExecuteInitialize` and interpolated linearly
/// at the clock time. A value passes if it is within `tolerance` of the
/// reference in absolute terms or within `relative_tolerance` relatively.
#[derive(Debug)]
pub struct CheckJsonResults {
    part: String,
    variables: Vec<String>,
    path: PathBuf,
    tolerance: f64,
    relative_tolerance: f64,
    reference: Results,
}

impl CheckJsonResults {
    /// The `process_name` that selects this process.
    pub const NAME: &'static str = "check_json_results";

    /// Builds the process from its `Parameters` block.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are malformed, or if the part or a
    /// checked variable does not exist in the model.
    pub fn from_parameters(params: &Value, ctx: &BuildContext<'_>) -> Result<Self, CheckError> {
        let params = Parameters::deserialize(params).map_err(CheckError::Parameters)?;
        let part = params
            .model_part_name
            .unwrap_or_else(|| ctx.model.name().to_owned());
        ctx.model.part(&part)?;
        for variable in &params.check_variables {
            ctx.model.value(&part, variable)?;
        }

        Ok(Self {
            part,
            variables: params.check_variables,
            path: ctx.resolve(params.input_file_name),
            tolerance: params.tolerance,
            relative_tolerance: params.relative_tolerance,
            reference: Results::default(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&mut self) -> Result<(), CheckError> {
        let text = fs::read_to_string(&self.path).map_err(|source| CheckError::Read {
            path: self.path.clone(),
            source,
        })?;
        self.reference = serde_json::from_str(&text).map_err(|source| CheckError::Parse {
            path: self.path.clone(),
            source,
        })?;

        for variable in &self.variables {
            if self.reference.series(&self.part, variable).is_none() {
                return Err(CheckError::MissingSeries {
                    part: self.part.clone(),
                    variable: variable.clone(),
                });
            }
        }

        debug!(path = %self.path.display(), records = self.reference.time.len(), "reference loaded");
        Ok(())
    }

    fn check(&self, ctx: &Context<'_>) -> Result<(), CheckError> {
        let time = ctx.clock.seconds();

        for variable in &self.variables {
            let expected = self
                .reference
                .interpolate(&self.part, variable, time)
                .ok_or_else(|| {
                    let (first, last) = self.reference.time_range().unwrap_or((f64::NAN, f64::NAN));
                    CheckError::OutsideReference { time, first, last }
                })?;
            let actual = ctx.model.value(&self.part, variable)?;

            if !relative_eq!(
                actual,
                expected,
                epsilon = self.tolerance,
                max_relative = self.relative_tolerance
            ) {
                return Err(CheckError::Mismatch {
                    part: self.part.clone(),
                    variable: variable.clone(),
                    time,
                    actual,
                    expected,
                });
            }
        }
        Ok(())
    }
}

impl Hook for CheckJsonResults {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute_initialize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.load()?;
        Ok(())
    }

    fn execute_finalize_solution_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.check(ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use stride_core::{Model, SimulationClock, TimeIncrement};
    use tempfile::TempDir;

    fn model() -> Model {
        let mut model = Model::new("Structure");
        model.add_variable("DISPLACEMENT");
        model
    }

    fn check_with(reference: &Value, params: Value) -> (TempDir, CheckJsonResults) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("reference.json"), reference.to_string()).unwrap();

        let model = model();
        let ctx = BuildContext {
            model: &model,
            base_dir: dir.path(),
            problem_name: "check",
            echo_level: 0,
        };
        let hook = CheckJsonResults::from_parameters(&params, &ctx).unwrap();
        (dir, hook)
    }

    fn params() -> Value {
        json!({
            "check_variables": ["DISPLACEMENT"],
            "input_file_name": "reference.json",
            "tolerance": 1e-6
        })
    }

    fn reference() -> Value {
        json!({ "TIME": [0.5, 1.0], "Structure": { "DISPLACEMENT": [1.0, 2.0] } })
    }

    /// Runs the hook at `time` with the displacement set to `value`.
    fn check_at(hook: &mut CheckJsonResults, time: f64, value: f64) -> Result<(), BoxError> {
        let mut model = model();
        model.set_value("Structure", "DISPLACEMENT", value).unwrap();
        let mut clock =
            SimulationClock::from_seconds(0.0, 10.0, TimeIncrement::from_seconds(time).unwrap());
        clock.advance();
        hook.execute_finalize_solution_step(&mut Context::new(&clock, &mut model))
    }

    fn initialize(hook: &mut CheckJsonResults) -> Result<(), BoxError> {
        let clock = SimulationClock::from_seconds(0.0, 1.0, TimeIncrement::from_seconds(1.0).unwrap());
        let mut model = model();
        hook.execute_initialize(&mut Context::new(&clock, &mut model))
    }

    #[test]
    fn matching_values_pass_with_interpolation() {
        let (_dir, mut hook) = check_with(&reference(), params());
        initialize(&mut hook).unwrap();

        check_at(&mut hook, 0.5, 1.0).unwrap();
        check_at(&mut hook, 0.75, 1.5).unwrap();
        check_at(&mut hook, 1.0, 2.0 + 1e-9).unwrap();
    }

    #[test]
    fn mismatch_is_reported_with_both_values() {
        let (_dir, mut hook) = check_with(&reference(), params());
        initialize(&mut hook).unwrap();

        let err = check_at(&mut hook, 0.75, 1.6).unwrap_err();
        let err = err.downcast::<CheckError>().unwrap();
        assert!(matches!(
            *err,
            CheckError::Mismatch { actual, expected, .. } if actual == 1.6 && expected == 1.5
        ));
    }

    #[test]
    fn times_outside_the_reference_fail() {
        let (_dir, mut hook) = check_with(&reference(), params());
        initialize(&mut hook).unwrap();

        let err = check_at(&mut hook, 1.25, 2.0).unwrap_err();
        assert!(matches!(
            *err.downcast::<CheckError>().unwrap(),
            CheckError::OutsideReference { .. }
        ));
    }

    #[test]
    fn reference_must_contain_every_checked_variable() {
        let reference = json!({ "TIME": [0.5], "Structure": { "VELOCITY": [1.0] } });
        let (_dir, mut hook) = check_with(&reference, params());

        let err = initialize(&mut hook).unwrap_err();
        assert!(err.to_string().contains("no `DISPLACEMENT`"));
    }

    #[test]
    fn missing_reference_file_fails_initialize() {
        let (dir, mut hook) = check_with(&reference(), params());
        fs::remove_file(dir.path().join("reference.json")).unwrap();

        let err = initialize(&mut hook).unwrap_err();
        assert!(matches!(
            *err.downcast::<CheckError>().unwrap(),
            CheckError::Read { .. }
        ));
    }
}
