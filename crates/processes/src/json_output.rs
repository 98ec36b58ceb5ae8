use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value;
use stride_core::{BoxError, BuildContext, Context, Hook, ModelError};
use thiserror::Error;
use tracing::info;

use crate::Results;

/// Errors building or running a [`JsonOutput`] process.
#[derive(Debug, Error)]
pub enum JsonOutputError {
    #[error("invalid json_output parameters: {0}")]
    Parameters(#[from] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Parameters {
    #[serde(default)]
    model_part_name: Option<String>,
    output_variables: Vec<String>,
    #[serde(default = "default_output_file_name")]
    output_file_name: String,
    #[serde(default)]
    time_frequency: f64,
}

fn default_output_file_name() -> String {
    "results.json".to_owned()
}

/// Records the history of scalar variables on one part and writes it as
/// [`Results`] JSON when the run finalizes.
///
/// A record is taken at the end of a step once at least `time_frequency`
/// has passed since the previous record. The first step is always recorded.
/// Above echo level 1 every record is logged.
#[derive(Debug)]
pub struct JsonOutput {
    part: String,
    variables: Vec<String>,
    path: PathBuf,
    time_frequency: f64,
    echo_level: u32,
    last_recorded: Option<f64>,
    results: Results,
}

impl JsonOutput {
    /// The `process_name` that selects this process.
    pub const NAME: &'static str = "json_output";

    /// Creates a process recording every step.
    pub fn new(part: impl Into<String>, variables: Vec<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            part: part.into(),
            variables,
            path: path.into(),
            time_frequency: 0.0,
            echo_level: 0,
            last_recorded: None,
            results: Results::default(),
        }
    }

    /// Records only once at least `time_frequency` seconds have passed.
    #[must_use]
    pub fn with_time_frequency(mut self, time_frequency: f64) -> Self {
        self.time_frequency = time_frequency;
        self
    }

    #[must_use]
    pub fn with_echo_level(mut self, echo_level: u32) -> Self {
        self.echo_level = echo_level;
        self
    }

    /// Builds the process from its `Parameters` block.
    ///
    /// The part defaults to the model's root, and the output file resolves
    /// against the base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are malformed, or if the part or
    /// any output variable does not exist in the model.
    pub fn from_parameters(params: &Value, ctx: &BuildContext<'_>) -> Result<Self, JsonOutputError> {
        let params = Parameters::deserialize(params)?;
        let part = params
            .model_part_name
            .unwrap_or_else(|| ctx.model.name().to_owned());
        ctx.model.part(&part)?;
        for variable in &params.output_variables {
            ctx.model.value(&part, variable)?;
        }

        Ok(
            Self::new(part, params.output_variables, ctx.resolve(params.output_file_name))
                .with_time_frequency(params.time_frequency)
                .with_echo_level(ctx.echo_level),
        )
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns what has been recorded so far.
    #[must_use]
    pub fn results(&self) -> &Results {
        &self.results
    }

    fn is_due(&self, time: f64) -> bool {
        self.last_recorded
            .is_none_or(|last| time - last >= self.time_frequency * (1.0 - 1e-9))
    }

    fn write(&self) -> Result<(), JsonOutputError> {
        let write_failed = |source: io::Error| JsonOutputError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_failed)?;
        }
        let file = File::create(&self.path).map_err(write_failed)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.results)
            .map_err(|err| write_failed(err.into()))?;
        writer.flush().map_err(write_failed)?;

        info!(path = %self.path.display(), records = self.results.time.len(), "results written");
        Ok(())
    }
}

impl Hook for JsonOutput {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute_finalize_solution_step(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        let time = ctx.clock.seconds();
        if !self.is_due(time) {
            return Ok(());
        }

        let values = self
            .variables
            .iter()
            .map(|variable| Ok((variable.as_str(), ctx.model.value(&self.part, variable)?)))
            .collect::<Result<Vec<_>, ModelError>>()?;
        if self.echo_level > 1 {
            info!(time, part = %self.part, ?values, "recorded");
        }
        self.results.record(time, &self.part, values);
        self.last_recorded = Some(time);
        Ok(())
    }

    fn execute_finalize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        self.write()?;
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
        model.create_sub_part("tip").unwrap();
        model
    }

    fn build(params: Value, model: &Model, dir: &Path) -> Result<JsonOutput, JsonOutputError> {
        build_with_echo(params, model, dir, 0)
    }

    fn build_with_echo(
        params: Value,
        model: &Model,
        dir: &Path,
        echo_level: u32,
    ) -> Result<JsonOutput, JsonOutputError> {
        let ctx = BuildContext {
            model,
            base_dir: dir,
            problem_name: "json",
            echo_level,
        };
        JsonOutput::from_parameters(&params, &ctx)
    }

    /// Steps `hook` through `steps` steps of `dt`, setting the displacement on
    /// `tip` to the step number first.
    fn drive(hook: &mut JsonOutput, model: &mut Model, dt: f64, steps: usize) {
        let mut clock =
            SimulationClock::from_seconds(0.0, 10.0, TimeIncrement::from_seconds(dt).unwrap());
        for _ in 0..steps {
            clock.advance();
            model
                .set_value("tip", "DISPLACEMENT", clock.step() as f64)
                .unwrap();
            hook.execute_finalize_solution_step(&mut Context::new(&clock, model))
                .unwrap();
        }
        hook.execute_finalize(&mut Context::new(&clock, model)).unwrap();
    }

    #[test]
    fn writes_recorded_history_on_finalize() {
        let dir = TempDir::new().unwrap();
        let mut model = model();
        let mut hook = build(
            json!({
                "model_part_name": "tip",
                "output_variables": ["DISPLACEMENT"],
                "output_file_name": "out/tip.json"
            }),
            &model,
            dir.path(),
        )
        .unwrap();
        assert_eq!(hook.path(), dir.path().join("out/tip.json"));

        drive(&mut hook, &mut model, 0.5, 3);

        let text = fs::read_to_string(dir.path().join("out/tip.json")).unwrap();
        let written: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            written,
            json!({ "TIME": [0.5, 1.0, 1.5], "tip": { "DISPLACEMENT": [1.0, 2.0, 3.0] } })
        );
    }

    #[test]
    fn time_frequency_thins_records() {
        let dir = TempDir::new().unwrap();
        let mut model = model();
        let mut hook = JsonOutput::new("tip", vec!["DISPLACEMENT".into()], dir.path().join("r.json"))
            .with_time_frequency(0.5);

        drive(&mut hook, &mut model, 0.25, 6);

        assert_eq!(hook.results().time, [0.25, 0.75, 1.25]);
        assert_eq!(hook.results().series("tip", "DISPLACEMENT"), Some(&[1.0, 3.0, 5.0][..]));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_is_reported() {
        let mut model = model();
        let clock =
            SimulationClock::from_seconds(0.0, 1.0, TimeIncrement::from_seconds(0.5).unwrap());
        let mut hook = JsonOutput::new("tip", vec!["DISPLACEMENT".into()], "/dev/full");
        hook.execute_finalize_solution_step(&mut Context::new(&clock, &mut model))
            .unwrap();

        let err = hook
            .execute_finalize(&mut Context::new(&clock, &mut model))
            .unwrap_err();
        assert!(matches!(
            *err.downcast::<JsonOutputError>().unwrap(),
            JsonOutputError::Write { .. }
        ));
    }

    #[test]
    fn unwritable_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let mut model = model();
        let mut hook = JsonOutput::new("tip", vec!["DISPLACEMENT".into()], blocker.join("r.json"));

        let clock =
            SimulationClock::from_seconds(0.0, 1.0, TimeIncrement::from_seconds(0.5).unwrap());
        let err = hook
            .execute_finalize(&mut Context::new(&clock, &mut model))
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to write"));
    }

    #[test]
    fn defaults_to_root_part_and_validates_variables() {
        let dir = TempDir::new().unwrap();
        let model = model();

        let hook = build(json!({ "output_variables": ["DISPLACEMENT"] }), &model, dir.path()).unwrap();
        assert_eq!(hook.part, "Structure");
        assert_eq!(hook.path(), dir.path().join("results.json"));
        assert_eq!(hook.echo_level, 0);

        let err = build(json!({ "output_variables": ["PRESSURE"] }), &model, dir.path()).unwrap_err();
        assert!(matches!(err, JsonOutputError::Model(ModelError::UnknownVariable(_))));
    }

    #[test]
    fn echo_level_comes_from_the_build_context() {
        let dir = TempDir::new().unwrap();
        let mut model = model();
        let mut hook = build_with_echo(
            json!({ "model_part_name": "tip", "output_variables": ["DISPLACEMENT"] }),
            &model,
            dir.path(),
            2,
        )
        .unwrap();
        assert_eq!(hook.echo_level, 2);

        drive(&mut hook, &mut model, 0.5, 2);
        assert_eq!(hook.results().time, [0.5, 1.0]);
    }
}
