//! Whitespace-separated tabular results, one row per output step.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value;
use stride_core::{BoxError, BuildContext, Context, ModelError, OutputGate, SimulationClock};
use thiserror::Error;
use tracing::{debug, info};
use uom::si::time::second;

/// Errors building or running a [`TabularOutput`] gate.
#[derive(Debug, Error)]
pub enum TabularError {
    #[error("invalid output_configuration: {0}")]
    Configuration(#[from] serde_json::Error),

    #[error("output_frequency must be positive and finite, got {0}")]
    Frequency(f64),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{0}` is not open")]
    NotOpen(PathBuf),
}

/// When the gate produces output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputControl {
    /// Every `n`-th step.
    #[default]
    Step,

    /// Whenever a step crosses a multiple of the frequency, measured in
    /// seconds from the start time.
    Time,
}

#[derive(Debug, Deserialize)]
struct Configuration {
    #[serde(default)]
    output_file_name: Option<String>,
    #[serde(default)]
    model_part_name: Option<String>,
    #[serde(default)]
    result_file_configuration: ResultFileConfiguration,
}

#[derive(Debug, Deserialize)]
struct ResultFileConfiguration {
    #[serde(default)]
    output_control_type: OutputControl,
    #[serde(default = "default_output_frequency")]
    output_frequency: f64,
    #[serde(default)]
    nodal_results: Vec<String>,
}

impl Default for ResultFileConfiguration {
    fn default() -> Self {
        Self {
            output_control_type: OutputControl::default(),
            output_frequency: default_output_frequency(),
            nodal_results: Vec::new(),
        }
    }
}

fn default_output_frequency() -> f64 {
    1.0
}

/// Writes one row per output step: the step, the time, then each result
/// variable on the configured part.
///
/// ```text
/// # step time DISPLACEMENT VELOCITY
/// 1 0.5 0.25 0.5
/// 2 1 0.75 0.5
/// ```
///
/// The file is opened by `ExecuteInitialize` and closed by `ExecuteFinalize`.
#[derive(Debug)]
pub struct TabularOutput {
    path: PathBuf,
    part: String,
    variables: Vec<String>,
    control: OutputControl,
    frequency: f64,
    writer: Option<BufWriter<File>>,
}

impl TabularOutput {
    /// The `output_type` that selects this gate.
    pub const TYPE: &'static str = "tabular";

    /// Creates a gate writing `variables` of `part` to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TabularError::Frequency`] unless `frequency` is positive and
    /// finite.
    pub fn new(
        path: impl Into<PathBuf>,
        part: impl Into<String>,
        variables: Vec<String>,
        control: OutputControl,
        frequency: f64,
    ) -> Result<Self, TabularError> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(TabularError::Frequency(frequency));
        }

        Ok(Self {
            path: path.into(),
            part: part.into(),
            variables,
            control,
            frequency,
            writer: None,
        })
    }

    /// Builds the gate from an `output_configuration` block.
    ///
    /// The file defaults to `<problem_name>.dat` in the base directory and the
    /// part to the model's root.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is malformed, the frequency is invalid,
    /// or a result variable or the part does not exist in the model.
    pub fn from_configuration(config: &Value, ctx: &BuildContext<'_>) -> Result<Self, TabularError> {
        let config = Configuration::deserialize(config)?;
        let results = config.result_file_configuration;

        let part = config
            .model_part_name
            .unwrap_or_else(|| ctx.model.name().to_owned());
        ctx.model.part(&part)?;
        for variable in &results.nodal_results {
            ctx.model.value(&part, variable)?;
        }

        let file_name = config
            .output_file_name
            .unwrap_or_else(|| format!("{}.dat", ctx.problem_name));

        Self::new(
            ctx.resolve(file_name),
            part,
            results.nodal_results,
            results.output_control_type,
            results.output_frequency,
        )
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_failed(&self, source: io::Error) -> TabularError {
        TabularError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, TabularError> {
        self.writer
            .as_mut()
            .ok_or_else(|| TabularError::NotOpen(self.path.clone()))
    }
}

/// Returns how many whole multiples of `frequency` fit in `elapsed`.
fn periods(elapsed: f64, frequency: f64) -> f64 {
    // Absorbs the drift of a clock that accumulates its step.
    (elapsed / frequency + 1e-9).floor()
}

impl OutputGate for TabularOutput {
    fn execute_initialize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        let file = File::create(&self.path).map_err(|err| self.write_failed(err))?;
        let mut writer = BufWriter::new(file);

        let mut header = String::from("# step time");
        for variable in &self.variables {
            header.push(' ');
            header.push_str(variable);
        }
        writeln!(writer, "{header}").map_err(|err| self.write_failed(err))?;

        debug!(path = %self.path.display(), "tabular output opened");
        self.writer = Some(writer);
        Ok(())
    }

    fn is_output_step(&self, clock: &SimulationClock) -> bool {
        match self.control {
            OutputControl::Step => {
                let every = (self.frequency.round() as usize).max(1);
                clock.step() % every == 0
            }
            OutputControl::Time => {
                let start = clock.start_time();
                let now = (clock.time() - start).get::<second>();
                let before = (clock.previous_time() - start).get::<second>();
                periods(now, self.frequency) > periods(before, self.frequency)
            }
        }
    }

    fn print_output(&mut self, ctx: &mut Context<'_>) -> Result<(), BoxError> {
        let mut row = format!("{} {}", ctx.clock.step(), ctx.clock.seconds());
        for variable in &self.variables {
            let value = ctx.model.value(&self.part, variable)?;
            row.push(' ');
            row.push_str(&value.to_string());
        }

        let written = writeln!(self.writer()?, "{row}");
        written.map_err(|err| self.write_failed(err))?;
        Ok(())
    }

    fn execute_finalize(&mut self, _ctx: &mut Context<'_>) -> Result<(), BoxError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|err| self.write_failed(err))?;
            info!(path = %self.path.display(), "tabular output closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use serde_json::json;
    use stride_core::{Model, TimeIncrement};
    use tempfile::TempDir;

    fn model() -> Model {
        let mut model = Model::new("Structure");
        model.add_variable("DISPLACEMENT");
        model
    }

    fn build(config: Value, model: &Model, dir: &Path) -> Result<TabularOutput, TabularError> {
        let ctx = BuildContext {
            model,
            base_dir: dir,
            problem_name: "beam",
            echo_level: 0,
        };
        TabularOutput::from_configuration(&config, &ctx)
    }

    fn gate(control: OutputControl, frequency: f64) -> TabularOutput {
        TabularOutput::new("unused.dat", "Structure", Vec::new(), control, frequency).unwrap()
    }

    /// Returns the steps, out of the first `steps`, that produce output.
    fn output_steps(gate: &TabularOutput, start: f64, dt: f64, steps: usize) -> Vec<usize> {
        let mut clock =
            SimulationClock::from_seconds(start, 100.0, TimeIncrement::from_seconds(dt).unwrap());
        let mut outputs = Vec::new();
        for _ in 0..steps {
            clock.advance();
            if gate.is_output_step(&clock) {
                outputs.push(clock.step());
            }
        }
        outputs
    }

    #[test]
    fn step_control_outputs_every_nth_step() {
        assert_eq!(output_steps(&gate(OutputControl::Step, 3.0), 0.0, 0.1, 10), [3, 6, 9]);
        assert_eq!(
            output_steps(&gate(OutputControl::Step, 1.0), 0.0, 0.1, 4),
            [1, 2, 3, 4]
        );
    }

    #[test]
    fn time_control_outputs_when_a_multiple_is_crossed() {
        let gate = gate(OutputControl::Time, 0.5);
        assert_eq!(output_steps(&gate, 0.0, 0.2, 8), [3, 5, 8]);
        assert_eq!(output_steps(&gate, 0.0, 0.1, 10), [5, 10]);
        assert_eq!(output_steps(&gate, 2.0, 0.25, 4), [2, 4]);
    }

    #[test]
    fn output_decision_is_repeatable_within_a_step() {
        let gate = gate(OutputControl::Time, 0.5);
        let mut clock =
            SimulationClock::from_seconds(0.0, 1.0, TimeIncrement::from_seconds(0.5).unwrap());
        clock.advance();

        assert!(gate.is_output_step(&clock));
        assert!(gate.is_output_step(&clock));
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let mut model = model();
        let mut gate = build(
            json!({ "result_file_configuration": { "nodal_results": ["DISPLACEMENT"] } }),
            &model,
            dir.path(),
        )
        .unwrap();
        assert_eq!(gate.path(), dir.path().join("beam.dat"));

        let mut clock =
            SimulationClock::from_seconds(0.0, 1.0, TimeIncrement::from_seconds(0.5).unwrap());
        gate.execute_initialize(&mut Context::new(&clock, &mut model)).unwrap();
        for value in [0.25, 0.75] {
            clock.advance();
            model.set_value("Structure", "DISPLACEMENT", value).unwrap();
            gate.print_output(&mut Context::new(&clock, &mut model)).unwrap();
        }
        gate.execute_finalize(&mut Context::new(&clock, &mut model)).unwrap();

        let text = fs::read_to_string(dir.path().join("beam.dat")).unwrap();
        assert_eq!(text, "# step time DISPLACEMENT\n1 0.5 0.25\n2 1 0.75\n");
    }

    #[test]
    fn printing_before_initialize_fails() {
        let mut gate = gate(OutputControl::Step, 1.0);
        let clock = SimulationClock::from_seconds(0.0, 1.0, TimeIncrement::from_seconds(0.5).unwrap());
        let mut model = model();

        let err = gate
            .print_output(&mut Context::new(&clock, &mut model))
            .unwrap_err();
        assert!(err.to_string().contains("is not open"));
    }

    #[test]
    fn rejects_bad_configuration() {
        let dir = TempDir::new().unwrap();
        let model = model();

        let err = build(
            json!({ "result_file_configuration": { "output_frequency": 0.0 } }),
            &model,
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, TabularError::Frequency(_)));

        let err = build(
            json!({ "result_file_configuration": { "output_control_type": "iteration" } }),
            &model,
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, TabularError::Configuration(_)));

        let err = build(json!({ "model_part_name": "tip" }), &model, dir.path()).unwrap_err();
        assert!(matches!(err, TabularError::Model(ModelError::UnknownPart(_))));
    }
}
