use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stride_core::{EndTimeGuard, SimulationClock, TimeIncrement, TimeIncrementError};
use thiserror::Error;

use crate::FailurePolicy;

/// Errors detected while reading or validating a parameter document.
///
/// All of these occur before any solver or hook is constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid parameters: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("`problem_data.{field}` must be finite, got {value}")]
    NonFiniteTime { field: &'static str, value: f64 },

    #[error("invalid `problem_data.time_step`: {0}")]
    TimeStep(#[from] TimeIncrementError),
}

/// The `problem_data` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemData {
    #[serde(default = "default_problem_name")]
    pub problem_name: String,

    #[serde(default = "default_model_part_name")]
    pub model_part_name: String,

    #[serde(default = "default_domain_size")]
    pub domain_size: u32,

    #[serde(default)]
    pub echo_level: u32,

    pub start_time: f64,

    pub end_time: f64,

    #[serde(alias = "delta_time")]
    pub time_step: f64,

    #[serde(default)]
    pub end_time_guard: EndTimeGuard,

    #[serde(default)]
    pub on_step_error: FailurePolicy,
}

/// The `solver_settings` block.
///
/// `solver_type` selects the solver factory; every other key is handed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub solver_type: String,

    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// One entry of a process list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub process_name: String,

    #[serde(rename = "Parameters", default = "empty_object")]
    pub parameters: Value,
}

impl ProcessSpec {
    pub fn new(process_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            process_name: process_name.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Document {
    problem_data: ProblemData,
    solver_settings: SolverSettings,
    #[serde(default)]
    constraints_process_list: Vec<ProcessSpec>,
    #[serde(default)]
    loads_process_list: Vec<ProcessSpec>,
    #[serde(default)]
    list_other_processes: Vec<ProcessSpec>,
    #[serde(default)]
    json_output_process: Vec<ProcessSpec>,
    #[serde(default)]
    output_configuration: Option<Value>,
}

/// A parsed and validated parameter document.
///
/// Construct with [`Parameters::from_file`], [`str::parse`] or
/// [`Parameters::from_value`]. Validation guarantees finite start and end
/// times and a strictly positive time step.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    document: Document,
    delta_time: TimeIncrement,
    raw: Value,
}

impl Parameters {
    /// Reads and validates the parameter file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, is not valid JSON,
    /// lacks a required field, or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        text.parse()
    }

    /// Validates an already-parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required field is missing or invalid.
    pub fn from_value(raw: Value) -> Result<Self, ConfigError> {
        let document: Document = serde_json::from_value(raw.clone())?;

        let problem = &document.problem_data;
        for (field, value) in [
            ("start_time", problem.start_time),
            ("end_time", problem.end_time),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteTime { field, value });
            }
        }
        let delta_time = TimeIncrement::from_seconds(problem.time_step)?;

        Ok(Self {
            document,
            delta_time,
            raw,
        })
    }

    #[must_use]
    pub fn problem_data(&self) -> &ProblemData {
        &self.document.problem_data
    }

    #[must_use]
    pub fn solver_settings(&self) -> &SolverSettings {
        &self.document.solver_settings
    }

    /// Returns a clock positioned at the configured start time.
    #[must_use]
    pub fn clock(&self) -> SimulationClock {
        let problem = self.problem_data();
        SimulationClock::from_seconds(problem.start_time, problem.end_time, self.delta_time)
    }

    /// Returns every configured process in invocation order.
    ///
    /// Lists are concatenated as constraints, loads, other processes, then
    /// JSON output processes.
    pub fn process_specs(&self) -> impl Iterator<Item = &ProcessSpec> {
        let doc = &self.document;
        doc.constraints_process_list
            .iter()
            .chain(&doc.loads_process_list)
            .chain(&doc.list_other_processes)
            .chain(&doc.json_output_process)
    }

    /// Returns the output block, whose presence enables output for the run.
    #[must_use]
    pub fn output_configuration(&self) -> Option<&Value> {
        self.document.output_configuration.as_ref()
    }

    /// Returns the document as it was read, including keys Stride ignores.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl FromStr for Parameters {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_value(serde_json::from_str(s)?)
    }
}

fn default_problem_name() -> String {
    "stride".to_owned()
}

fn default_model_part_name() -> String {
    "Structure".to_owned()
}

fn default_domain_size() -> u32 {
    3
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "problem_data": {
                "start_time": 0.0,
                "end_time": 1.0,
                "time_step": 0.25
            },
            "solver_settings": { "solver_type": "forward_euler" }
        })
    }

    #[test]
    fn fills_defaults() {
        let params = Parameters::from_value(minimal()).unwrap();
        let problem = params.problem_data();

        assert_eq!(problem.problem_name, "stride");
        assert_eq!(problem.model_part_name, "Structure");
        assert_eq!(problem.domain_size, 3);
        assert_eq!(problem.echo_level, 0);
        assert_eq!(problem.end_time_guard, EndTimeGuard::Inclusive);
        assert_eq!(problem.on_step_error, FailurePolicy::FailFast);
        assert_eq!(params.process_specs().count(), 0);
        assert!(params.output_configuration().is_none());
    }

    #[test]
    fn accepts_delta_time_alias() {
        let params: Parameters = r#"{
            "problem_data": { "start_time": 0, "end_time": 2, "delta_time": 0.5 },
            "solver_settings": { "solver_type": "forward_euler" }
        }"#
        .parse()
        .unwrap();

        assert_relative_eq!(params.clock().delta_time().seconds(), 0.5);
    }

    #[test]
    fn concatenates_process_lists_in_fixed_order() {
        let mut doc = minimal();
        doc["json_output_process"] = json!([{ "process_name": "d" }]);
        doc["list_other_processes"] = json!([{ "process_name": "c" }]);
        doc["loads_process_list"] = json!([{ "process_name": "b1" }, { "process_name": "b2" }]);
        doc["constraints_process_list"] = json!([{ "process_name": "a" }]);

        let params = Parameters::from_value(doc).unwrap();
        let names: Vec<_> = params
            .process_specs()
            .map(|spec| spec.process_name.as_str())
            .collect();

        assert_eq!(names, ["a", "b1", "b2", "c", "d"]);
    }

    #[test]
    fn missing_parameters_default_to_empty_object() {
        let mut doc = minimal();
        doc["loads_process_list"] = json!([{ "process_name": "x" }]);

        let params = Parameters::from_value(doc).unwrap();
        let spec = params.process_specs().next().unwrap();
        assert_eq!(spec.parameters, json!({}));
    }

    #[test]
    fn solver_settings_keep_extra_keys() {
        let mut doc = minimal();
        doc["solver_settings"]["processes_sub_model_part_list"] = json!(["support"]);

        let params = Parameters::from_value(doc).unwrap();
        let settings = params.solver_settings();
        assert_eq!(settings.solver_type, "forward_euler");
        assert_eq!(
            settings.settings.get("processes_sub_model_part_list"),
            Some(&json!(["support"]))
        );
    }

    #[test]
    fn parses_policies() {
        let mut doc = minimal();
        doc["problem_data"]["end_time_guard"] = json!("exclusive");
        doc["problem_data"]["on_step_error"] = json!("finalize");

        let params = Parameters::from_value(doc).unwrap();
        assert_eq!(params.problem_data().end_time_guard, EndTimeGuard::Exclusive);
        assert_eq!(params.problem_data().on_step_error, FailurePolicy::Finalize);
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let mut doc = minimal();
        doc["problem_data"]
            .as_object_mut()
            .unwrap()
            .remove("end_time");

        assert!(matches!(
            Parameters::from_value(doc),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_non_positive_time_step() {
        let mut doc = minimal();
        doc["problem_data"]["time_step"] = json!(0.0);

        assert!(matches!(
            Parameters::from_value(doc),
            Err(ConfigError::TimeStep(TimeIncrementError::NotPositive(_)))
        ));
    }

    #[test]
    fn unreadable_file_is_reported_with_path() {
        let err = Parameters::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { ref path, .. } if path.ends_with("here.json")));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = "{ not json".parse::<Parameters>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
