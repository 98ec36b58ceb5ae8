use std::{fmt, path::PathBuf};

use stride_core::{BoxError, Phase};
use thiserror::Error;

use crate::{ConfigError, Lifecycle};

/// Every way a run can terminate abnormally.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Finalize(#[from] FinalizeError),

    #[error("controller is {actual}, expected it to be {expected}")]
    Lifecycle {
        expected: Lifecycle,
        actual: Lifecycle,
    },
}

/// Which kind of factory a setup failure concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Solver,
    Process,
    Output,
}

impl fmt::Display for FactoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Solver => "solver",
            Self::Process => "process",
            Self::Output => "output",
        })
    }
}

/// The solver calls made while the controller is being set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStage {
    AddVariables,
    ImportModelPart,
    AddDofs,
    Initialize,
}

impl fmt::Display for SolverStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AddVariables => "AddVariables",
            Self::ImportModelPart => "ImportModelPart",
            Self::AddDofs => "AddDofs",
            Self::Initialize => "Initialize",
        })
    }
}

/// Errors raised before the first step.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("unknown {kind} `{name}`")]
    Unknown { kind: FactoryKind, name: String },

    #[error("failed to build {kind} `{name}`: {source}")]
    Build {
        kind: FactoryKind,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("solver {stage} failed: {source}")]
    Solver {
        stage: SolverStage,
        #[source]
        source: BoxError,
    },

    #[error("{stage} failed: {source}")]
    Callback {
        stage: Stage,
        #[source]
        source: BoxError,
    },

    #[error("failed to write parameters to `{path}`: {source}")]
    Echo {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The callback that failed inside a lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// A hook callback.
    Hook { name: String, phase: Phase },

    /// The solver's `Solve`.
    Solve,

    /// An output gate call, named by its callback.
    Output { call: &'static str },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hook { name, phase } => write!(f, "hook `{name}` {phase}"),
            Self::Solve => f.write_str("Solve"),
            Self::Output { call } => write!(f, "output {call}"),
        }
    }
}

/// A failure inside the solution loop.
///
/// `step` is 1-based. Nothing after the failing callback runs for this step
/// or any later one.
#[derive(Debug, Error)]
#[error("step {step} (t = {time} s) failed in {stage}: {source}")]
pub struct StepError {
    pub step: usize,
    pub time: f64,
    pub stage: Stage,
    #[source]
    pub source: BoxError,
}

/// A failure while finalizing after the last step.
#[derive(Debug, Error)]
#[error("finalize failed in {stage}: {source}")]
pub struct FinalizeError {
    pub stage: Stage,
    #[source]
    pub source: BoxError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_names_step_and_stage() {
        let err = StepError {
            step: 3,
            time: 1.5,
            stage: Stage::Hook {
                name: "loads".into(),
                phase: Phase::FinalizeSolutionStep,
            },
            source: "boom".into(),
        };

        assert_eq!(
            err.to_string(),
            "step 3 (t = 1.5 s) failed in hook `loads` ExecuteFinalizeSolutionStep: boom"
        );
    }

    #[test]
    fn setup_errors_render_factory_kind() {
        let err = SetupError::Unknown {
            kind: FactoryKind::Process,
            name: "nope".into(),
        };
        assert_eq!(err.to_string(), "unknown process `nope`");

        let err = SetupError::Callback {
            stage: Stage::Output {
                call: "ExecuteInitialize",
            },
            source: "disk full".into(),
        };
        assert_eq!(err.to_string(), "output ExecuteInitialize failed: disk full");
    }
}
