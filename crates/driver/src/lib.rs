//! The Stride time-step controller and the wiring that feeds it.
//!
//! - [`Controller`]: the lifecycle state machine that sequences the solver,
//!   the hooks and the optional output gate
//! - [`Parameters`]: the validated JSON parameter document
//! - [`Registry`]: named factories for solvers, processes and output gates
//! - [`Analysis`]: reads parameters, builds everything through a registry and
//!   runs the controller
//!
//! Most callers only need [`Analysis`]:
//!
//! ```no_run
//! use stride_driver::Analysis;
//!
//! let summary = Analysis::from_file("beam_parameters.json")?.run()?;
//! assert!(summary.steps > 0);
//! # Ok::<(), stride_driver::Error>(())
//! ```

mod analysis;
mod config;
mod controller;
mod error;
mod registry;

#[cfg(test)]
mod test_utils;

pub use analysis::{Analysis, ECHO_FILE_NAME};
pub use config::{ConfigError, Parameters, ProblemData, ProcessSpec, SolverSettings};
pub use controller::{Controller, FailurePolicy, Lifecycle, RunSummary};
pub use error::{Error, FactoryKind, FinalizeError, SetupError, SolverStage, Stage, StepError};
pub use registry::{DEFAULT_OUTPUT_TYPE, Registry};
