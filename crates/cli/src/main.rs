//! The `stride` command line.
//!
//! Usage:
//!
//! ```text
//! stride run <parameters.json>
//! stride reference <parameters.json> --output <reference.json>
//! ```
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use stride_driver::{Analysis, Error, RunSummary};
use stride_processes::JsonOutput;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use uom::si::time::second;

#[derive(Parser, Debug)]
#[command(name = "stride", version)]
#[command(about = "Run time-stepping analyses described by JSON parameter files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the analysis described by a parameter file
    Run {
        /// Path to the parameter file
        parameters: PathBuf,
    },

    /// Run an analysis and record every degree of freedom of the root part,
    /// for later use by `check_json_results`
    Reference {
        /// Path to the parameter file
        parameters: PathBuf,

        /// Where to write the reference results
        #[arg(long, short)]
        output: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(summary) => {
            info!(
                steps = summary.steps,
                time = summary.time.get::<second>(),
                "analysis completed"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "analysis failed");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<RunSummary, Error> {
    match command {
        Command::Run { parameters } => Analysis::from_file(parameters)?.run(),
        Command::Reference { parameters, output } => build_reference(&parameters, output),
    }
}

fn build_reference(parameters: &Path, output: PathBuf) -> Result<RunSummary, Error> {
    let mut controller = Analysis::from_file(parameters)?.build()?;

    let root = controller.model().root();
    let recorder = JsonOutput::new(root.name(), root.dofs().map(str::to_owned).collect(), output);
    info!(path = %recorder.path().display(), "recording reference results");

    controller.add_hook(Box::new(recorder))?;
    controller.run()
}
