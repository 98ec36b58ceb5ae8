use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use stride_core::{BuildContext, Model};
use tracing::info;

use crate::{
    Controller, Error, Parameters, ProcessSpec, Registry, RunSummary, SetupError,
};

/// The file written next to the parameters when `echo_level > 0`.
pub const ECHO_FILE_NAME: &str = "ProjectParametersOutput.json";

/// Wires a parameter document into a ready-to-run [`Controller`].
///
/// Building follows a fixed sequence:
///
/// 1. Echo the parameters to [`ECHO_FILE_NAME`] if `echo_level > 0`.
/// 2. Build the solver and run its setup calls on a fresh [`Model`].
/// 3. Build the hooks from the process lists (constraints, loads, other
///    processes, JSON output processes), then any extra processes.
/// 4. Build the output gate if `output_configuration` is present.
///
/// Relative paths in the parameters resolve against the base directory,
/// which for [`Analysis::from_file`] is the directory holding the file.
///
/// ```no_run
/// use stride_driver::Analysis;
///
/// let summary = Analysis::from_file("cases/beam/beam_parameters.json")?.run()?;
/// println!("{} steps", summary.steps);
/// # Ok::<(), stride_driver::Error>(())
/// ```
#[derive(Debug)]
pub struct Analysis {
    parameters: Parameters,
    base_dir: PathBuf,
    registry: Registry,
    extra_processes: Vec<ProcessSpec>,
}

impl Analysis {
    /// Creates an analysis using the built-in factories.
    pub fn new(parameters: Parameters, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            parameters,
            base_dir: base_dir.into(),
            registry: Registry::with_builtins(),
            extra_processes: Vec::new(),
        }
    }

    /// Reads the parameter file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let parameters = Parameters::from_file(path)?;
        let base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(Self::new(parameters, base_dir))
    }

    /// Replaces the factories used to build the run.
    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Appends a process after every configured process list.
    #[must_use]
    pub fn with_process(mut self, spec: ProcessSpec) -> Self {
        self.extra_processes.push(spec);
        self
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Builds the controller without running it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if any solver, process or output factory fails,
    /// if a solver setup call fails, or if the parameters cannot be echoed.
    pub fn build(self) -> Result<Controller, Error> {
        let Self {
            parameters,
            base_dir,
            registry,
            extra_processes,
        } = self;
        let problem = parameters.problem_data();

        if problem.echo_level > 0 {
            echo_parameters(&parameters, &base_dir)?;
        }

        let model = Model::new(problem.model_part_name.clone());
        let solver = registry.create_solver(
            parameters.solver_settings(),
            &BuildContext {
                model: &model,
                base_dir: &base_dir,
                problem_name: &problem.problem_name,
                echo_level: problem.echo_level,
            },
        )?;

        let mut controller = Controller::new(model, parameters.clock(), solver)?
            .with_end_time_guard(problem.end_time_guard)
            .with_failure_policy(problem.on_step_error)
            .with_echo_level(problem.echo_level);

        let (hooks, output) = {
            let ctx = BuildContext {
                model: controller.model(),
                base_dir: &base_dir,
                problem_name: &problem.problem_name,
                echo_level: problem.echo_level,
            };
            let hooks = registry.create_hooks(
                parameters.process_specs().chain(&extra_processes),
                &ctx,
            )?;
            let output = parameters
                .output_configuration()
                .map(|config| registry.create_output(config, &ctx))
                .transpose()?;
            (hooks, output)
        };

        for hook in hooks {
            controller.add_hook(hook)?;
        }
        if let Some(gate) = output {
            controller.set_output(gate)?;
        }

        if problem.echo_level > 1 {
            let model = controller.model();
            info!(
                model = model.name(),
                parts = ?model.part_names().collect::<Vec<_>>(),
                variables = ?model.variables().collect::<Vec<_>>(),
                "model"
            );
            for (index, name) in controller.hook_names().enumerate() {
                info!(index, hook = name, "process");
            }
        }

        Ok(controller)
    }

    /// Builds the controller and runs it to completion.
    ///
    /// # Errors
    ///
    /// Returns the first error from building or running.
    pub fn run(self) -> Result<RunSummary, Error> {
        self.build()?.run()
    }
}

fn echo_parameters(parameters: &Parameters, base_dir: &Path) -> Result<(), SetupError> {
    let path = base_dir.join(ECHO_FILE_NAME);
    let echo_failed = |source: serde_json::Error| SetupError::Echo {
        path: path.clone(),
        source,
    };

    let file = File::create(&path).map_err(|err| echo_failed(serde_json::Error::io(err)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, parameters.raw()).map_err(echo_failed)?;
    writer
        .flush()
        .map_err(|err| echo_failed(serde_json::Error::io(err)))?;

    info!(path = %path.display(), "parameters written");
    Ok(())
}
