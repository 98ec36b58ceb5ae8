use std::{collections::BTreeMap, fmt};

use serde_json::Value;
use stride_core::{BoxError, BuildContext, Hook, OutputGate, Solver};
use tracing::debug;

use crate::{FactoryKind, ProcessSpec, SetupError, SolverSettings};

type SolverFactory = Box<dyn Fn(&Value, &BuildContext<'_>) -> Result<Box<dyn Solver>, BoxError>>;
type ProcessFactory = Box<dyn Fn(&Value, &BuildContext<'_>) -> Result<Box<dyn Hook>, BoxError>>;
type OutputFactory =
    Box<dyn Fn(&Value, &BuildContext<'_>) -> Result<Box<dyn OutputGate>, BoxError>>;

/// The output type used when `output_configuration` names none.
pub const DEFAULT_OUTPUT_TYPE: &str = "tabular";

/// Maps configuration names to the factories that build solvers, processes
/// and output gates.
///
/// A registry is an explicit value handed to the analysis, so different runs
/// in one process can use different sets of factories.
///
/// ```
/// use stride_driver::Registry;
///
/// let registry = Registry::with_builtins();
/// assert!(registry.has_process("assign_scalar_variable"));
/// ```
#[derive(Default)]
pub struct Registry {
    solvers: BTreeMap<String, SolverFactory>,
    processes: BTreeMap<String, ProcessFactory>,
    outputs: BTreeMap<String, OutputFactory>,
}

impl Registry {
    /// Creates a registry with no factories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every factory from `stride_processes`.
    #[must_use]
    pub fn with_builtins() -> Self {
        use stride_processes::{
            AssignScalarVariable, CheckJsonResults, ForwardEuler, JsonOutput, TabularOutput,
        };

        let mut registry = Self::new();
        registry.register_solver(ForwardEuler::TYPE, |settings, ctx| {
            Ok(Box::new(ForwardEuler::from_settings(settings, ctx)?))
        });
        registry.register_process(AssignScalarVariable::NAME, |params, ctx| {
            Ok(Box::new(AssignScalarVariable::from_parameters(params, ctx)?))
        });
        registry.register_process(JsonOutput::NAME, |params, ctx| {
            Ok(Box::new(JsonOutput::from_parameters(params, ctx)?))
        });
        registry.register_process(CheckJsonResults::NAME, |params, ctx| {
            Ok(Box::new(CheckJsonResults::from_parameters(params, ctx)?))
        });
        registry.register_output(TabularOutput::TYPE, |config, ctx| {
            Ok(Box::new(TabularOutput::from_configuration(config, ctx)?))
        });
        registry
    }

    /// Registers a solver factory under `solver_type`, replacing any previous one.
    pub fn register_solver<F>(&mut self, solver_type: impl Into<String>, factory: F)
    where
        F: Fn(&Value, &BuildContext<'_>) -> Result<Box<dyn Solver>, BoxError> + 'static,
    {
        self.solvers.insert(solver_type.into(), Box::new(factory));
    }

    /// Registers a process factory under `process_name`, replacing any previous one.
    pub fn register_process<F>(&mut self, process_name: impl Into<String>, factory: F)
    where
        F: Fn(&Value, &BuildContext<'_>) -> Result<Box<dyn Hook>, BoxError> + 'static,
    {
        self.processes.insert(process_name.into(), Box::new(factory));
    }

    /// Registers an output factory under `output_type`, replacing any previous one.
    pub fn register_output<F>(&mut self, output_type: impl Into<String>, factory: F)
    where
        F: Fn(&Value, &BuildContext<'_>) -> Result<Box<dyn OutputGate>, BoxError> + 'static,
    {
        self.outputs.insert(output_type.into(), Box::new(factory));
    }

    #[must_use]
    pub fn has_process(&self, process_name: &str) -> bool {
        self.processes.contains_key(process_name)
    }

    /// Builds the solver selected by `settings.solver_type`.
    ///
    /// The factory receives every other key of the settings block.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Unknown`] for an unregistered type, or
    /// [`SetupError::Build`] if the factory fails.
    pub fn create_solver(
        &self,
        settings: &SolverSettings,
        ctx: &BuildContext<'_>,
    ) -> Result<Box<dyn Solver>, SetupError> {
        let name = &settings.solver_type;
        let factory = self.solvers.get(name).ok_or_else(|| SetupError::Unknown {
            kind: FactoryKind::Solver,
            name: name.clone(),
        })?;

        debug!(solver_type = %name, "building solver");
        factory(&Value::Object(settings.settings.clone()), ctx).map_err(|source| {
            SetupError::Build {
                kind: FactoryKind::Solver,
                name: name.clone(),
                source,
            }
        })
    }

    /// Builds one hook per process entry, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first [`SetupError`] encountered. No hook is returned if
    /// any of them fails.
    pub fn create_hooks<'s>(
        &self,
        specs: impl IntoIterator<Item = &'s ProcessSpec>,
        ctx: &BuildContext<'_>,
    ) -> Result<Vec<Box<dyn Hook>>, SetupError> {
        specs
            .into_iter()
            .map(|spec| {
                let name = &spec.process_name;
                let factory = self.processes.get(name).ok_or_else(|| SetupError::Unknown {
                    kind: FactoryKind::Process,
                    name: name.clone(),
                })?;

                debug!(process_name = %name, "building process");
                factory(&spec.parameters, ctx).map_err(|source| SetupError::Build {
                    kind: FactoryKind::Process,
                    name: name.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Builds the output gate described by an `output_configuration` block.
    ///
    /// The gate type is read from the block's `output_type` key and defaults
    /// to [`DEFAULT_OUTPUT_TYPE`].
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Unknown`] for an unregistered type, or
    /// [`SetupError::Build`] if the factory fails.
    pub fn create_output(
        &self,
        config: &Value,
        ctx: &BuildContext<'_>,
    ) -> Result<Box<dyn OutputGate>, SetupError> {
        let name = config
            .get("output_type")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_OUTPUT_TYPE);

        let factory = self.outputs.get(name).ok_or_else(|| SetupError::Unknown {
            kind: FactoryKind::Output,
            name: name.to_owned(),
        })?;

        debug!(output_type = name, "building output gate");
        factory(config, ctx).map_err(|source| SetupError::Build {
            kind: FactoryKind::Output,
            name: name.to_owned(),
            source,
        })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("solvers", &self.solvers.keys().collect::<Vec<_>>())
            .field("processes", &self.processes.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish()
    }
}
