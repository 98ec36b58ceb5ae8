use std::path::Path;

use crate::{Model, SimulationClock};

/// The simulation state visible to a lifecycle callback.
///
/// The clock is shared read-only: only the controller advances it. The model
/// is shared mutably, and callbacks see each other's writes in registration
/// order.
#[derive(Debug)]
pub struct Context<'a> {
    pub clock: &'a SimulationClock,
    pub model: &'a mut Model,
}

impl<'a> Context<'a> {
    pub fn new(clock: &'a SimulationClock, model: &'a mut Model) -> Self {
        Self { clock, model }
    }
}

/// What a factory may inspect while constructing a hook, gate or solver.
///
/// `model` is the model after the solver's setup calls, so every part a
/// process may refer to already exists. Relative file names resolve against
/// `base_dir`.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub model: &'a Model,
    pub base_dir: &'a Path,
    pub problem_name: &'a str,
    pub echo_level: u32,
}

impl BuildContext<'_> {
    /// Resolves `file_name` against the base directory.
    ///
    /// Absolute paths are returned unchanged.
    #[must_use]
    pub fn resolve(&self, file_name: impl AsRef<Path>) -> std::path::PathBuf {
        self.base_dir.join(file_name)
    }
}
