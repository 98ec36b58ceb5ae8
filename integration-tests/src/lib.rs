//! Support for running the parameter-file cases under `cases/`.
//!
//! Every case lives in `cases/<name>/` with its parameters in
//! `<name>_parameters.json`, next to any reference files it reads. A [`Case`]
//! copies that directory into a scratch location before running, so output
//! files never land in the source tree.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::Value;
use stride_driver::{Analysis, Error, RunSummary};
use tempfile::TempDir;

/// A case copied into its own temporary directory.
#[derive(Debug)]
pub struct Case {
    name: String,
    dir: TempDir,
}

impl Case {
    /// Copies `cases/<name>/` into a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the case does not exist or cannot be copied.
    pub fn load(name: &str) -> io::Result<Self> {
        let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("cases").join(name);
        let dir = TempDir::new()?;

        for entry in fs::read_dir(&source)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::copy(entry.path(), dir.path().join(entry.file_name()))?;
            }
        }

        Ok(Self {
            name: name.to_owned(),
            dir,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn parameters(&self) -> PathBuf {
        self.dir().join(format!("{}_parameters.json", self.name))
    }

    /// Reads the case's parameters into an [`Analysis`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the parameters are invalid.
    pub fn analysis(&self) -> Result<Analysis, Error> {
        Analysis::from_file(self.parameters())
    }

    /// Runs the case to completion.
    ///
    /// # Errors
    ///
    /// Returns whatever error ends the run.
    pub fn run(&self) -> Result<RunSummary, Error> {
        self.analysis()?.run()
    }

    /// Reads a file the run produced, relative to the case directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(&self, file: impl AsRef<Path>) -> io::Result<String> {
        fs::read_to_string(self.dir().join(file))
    }

    /// Reads and parses a JSON file the run produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn read_json(&self, file: impl AsRef<Path>) -> io::Result<Value> {
        Ok(serde_json::from_str(&self.read(file)?)?)
    }
}
