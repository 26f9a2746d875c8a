//! Engine client configuration.

use std::path::PathBuf;

/// Configuration for spawning the engine binary.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path of the engine binary.
    pub binary: PathBuf,
    /// Extra arguments passed to the binary.
    pub args: Vec<String>,
    /// Working directory for the engine process: the project directory.
    pub project_dir: PathBuf,
}

impl EngineConfig {
    /// Configuration for the given binary, running in the current directory.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            project_dir: PathBuf::from("."),
        }
    }

    /// Set the project directory the engine runs in.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Append an argument for the engine binary.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}
