//! Error types for the fly entry layer.

use std::path::PathBuf;

use crate::constants::{EXIT_EXEC_FAILED, EXIT_SETUP_FAILED};

/// Result type alias for fly entry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while persisting an environment or entering a pod.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Environment variable cannot be represented in the line format.
    #[error("invalid environment variable '{name}': {reason}")]
    InvalidEnvironment { name: String, reason: String },

    /// Application name does not follow the naming rules.
    #[error("invalid app name '{name}': {reason}")]
    InvalidAppName { name: String, reason: String },

    /// Uid range string could not be parsed.
    #[error("invalid uid range '{value}': {reason}")]
    InvalidUidRange { value: String, reason: String },

    /// Pod pid is not a decimal process id.
    #[error("invalid pid '{pid}': {reason}")]
    InvalidPid { pid: String, reason: String },

    /// No command was given to execute.
    #[error("no command given to execute")]
    EmptyCommand,

    // =========================================================================
    // Environment File Errors
    // =========================================================================
    /// Creating the environment file's directory failed.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing the environment file failed.
    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading the environment file failed.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Adjusting ownership of a written file failed.
    #[error("failed to shift ownership of {path}: {source}")]
    ShiftOwnership {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The current working directory could not be determined.
    #[error("failed to get current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    // =========================================================================
    // Entry Errors
    // =========================================================================
    /// The pod root link could not be read.
    #[error("failed to get pod root for pid {pid}: {source}")]
    ResolveRoot {
        pid: String,
        source: std::io::Error,
    },

    /// Changing into the pod root failed.
    #[error("failed to change to new root {path}: {source}")]
    ChangeDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Changing the filesystem root failed.
    #[error("failed to chroot to {path}: {source}")]
    ChangeRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Replacing the process image failed.
    #[error("exec of {program} failed: {source}")]
    Exec {
        program: String,
        source: std::io::Error,
    },
}

impl Error {
    /// Returns the process exit status this error terminates with.
    ///
    /// Only [`Error::Exec`] maps to [`EXIT_EXEC_FAILED`]; everything else
    /// means the target was never reached.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Exec { .. } => EXIT_EXEC_FAILED,
            _ => EXIT_SETUP_FAILED,
        }
    }
}
