//! Error types for the AUJI launcher.
//!
//! Errors are organized by subsystem, with each subsystem having its own
//! error type. The root error type, `Error`, wraps any of them so the CLI
//! can handle failures uniformly at the top level.

use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessExit;
use crate::utils::version::VersionParseError;

/// Root error type for the launcher.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Isolated environment errors
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// Child process errors
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Server launch errors
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Interpreter version errors
    #[error("Version error: {0}")]
    Version(#[from] VersionParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path of the file
        path: PathBuf,

        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the launcher
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// Path of the file
        path: PathBuf,

        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },

    /// A configuration value is out of range or malformed
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors related to provisioning the isolated environment.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The dependency manifest is missing, so provisioning cannot start
    #[error("Dependency manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    /// The environment interpreter is absent after provisioning
    #[error("Interpreter not found: {}", .0.display())]
    InterpreterMissing(PathBuf),

    /// The base interpreter is older than the configured minimum
    #[error("Interpreter {found} is older than the required {required}")]
    InterpreterTooOld {
        /// Version reported by the interpreter
        found: String,

        /// Configured minimum version
        required: String,
    },

    /// A setup step exited unsuccessfully
    #[error("Setup step '{step}' failed ({status})")]
    StepFailed {
        /// Name of the failed step
        step: String,

        /// How the step's process ended
        status: ProcessExit,
    },

    /// The directory lacks the environment marker and is left untouched
    #[error("Refusing to remove {}: not an isolated environment (no pyvenv.cfg)", .0.display())]
    NotAnEnvironment(PathBuf),

    /// The environment directory could not be removed
    #[error("Failed to remove {}: {source}", path.display())]
    Removal {
        /// Environment directory
        path: PathBuf,

        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to spawning child processes.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,

        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The program ran but its output was unusable
    #[error("Unexpected output from '{program}': {reason}")]
    Output {
        /// Program that produced the output
        program: String,

        /// What was wrong with it
        reason: String,
    },
}

/// Errors related to the server invocation.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The host is not an IP address
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    /// The application target is not of the form `module:attribute`
    #[error("Invalid application target '{0}', expected 'module:attribute'")]
    InvalidApp(String),
}

/// Result type used throughout the launcher.
///
/// This is a convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let env_err = EnvironmentError::ManifestMissing(PathBuf::from("requirements.txt"));
        let error: Error = env_err.into();
        assert!(matches!(error, Error::Environment(_)));

        let server_err = ServerError::InvalidApp("app.main".to_string());
        let error: Error = server_err.into();
        assert!(matches!(error, Error::Server(_)));
    }

    #[test]
    fn test_error_display() {
        let error: Error = EnvironmentError::StepFailed {
            step: "install-manifest".to_string(),
            status: ProcessExit::from_code(1),
        }
        .into();
        let display = error.to_string();
        assert!(display.contains("Setup step 'install-manifest' failed"));
        assert!(display.contains("exit code 1"));
    }
}
