//! Utility functions and types.
//!
//! Logging setup and interpreter version handling shared by the launcher
//! modules and the CLI.

pub mod logging;
pub mod version;

pub use logging::LogLevel;
pub use version::PythonVersion;
