//! Subcommand implementations.
//!
//! Each command takes the resolved configuration and project directory and
//! returns the process exit code.

pub mod environment;
pub mod launch;
pub mod plan;
