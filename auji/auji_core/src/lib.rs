//! # AUJI Core
//!
//! `auji_core` provisions the isolated interpreter environment for the AUJI
//! API and launches its development server.
//!
//! A launch is a short, strictly sequential affair:
//!
//! 1. If the environment's interpreter is missing, create the environment,
//!    upgrade the packaging tools and install the dependency manifest.
//! 2. Attach the path and headless-scraping variables to the server command.
//! 3. Run `python -m uvicorn app.main:app --reload` on the loopback address
//!    and wait for it to exit.
//!
//! Setup failures are fatal: the partial environment is removed and the
//! server is never started.
//!
//! ## Crate Structure
//!
//! - **config**: launcher configuration loaded from `auji.toml`
//! - **environment**: variables passed to the server process
//! - **error**: error types for all launcher components
//! - **launcher**: phased orchestration and launch plans
//! - **process**: command descriptions and the process runner seam
//! - **server**: server command construction and port probing
//! - **utils**: logging setup and interpreter versions
//! - **venv**: isolated environment provisioning

pub mod config;
pub mod environment;
pub mod error;
pub mod launcher;
pub mod process;
pub mod server;
pub mod utils;
pub mod venv;

// Re-export key types for convenience
pub use config::{LaunchConfig, ServerOverrides};
pub use environment::LaunchEnvironment;
pub use error::{Error, Result};
pub use launcher::{LaunchOutcome, LaunchPlan, Launcher, ReadinessReport};
pub use process::{CommandSpec, ProcessExit, ProcessRunner, SystemRunner};
pub use utils::{LogLevel, PythonVersion};
pub use venv::{Provision, VirtualEnv};
