//! Launch orchestration.
//!
//! A launch runs in four strictly sequential phases:
//!
//! 1. **Preflight**: resolve the project directory and configuration.
//! 2. **Provision**: reuse or create the isolated environment.
//! 3. **Configure**: build the server command and its environment.
//! 4. **Serve**: run the server and wait for it to exit.
//!
//! Provisioning failures abort the launch before the server is started.

use std::env;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::config::LaunchConfig;
use crate::environment::LaunchEnvironment;
use crate::error::{ConfigError, EnvironmentError, Result};
use crate::process::{CommandSpec, ProcessExit, ProcessRunner, SystemRunner};
use crate::server;
use crate::venv::{self, Provision, SetupStep, VirtualEnv};

/// Launch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    /// Phase 0: project and configuration checks
    Preflight = 0,

    /// Phase 1: isolated environment
    Provision = 1,

    /// Phase 2: server command and environment
    Configure = 2,

    /// Phase 3: server running
    Serve = 3,
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preflight => "preflight",
            Self::Provision => "provision",
            Self::Configure => "configure",
            Self::Serve => "serve",
        };
        write!(f, "{} ({})", *self as u8, name)
    }
}

/// Resolve the project directory.
///
/// Defaults to the current directory; relative paths are taken from it.
/// The directory must exist.
pub fn resolve_project_dir(path: Option<&Path>) -> Result<PathBuf> {
    let cwd = env::current_dir()?;
    let dir = match path {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => cwd.join(path),
        None => cwd,
    };

    if !dir.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "Project directory {} does not exist",
            dir.display()
        ))
        .into());
    }

    Ok(dir)
}

/// What a run would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchPlan {
    /// Project directory every command runs in.
    pub project_dir: PathBuf,

    /// Isolated environment directory.
    pub environment_dir: PathBuf,

    /// Interpreter inside the environment.
    pub interpreter: PathBuf,

    /// Whether the environment has to be provisioned first.
    pub provision_needed: bool,

    /// Setup steps that would run; empty when the environment is reused.
    pub setup_steps: Vec<SetupStep>,

    /// Server command, including its environment.
    pub server: CommandSpec,
}

/// Result of a completed launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Whether the environment was reused or created.
    pub provision: Provision,

    /// How the server exited.
    pub exit: ProcessExit,
}

/// Readiness of a project for launching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// Isolated environment directory.
    pub environment_dir: PathBuf,

    /// Whether the environment interpreter exists.
    pub environment_present: bool,

    /// Dependency manifest.
    pub manifest: PathBuf,

    /// Whether the manifest exists.
    pub manifest_present: bool,

    /// Base interpreter command.
    pub base_python: String,

    /// Base interpreter version, or why it could not be determined.
    pub base_python_version: std::result::Result<String, String>,

    /// Server bind address.
    pub bind_address: String,

    /// Whether the bind address is free, or why probing failed.
    pub port_available: std::result::Result<bool, String>,
}

impl ReadinessReport {
    /// Whether a launch is expected to get as far as starting the server.
    pub fn is_ready(&self) -> bool {
        let environment_ok = self.environment_present
            || (self.manifest_present && self.base_python_version.is_ok());
        environment_ok && matches!(self.port_available, Ok(true))
    }
}

/// Orchestrates provisioning and the server run for one project.
pub struct Launcher<R: ProcessRunner = SystemRunner> {
    config: LaunchConfig,
    project_dir: PathBuf,
    runner: R,
}

impl Launcher<SystemRunner> {
    /// A launcher that runs real processes.
    pub fn new(config: LaunchConfig, project_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_runner(config, project_dir, SystemRunner)
    }
}

impl<R: ProcessRunner> Launcher<R> {
    /// A launcher using the given process runner.
    pub fn with_runner(
        config: LaunchConfig,
        project_dir: impl Into<PathBuf>,
        runner: R,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            project_dir: project_dir.into(),
            runner,
        })
    }

    /// The launcher configuration.
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// The project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The process runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The project's isolated environment.
    pub fn venv(&self) -> VirtualEnv {
        VirtualEnv::for_project(&self.config.environment, &self.project_dir)
    }

    /// Variables the server will receive.
    pub fn environment(&self) -> LaunchEnvironment {
        LaunchEnvironment::from_config(&self.config.env, &self.project_dir)
    }

    /// The server command for the current configuration.
    pub fn server_command(&self) -> CommandSpec {
        server::server_command(
            &self.config.server,
            &self.venv().interpreter_path(),
            &self.project_dir,
            &self.environment(),
        )
    }

    /// Describe the launch without running anything.
    pub fn plan(&self) -> LaunchPlan {
        let venv = self.venv();
        let provision_needed = !venv.exists();
        let setup_steps = if provision_needed {
            venv.setup_steps(&self.config.environment, &self.project_dir)
        } else {
            Vec::new()
        };

        LaunchPlan {
            project_dir: self.project_dir.clone(),
            environment_dir: venv.root().to_path_buf(),
            interpreter: venv.interpreter_path(),
            provision_needed,
            setup_steps,
            server: self.server_command(),
        }
    }

    /// Provision the environment if needed.
    pub fn prepare(&self) -> Result<Provision> {
        info!("Launch phase {}", LaunchPhase::Preflight);
        info!("Project directory: {}", self.project_dir.display());

        info!("Launch phase {}", LaunchPhase::Provision);
        self.venv()
            .ensure(&self.runner, &self.config.environment, &self.project_dir)
    }

    /// Start the server and block until it exits.
    pub fn serve(&self) -> Result<ProcessExit> {
        info!("Launch phase {}", LaunchPhase::Configure);
        let venv = self.venv();
        if !venv.exists() {
            return Err(EnvironmentError::InterpreterMissing(venv.interpreter_path()).into());
        }

        let command = self.server_command();
        for (key, value) in &command.env {
            info!("Server environment: {}={}", key, value);
        }

        info!("Launch phase {}", LaunchPhase::Serve);
        info!(
            "Serving {} on http://{}",
            self.config.server.app,
            self.bind_address()
        );
        let exit = self.runner.run(&command)?;

        if exit.success() {
            info!("Server exited cleanly");
        } else {
            warn!("Server exited with {}", exit);
        }

        Ok(exit)
    }

    /// Provision, then serve.
    pub fn run(&self) -> Result<LaunchOutcome> {
        let provision = self.prepare()?;
        let exit = self.serve()?;
        Ok(LaunchOutcome { provision, exit })
    }

    /// Remove the isolated environment.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if a directory was removed and `Ok(false)` if there was none.
    /// A directory without the `pyvenv.cfg` marker is left alone and reported
    /// as an error.
    pub fn clean(&self) -> Result<bool> {
        self.venv().remove()
    }

    /// Inspect the project without changing anything.
    pub fn readiness(&self) -> ReadinessReport {
        let venv = self.venv();
        let manifest = self.project_dir.join(&self.config.environment.manifest);

        let base_python_version =
            venv::base_interpreter_version(&self.runner, &self.config.environment)
                .map(|v| v.to_string())
                .map_err(|e| e.to_string());

        let port_available =
            server::parse_bind_address(&self.config.server.host, self.config.server.port)
                .map_err(|e| e.to_string())
                .and_then(|addr| {
                    server::is_port_available(addr).map_err(|e: io::Error| e.to_string())
                });

        ReadinessReport {
            environment_dir: venv.root().to_path_buf(),
            environment_present: venv.exists(),
            manifest_present: manifest.is_file(),
            manifest,
            base_python: self.config.environment.python.clone(),
            base_python_version,
            bind_address: self.bind_address(),
            port_available,
        }
    }

    /// The server's bind address as `host:port`, with IPv6 hosts bracketed.
    pub fn bind_address(&self) -> String {
        match server::parse_bind_address(&self.config.server.host, self.config.server.port) {
            Ok(addr) => addr.to_string(),
            Err(_) => format!("{}:{}", self.config.server.host, self.config.server.port),
        }
    }
}
