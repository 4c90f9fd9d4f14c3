//! Isolated environment provisioning.
//!
//! The interpreter inside the environment directory is the one-time setup
//! guard: when it exists the environment is reused untouched, otherwise the
//! environment is created, packaging tools are upgraded and the manifest is
//! installed. A failed setup step removes the half-built directory again when
//! this run created it, so the guard never reports an environment that was
//! not fully provisioned. Directories without a `pyvenv.cfg` marker are never
//! deleted.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::EnvironmentConfig;
use crate::error::{EnvironmentError, ProcessError, Result};
use crate::process::{is_explicit_path, CommandSpec, ProcessRunner};
use crate::utils::PythonVersion;

const CREATE_STEP: &str = "create-environment";

/// File every environment created by `python -m venv` carries at its root.
pub const MARKER_FILE: &str = "pyvenv.cfg";

/// Outcome of [`VirtualEnv::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provision {
    /// The interpreter was already present; nothing ran.
    Reused,

    /// The environment was created and populated.
    Created,
}

/// One subprocess of environment setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupStep {
    /// Short step name used in logs and errors.
    pub name: String,

    /// Command to run.
    pub command: CommandSpec,
}

/// An isolated interpreter environment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
}

impl VirtualEnv {
    /// An environment rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The environment configured for a project.
    pub fn for_project(config: &EnvironmentConfig, project_dir: &Path) -> Self {
        Self::new(project_dir.join(&config.dir))
    }

    /// Environment directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the environment's interpreter.
    pub fn interpreter_path(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts").join("python.exe")
        } else {
            self.root.join("bin").join("python")
        }
    }

    /// Whether the environment's interpreter exists.
    pub fn exists(&self) -> bool {
        self.interpreter_path().is_file()
    }

    /// Whether the directory carries the `pyvenv.cfg` marker.
    pub fn has_marker(&self) -> bool {
        self.root.join(MARKER_FILE).is_file()
    }

    /// The setup steps, in order, for a fresh environment.
    pub fn setup_steps(&self, config: &EnvironmentConfig, project_dir: &Path) -> Vec<SetupStep> {
        let python = self.interpreter_path();
        let step = |name: String, command: CommandSpec| SetupStep {
            name,
            command: command.current_dir(project_dir),
        };

        let mut steps = vec![step(
            CREATE_STEP.to_string(),
            CommandSpec::new(&config.python)
                .args(["-m", "venv"])
                .arg(self.root.display().to_string()),
        )];

        if !config.bootstrap_packages.is_empty() {
            steps.push(step(
                "upgrade-packaging".to_string(),
                CommandSpec::new(&python)
                    .args(["-m", "pip", "install", "--upgrade"])
                    .args(config.bootstrap_packages.iter().cloned()),
            ));
        }

        steps.push(step(
            "install-manifest".to_string(),
            CommandSpec::new(&python)
                .args(["-m", "pip", "install", "-r"])
                .arg(project_dir.join(&config.manifest).display().to_string()),
        ));

        for post in &config.post_install {
            steps.push(step(
                format!("post-install:{}", post.module),
                CommandSpec::new(&python)
                    .arg("-m")
                    .arg(post.module.as_str())
                    .args(post.args.iter().cloned()),
            ));
        }

        steps
    }

    /// Make sure the environment exists, provisioning it if needed.
    ///
    /// Any failing step is fatal: the partial environment is removed and the
    /// error names the step.
    pub fn ensure<R: ProcessRunner + ?Sized>(
        &self,
        runner: &R,
        config: &EnvironmentConfig,
        project_dir: &Path,
    ) -> Result<Provision> {
        if self.exists() {
            info!("Reusing environment at {}", self.root.display());
            return Ok(Provision::Reused);
        }

        // Only a directory this run creates may be rolled back
        let created_here = !self.root.exists();
        if !created_here {
            warn!(
                "{} exists without an interpreter, provisioning into it",
                self.root.display()
            );
        }

        self.preflight(runner, config, project_dir)?;

        info!("Creating environment at {}", self.root.display());
        for step in self.setup_steps(config, project_dir) {
            info!("Setup step '{}': {}", step.name, step.command);

            let status = match runner.run(&step.command) {
                Ok(status) => status,
                Err(e) => {
                    self.rollback(created_here);
                    return Err(e);
                }
            };

            if !status.success() {
                error!("Setup step '{}' failed with {}", step.name, status);
                self.rollback(created_here);
                return Err(EnvironmentError::StepFailed {
                    step: step.name,
                    status,
                }
                .into());
            }

            if step.name == CREATE_STEP && !self.exists() {
                self.rollback(created_here);
                return Err(EnvironmentError::InterpreterMissing(self.interpreter_path()).into());
            }
        }

        info!("Environment ready at {}", self.root.display());
        Ok(Provision::Created)
    }

    /// Remove the environment directory.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when there was nothing to remove, `Ok(true)` once the
    /// directory is gone. A directory without the `pyvenv.cfg` marker is
    /// never deleted and yields [`EnvironmentError::NotAnEnvironment`].
    pub fn remove(&self) -> Result<bool> {
        if !self.root.exists() {
            return Ok(false);
        }

        if !self.has_marker() {
            return Err(EnvironmentError::NotAnEnvironment(self.root.clone()).into());
        }

        self.remove_dir()?;
        Ok(true)
    }

    fn remove_dir(&self) -> Result<()> {
        fs::remove_dir_all(&self.root).map_err(|source| EnvironmentError::Removal {
            path: self.root.clone(),
            source,
        })?;
        info!("Removed environment at {}", self.root.display());
        Ok(())
    }

    fn preflight<R: ProcessRunner + ?Sized>(
        &self,
        runner: &R,
        config: &EnvironmentConfig,
        project_dir: &Path,
    ) -> Result<()> {
        let manifest = project_dir.join(&config.manifest);
        if !manifest.is_file() {
            return Err(EnvironmentError::ManifestMissing(manifest).into());
        }

        let base = Path::new(&config.python);
        if is_explicit_path(base) && !base.exists() {
            return Err(EnvironmentError::InterpreterMissing(base.to_path_buf()).into());
        }

        if let Some(minimum) = config.min_python()? {
            let found = base_interpreter_version(runner, config)?;
            if !found.meets_minimum(&minimum) {
                return Err(EnvironmentError::InterpreterTooOld {
                    found: found.to_string(),
                    required: minimum.to_string(),
                }
                .into());
            }
            debug!("Base interpreter {} meets minimum {}", found, minimum);
        }

        Ok(())
    }

    fn rollback(&self, created_here: bool) {
        if !created_here {
            warn!(
                "Leaving {} in place, it existed before this run",
                self.root.display()
            );
            return;
        }

        if !self.root.exists() {
            return;
        }

        if let Err(e) = self.remove_dir() {
            warn!("Could not roll back partial environment: {}", e);
        }
    }
}

/// Ask the base interpreter for its version.
pub fn base_interpreter_version<R: ProcessRunner + ?Sized>(
    runner: &R,
    config: &EnvironmentConfig,
) -> Result<PythonVersion> {
    let output = runner.capture(&CommandSpec::new(&config.python).arg("--version"))?;
    if !output.status.success() {
        return Err(ProcessError::Output {
            program: config.python.clone(),
            reason: format!("--version ended with {}", output.status),
        }
        .into());
    }

    let combined = format!("{}\n{}", output.stdout, output.stderr);
    Ok(PythonVersion::from_version_output(&combined)?)
}
