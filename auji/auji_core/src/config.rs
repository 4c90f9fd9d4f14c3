//! Launcher configuration.
//!
//! Every field has a default matching the stock development setup, so an
//! absent `auji.toml` yields a launcher that behaves exactly like the plain
//! "create `.venv`, install `requirements.txt`, run uvicorn" routine.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::server;
use crate::utils::{LogLevel, PythonVersion};

/// File name looked up in the project directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "auji.toml";

/// A module run inside the environment once the manifest is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInstallStep {
    /// Module passed to `python -m`
    pub module: String,

    /// Arguments after the module name
    #[serde(default)]
    pub args: Vec<String>,
}

/// Isolated environment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment directory, relative to the project directory
    #[serde(default = "default_environment_dir")]
    pub dir: PathBuf,

    /// Base interpreter used to create the environment
    #[serde(default = "default_base_python")]
    pub python: String,

    /// Dependency manifest, relative to the project directory
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Packaging tools upgraded right after creation
    #[serde(default = "default_bootstrap_packages")]
    pub bootstrap_packages: Vec<String>,

    /// Extra steps after the manifest install
    #[serde(default)]
    pub post_install: Vec<PostInstallStep>,

    /// Oldest acceptable base interpreter, e.g. `"3.10"`
    #[serde(default)]
    pub min_python: Option<String>,
}

fn default_environment_dir() -> PathBuf {
    PathBuf::from(".venv")
}

fn default_base_python() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

fn default_manifest() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_bootstrap_packages() -> Vec<String> {
    vec!["pip".to_string(), "wheel".to_string()]
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            dir: default_environment_dir(),
            python: default_base_python(),
            manifest: default_manifest(),
            bootstrap_packages: default_bootstrap_packages(),
            post_install: Vec::new(),
            min_python: None,
        }
    }
}

impl EnvironmentConfig {
    /// Parsed minimum interpreter version, if one is configured.
    pub fn min_python(&self) -> Result<Option<PythonVersion>> {
        match &self.min_python {
            Some(raw) => Ok(Some(raw.parse()?)),
            None => Ok(None),
        }
    }
}

/// ASGI server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server module run with `python -m`
    #[serde(default = "default_server_module")]
    pub module: String,

    /// Application object, as `module:attribute`
    #[serde(default = "default_app")]
    pub app: String,

    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Restart the server when sources change
    #[serde(default = "default_reload")]
    pub reload: bool,
}

fn default_server_module() -> String {
    "uvicorn".to_string()
}

fn default_app() -> String {
    "app.main:app".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_reload() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            module: default_server_module(),
            app: default_app(),
            host: default_host(),
            port: default_port(),
            reload: default_reload(),
        }
    }
}

/// Variables set on the server process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Variable pointing the interpreter at the project directory
    #[serde(default = "default_path_var")]
    pub path_var: String,

    /// Feature flag toggling headless scraping
    #[serde(default = "default_headless_var")]
    pub headless_var: String,

    /// Value of the feature flag
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Additional variables, passed through verbatim
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_path_var() -> String {
    "PYTHONPATH".to_string()
}

fn default_headless_var() -> String {
    "SCRAPER_HEADLESS".to_string()
}

fn default_headless() -> bool {
    true
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            path_var: default_path_var(),
            headless_var: default_headless_var(),
            headless: default_headless(),
            extra: BTreeMap::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Launcher log level
    #[serde(default)]
    pub level: LogLevel,
}

/// Launcher configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Isolated environment
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// ASGI server
    #[serde(default)]
    pub server: ServerConfig,

    /// Server process environment
    #[serde(default)]
    pub env: EnvConfig,

    /// Launcher logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-run server settings that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerOverrides {
    /// Bind address
    pub host: Option<String>,

    /// Bind port
    pub port: Option<u16>,

    /// Application object
    pub app: Option<String>,

    /// Disable auto-reload
    pub no_reload: bool,
}

impl LaunchConfig {
    /// Load configuration for a project.
    ///
    /// An explicit `path` must exist. Without one, `auji.toml` in the project
    /// directory is used when present and built-in defaults otherwise.
    ///
    /// # Arguments
    ///
    /// * `path` - Configuration file named on the command line, if any.
    /// * `project_dir` - Project directory searched for `auji.toml`.
    ///
    /// # Returns
    ///
    /// The validated configuration, with the server host trimmed.
    pub fn load(path: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()).into());
                }
                Self::from_file(path)?
            }
            None => {
                let candidate = project_dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::from_file(&candidate)?
                } else {
                    info!("No {} found, using defaults", CONFIG_FILE_NAME);
                    Self::default()
                }
            }
        };

        config.server.host = config.server.host.trim().to_string();
        config.validate()?;

        Ok(config)
    }

    /// Read and parse a configuration file without validating it.
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Parsed configuration: {:?}", config);

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let env = &self.environment;

        if env.dir.as_os_str().is_empty() {
            return Err(invalid("Environment directory cannot be empty"));
        }

        if !is_contained_relative(&env.dir) {
            return Err(invalid(format!(
                "Environment directory '{}' must be a subdirectory of the project, \
                 without '.' or '..' components",
                env.dir.display()
            )));
        }

        if env.python.trim().is_empty() {
            return Err(invalid("Base interpreter cannot be empty"));
        }

        if env.manifest.as_os_str().is_empty() {
            return Err(invalid("Dependency manifest cannot be empty"));
        }

        if env.bootstrap_packages.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("Bootstrap package names cannot be empty"));
        }

        if env.post_install.iter().any(|s| s.module.trim().is_empty()) {
            return Err(invalid("Post-install steps must name a module"));
        }

        env.min_python()?;

        if self.server.module.trim().is_empty() {
            return Err(invalid("Server module cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(invalid("Server port cannot be zero"));
        }

        server::parse_bind_address(&self.server.host, self.server.port)?;
        server::validate_app_target(&self.server.app)?;

        for name in [&self.env.path_var, &self.env.headless_var]
            .into_iter()
            .chain(self.env.extra.keys())
        {
            if !is_valid_env_name(name) {
                return Err(invalid(format!(
                    "'{}' is not a valid environment variable name",
                    name
                )));
            }
        }

        if self.env.path_var == self.env.headless_var {
            return Err(invalid(format!(
                "Path and headless variables must differ (both are '{}')",
                self.env.path_var
            )));
        }

        if self.env.extra.contains_key(&self.env.path_var)
            || self.env.extra.contains_key(&self.env.headless_var)
        {
            warn!("Extra environment entries for the path or headless variable are ignored");
        }

        if !self.server.host.starts_with("127.") && self.server.host != "::1" {
            warn!(
                "Server will bind {}, which is reachable from other hosts",
                self.server.host
            );
        }

        Ok(())
    }

    /// Apply per-run overrides and re-validate.
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from the command line; `None` keeps the file value.
    pub fn apply_overrides(&mut self, overrides: ServerOverrides) -> Result<()> {
        if let Some(host) = overrides.host {
            self.server.host = host.trim().to_string();
        }

        if let Some(port) = overrides.port {
            self.server.port = port;
        }

        if let Some(app) = overrides.app {
            self.server.app = app;
        }

        if overrides.no_reload {
            self.server.reload = false;
        }

        self.validate()
    }
}

/// Whether `dir` stays strictly below the directory it is joined to.
///
/// Absolute paths, drive prefixes and `.`/`..` components are rejected, so
/// the environment can never resolve to the project directory itself or
/// anything above it.
fn is_contained_relative(dir: &Path) -> bool {
    // `components` drops interior `.` segments, so look at the raw text too
    let raw_dot = dir
        .to_string_lossy()
        .split(|c: char| c == '/' || c == '\\')
        .any(|part| part == "." || part == "..");

    !raw_dot
        && dir.components().next().is_some()
        && dir
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

fn invalid(message: impl Into<String>) -> crate::Error {
    ConfigError::Invalid(message.into()).into()
}

/// POSIX-style variable name: ASCII alphanumerics and underscores, not
/// starting with a digit.
pub(crate) fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
