//! Server process environment.
//!
//! The launcher never calls `std::env::set_var`. Variables are attached to
//! the server's [`CommandSpec`], so they exist only in the spawned process
//! tree and vanish when it exits.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::EnvConfig;
use crate::process::CommandSpec;

/// Variables handed to the server process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LaunchEnvironment {
    vars: BTreeMap<String, String>,
}

impl LaunchEnvironment {
    /// Resolve the configured variables for a project.
    ///
    /// The path variable is set to `project_dir` and the feature flag to `1`
    /// or `0`. Both take precedence over same-named `extra` entries.
    pub fn from_config(config: &EnvConfig, project_dir: &Path) -> Self {
        let mut vars = config.extra.clone();
        vars.insert(
            config.path_var.clone(),
            project_dir.display().to_string(),
        );
        vars.insert(
            config.headless_var.clone(),
            if config.headless { "1" } else { "0" }.to_string(),
        );
        Self { vars }
    }

    /// Look up one variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// All variables, sorted by name.
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Attach the variables to a command.
    pub fn apply(&self, spec: CommandSpec) -> CommandSpec {
        self.vars
            .iter()
            .fold(spec, |spec, (key, value)| spec.env(key.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_variables() {
        let env = LaunchEnvironment::from_config(&EnvConfig::default(), Path::new("/srv/auji"));

        assert_eq!(env.get("PYTHONPATH"), Some("/srv/auji"));
        assert_eq!(env.get("SCRAPER_HEADLESS"), Some("1"));
        assert_eq!(env.vars().len(), 2);
    }

    #[test]
    fn test_headless_off_and_extras() {
        let mut config = EnvConfig {
            headless: false,
            ..Default::default()
        };
        config
            .extra
            .insert("SCHEDULER_INTERVAL_HOURS".to_string(), "4".to_string());
        config
            .extra
            .insert("PYTHONPATH".to_string(), "/elsewhere".to_string());

        let env = LaunchEnvironment::from_config(&config, Path::new("/srv/auji"));

        assert_eq!(env.get("SCRAPER_HEADLESS"), Some("0"));
        assert_eq!(env.get("SCHEDULER_INTERVAL_HOURS"), Some("4"));
        assert_eq!(env.get("PYTHONPATH"), Some("/srv/auji"));
    }

    #[test]
    fn test_apply_sets_child_env_only() {
        let env = LaunchEnvironment::from_config(&EnvConfig::default(), Path::new("/srv/auji"));
        let spec = env.apply(CommandSpec::new("python3"));

        assert_eq!(spec.env.len(), 2);
        assert_eq!(
            spec.env.get("SCRAPER_HEADLESS").map(String::as_str),
            Some("1")
        );
        assert!(std::env::var("SCRAPER_HEADLESS").is_err());
    }
}
