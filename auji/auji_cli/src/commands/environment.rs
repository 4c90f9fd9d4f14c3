//! Environment maintenance commands
//!
//! `check` reports whether a launch would get as far as starting the server;
//! `clean` removes the isolated environment so the next run provisions it
//! from scratch.

use std::path::PathBuf;

use auji_core::{LaunchConfig, Launcher, ReadinessReport};
use clap::Args;

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// Arguments for the clean command
#[derive(Args)]
pub struct CleanArgs {}

/// Implementation of the check command
///
/// Exits with 1 when the project is not ready.
pub fn execute_check(
    args: &CheckArgs,
    config: LaunchConfig,
    project_dir: PathBuf,
) -> anyhow::Result<i32> {
    let report = Launcher::new(config, project_dir)?.readiness();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }

    Ok(if report.is_ready() { 0 } else { 1 })
}

/// Implementation of the clean command
pub fn execute_clean(
    _args: &CleanArgs,
    config: LaunchConfig,
    project_dir: PathBuf,
) -> anyhow::Result<i32> {
    let launcher = Launcher::new(config, project_dir)?;
    let root = launcher.venv().root().display().to_string();

    if launcher.clean()? {
        println!("🧹 Removed {}", root);
    } else {
        println!("Nothing to remove at {}", root);
    }

    Ok(0)
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

fn render(report: &ReadinessReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} environment  {} ({})\n",
        mark(report.environment_present),
        report.environment_dir.display(),
        if report.environment_present {
            "present"
        } else {
            "will be created"
        }
    ));
    out.push_str(&format!(
        "{} manifest     {}\n",
        mark(report.manifest_present),
        report.manifest.display()
    ));
    match &report.base_python_version {
        Ok(version) => out.push_str(&format!(
            "{} interpreter  {} ({})\n",
            mark(true),
            report.base_python,
            version
        )),
        Err(reason) => out.push_str(&format!(
            "{} interpreter  {} ({})\n",
            mark(false),
            report.base_python,
            reason
        )),
    }
    match &report.port_available {
        Ok(true) => out.push_str(&format!(
            "{} bind         {} (free)\n",
            mark(true),
            report.bind_address
        )),
        Ok(false) => out.push_str(&format!(
            "{} bind         {} (in use)\n",
            mark(false),
            report.bind_address
        )),
        Err(reason) => out.push_str(&format!(
            "{} bind         {} ({})\n",
            mark(false),
            report.bind_address,
            reason
        )),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ReadinessReport {
        ReadinessReport {
            environment_dir: PathBuf::from("/srv/auji/.venv"),
            environment_present: false,
            manifest: PathBuf::from("/srv/auji/requirements.txt"),
            manifest_present: true,
            base_python: "python3".to_string(),
            base_python_version: Ok("3.11.4".to_string()),
            bind_address: "127.0.0.1:8000".to_string(),
            port_available: Ok(true),
        }
    }

    #[test]
    fn test_render_ready_project() {
        let text = render(&report());
        assert!(text.contains("/srv/auji/.venv (will be created)"));
        assert!(text.contains("python3 (3.11.4)"));
        assert!(text.contains("127.0.0.1:8000 (free)"));
    }

    #[test]
    fn test_render_port_in_use() {
        let mut report = report();
        report.port_available = Ok(false);
        assert!(render(&report).contains("127.0.0.1:8000 (in use)"));
        assert!(!report.is_ready());
    }
}
