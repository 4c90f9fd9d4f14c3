//! Launch commands
//!
//! `run` provisions the environment when needed and then blocks on the
//! server; `setup` stops after provisioning.

use std::path::PathBuf;

use anyhow::Context;
use auji_core::{LaunchConfig, Launcher, Provision, ServerOverrides};
use clap::Args;

/// Arguments for the run command
#[derive(Args, Default)]
pub struct RunArgs {
    /// Bind address (must be an IP address)
    #[clap(long)]
    pub host: Option<String>,

    /// Bind port
    #[clap(long)]
    pub port: Option<u16>,

    /// Application object, as module:attribute
    #[clap(long)]
    pub app: Option<String>,

    /// Disable auto-reload
    #[clap(long)]
    pub no_reload: bool,
}

/// Arguments for the setup command
#[derive(Args)]
pub struct SetupArgs {
    /// Remove an existing environment first
    #[clap(long)]
    pub recreate: bool,
}

/// Implementation of the run command
///
/// Returns the server's exit code.
pub fn execute_run(
    args: &RunArgs,
    mut config: LaunchConfig,
    project_dir: PathBuf,
) -> anyhow::Result<i32> {
    config
        .apply_overrides(ServerOverrides {
            host: args.host.clone(),
            port: args.port,
            app: args.app.clone(),
            no_reload: args.no_reload,
        })
        .context("Invalid server options")?;

    let launcher = Launcher::new(config, project_dir)?;

    let provision = launcher
        .prepare()
        .context("Failed to prepare the isolated environment")?;
    report_provision(provision, &launcher);

    println!(
        "🚀 Starting {} on http://{}",
        launcher.config().server.app,
        launcher.bind_address()
    );
    let exit = launcher.serve().context("Failed to run the server")?;

    Ok(exit.exit_code())
}

/// Implementation of the setup command
pub fn execute_setup(
    args: &SetupArgs,
    config: LaunchConfig,
    project_dir: PathBuf,
) -> anyhow::Result<i32> {
    let launcher = Launcher::new(config, project_dir)?;

    if args.recreate && launcher.clean()? {
        println!("🧹 Removed {}", launcher.venv().root().display());
    }

    let provision = launcher
        .prepare()
        .context("Failed to prepare the isolated environment")?;
    report_provision(provision, &launcher);

    Ok(0)
}

fn report_provision(provision: Provision, launcher: &Launcher) {
    let root = launcher.venv().root().display().to_string();
    match provision {
        Provision::Created => println!("✅ Created environment at {}", root),
        Provision::Reused => println!("✅ Using existing environment at {}", root),
    }
}
