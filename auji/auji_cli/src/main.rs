use std::path::PathBuf;

use anyhow::Context;
use auji_core::launcher::resolve_project_dir;
use auji_core::utils::logging;
use auji_core::{LaunchConfig, LogLevel};
use clap::{Parser, Subcommand};
use log::debug;

mod commands;

use commands::environment::{CheckArgs, CleanArgs};
use commands::launch::{RunArgs, SetupArgs};
use commands::plan::PlanArgs;

/// AUJI development launcher
///
/// Creates the project's isolated Python environment on first use, then runs
/// the API under uvicorn with auto-reload. With no subcommand it behaves like
/// `auji run`.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[clap(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Configuration file (defaults to auji.toml in the project directory)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warning or error
    #[clap(long, global = true)]
    log_level: Option<LogLevel>,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the environment if needed, then run the server
    Run(RunArgs),

    /// Provision the environment without starting the server
    Setup(SetupArgs),

    /// Show what a run would do without running anything
    Plan(PlanArgs),

    /// Report whether the project is ready to launch
    Check(CheckArgs),

    /// Remove the isolated environment
    Clean(CleanArgs),
}

fn main() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<i32> {
    let project_dir = resolve_project_dir(cli.project_dir.as_deref())
        .context("Failed to resolve the project directory")?;

    let config = LaunchConfig::load(cli.config.as_deref(), &project_dir)
        .context("Failed to load launcher configuration")?;

    logging::init(cli.log_level.unwrap_or(config.logging.level));
    debug!("Project directory: {}", project_dir.display());

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => commands::launch::execute_run(&args, config, project_dir),
        Commands::Setup(args) => commands::launch::execute_setup(&args, config, project_dir),
        Commands::Plan(args) => commands::plan::execute_plan(&args, config, project_dir),
        Commands::Check(args) => commands::environment::execute_check(&args, config, project_dir),
        Commands::Clean(args) => commands::environment::execute_clean(&args, config, project_dir),
    }
}
