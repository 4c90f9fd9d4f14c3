//! The plan command
//!
//! Prints the commands a run would execute, resolved against the current
//! configuration and environment state. Nothing is executed.

use std::path::PathBuf;

use auji_core::{LaunchConfig, LaunchPlan, Launcher};
use clap::Args;

/// Arguments for the plan command
#[derive(Args)]
pub struct PlanArgs {
    /// Print the plan as JSON
    #[clap(long)]
    pub json: bool,
}

/// Implementation of the plan command
pub fn execute_plan(
    args: &PlanArgs,
    config: LaunchConfig,
    project_dir: PathBuf,
) -> anyhow::Result<i32> {
    let plan = Launcher::new(config, project_dir)?.plan();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render(&plan));
    }

    Ok(0)
}

fn render(plan: &LaunchPlan) -> String {
    let mut out = String::new();

    out.push_str(&format!("Project:     {}\n", plan.project_dir.display()));
    out.push_str(&format!("Environment: {}\n", plan.environment_dir.display()));

    if plan.provision_needed {
        out.push_str("Setup:\n");
        for (index, step) in plan.setup_steps.iter().enumerate() {
            out.push_str(&format!("  {}. [{}] {}\n", index + 1, step.name, step.command));
        }
    } else {
        out.push_str("Setup:       skipped (environment present)\n");
    }

    out.push_str("Server environment:\n");
    for (key, value) in &plan.server.env {
        out.push_str(&format!("  {}={}\n", key, value));
    }
    out.push_str(&format!("Server:      {}\n", plan.server));

    out
}
