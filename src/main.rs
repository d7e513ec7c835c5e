// src/main.rs

use anyhow::Result;
use clap::Parser;
use rollout::cli::{Cli, Commands};
use rollout::commands::{self, DeployOptions};
use rollout::phase::Workflow;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Validate { recipe }) => commands::validate_recipe(&recipe),
        Some(Commands::Inspect { recipe, audit }) => commands::inspect_recipe(&recipe, audit),
        Some(Commands::Deploy {
            recipe,
            dest_dir,
            bundle_dir,
            deployment_id,
            properties,
            properties_file,
            dry_run,
            log_file,
        }) => commands::run_workflow(
            Workflow::Deploy,
            DeployOptions {
                recipe,
                dest_dir,
                bundle_dir,
                deployment_id,
                properties,
                properties_file,
                clean: false,
                dry_run,
                log_file,
            },
        ),
        Some(Commands::Redeploy {
            recipe,
            dest_dir,
            bundle_dir,
            deployment_id,
            properties,
            properties_file,
            clean,
            dry_run,
            log_file,
        }) => commands::run_workflow(
            Workflow::Redeploy,
            DeployOptions {
                recipe,
                dest_dir,
                bundle_dir,
                deployment_id,
                properties,
                properties_file,
                clean,
                dry_run,
                log_file,
            },
        ),
        Some(Commands::Undeploy {
            recipe,
            dest_dir,
            bundle_dir,
            deployment_id,
            log_file,
        }) => commands::run_workflow(
            Workflow::Undeploy,
            DeployOptions {
                recipe,
                dest_dir,
                bundle_dir,
                deployment_id,
                properties: Vec::new(),
                properties_file: None,
                clean: false,
                dry_run: false,
                log_file,
            },
        ),
        None => {
            // No command provided, show help
            println!("Rollout Bundle Deployment Engine v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'rollout --help' for usage information");
            Ok(())
        }
    }
}
