// src/cli.rs

//! CLI definitions for the rollout deployment engine
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rollout")]
#[command(author = "Rollout Project")]
#[command(version)]
#[command(about = "Recipe-driven bundle deployment with phased lifecycles and audit trails", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a recipe and check its structural invariants
    Validate {
        /// Path to the recipe file
        recipe: String,
    },

    /// Extract bundle metadata without executing anything
    Inspect {
        /// Path to the recipe file
        recipe: String,

        /// Also walk the recipe in parse-only mode and print the audit trail
        #[arg(long)]
        audit: bool,
    },

    /// Deploy a bundle (STOP, INSTALL, START)
    Deploy {
        /// Path to the recipe file
        recipe: String,

        /// Deployment destination directory
        #[arg(short, long)]
        dest_dir: String,

        /// Directory holding the bundle's content files
        #[arg(short, long, default_value = ".")]
        bundle_dir: String,

        /// Advisory deployment identifier
        #[arg(long, default_value_t = 0)]
        deployment_id: u32,

        /// Deployment input property, repeatable (name=value)
        #[arg(short, long = "property")]
        properties: Vec<String>,

        /// Properties file with deployment inputs (values are escaped on load)
        #[arg(long)]
        properties_file: Option<String>,

        /// Show what would change without touching the destination
        #[arg(long)]
        dry_run: bool,

        /// Append the audit trail to this file instead of stdout
        #[arg(long)]
        log_file: Option<String>,
    },

    /// Redeploy a bundle over an existing deployment (STOP, UPGRADE, START)
    Redeploy {
        /// Path to the recipe file
        recipe: String,

        #[arg(short, long)]
        dest_dir: String,

        #[arg(short, long, default_value = ".")]
        bundle_dir: String,

        #[arg(long, default_value_t = 0)]
        deployment_id: u32,

        #[arg(short, long = "property")]
        properties: Vec<String>,

        #[arg(long)]
        properties_file: Option<String>,

        /// Wipe destination content before writing new files
        #[arg(long)]
        clean: bool,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        log_file: Option<String>,
    },

    /// Undeploy a bundle (STOP, UNINSTALL)
    Undeploy {
        /// Path to the recipe file
        recipe: String,

        #[arg(short, long)]
        dest_dir: String,

        #[arg(short, long, default_value = ".")]
        bundle_dir: String,

        #[arg(long, default_value_t = 0)]
        deployment_id: u32,

        #[arg(long)]
        log_file: Option<String>,
    },
}
