// src/commands.rs

//! Command implementations for the rollout CLI
//!
//! Each function here backs one subcommand defined in `cli.rs`. The
//! deployment commands share `run_workflow`, which drives the execution
//! engine once per workflow phase against a single session.

use crate::audit::{AuditLevel, AuditListener, LogAuditor, TracingAuditor};
use crate::engine::properties::load_properties_file;
use crate::engine::{EngineEnvironment, ExecutionEngine, ExecutionMode};
use crate::phase::{DeploymentSession, Workflow};
use crate::recipe::{extract, parse_recipe_file, validate};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Parse and validate a recipe, reporting the bundle it declares
pub fn validate_recipe(recipe: &str) -> Result<()> {
    let doc = parse_recipe_file(Path::new(recipe))
        .with_context(|| format!("failed to parse recipe {recipe}"))?;
    let handle = validate(&doc).context("recipe failed validation")?;
    let descriptor = extract(&handle);

    println!(
        "Recipe [{}] is valid: bundle {} version {}",
        doc.name, descriptor.name, descriptor.version
    );
    println!("Expected content files:");
    for name in descriptor.manifest() {
        println!("    {name}");
    }
    Ok(())
}

/// Print bundle metadata as JSON; optionally walk the recipe parse-only
pub fn inspect_recipe(recipe: &str, audit: bool) -> Result<()> {
    let doc = parse_recipe_file(Path::new(recipe))
        .with_context(|| format!("failed to parse recipe {recipe}"))?;
    let handle = validate(&doc).context("recipe failed validation")?;
    let descriptor = extract(&handle);

    println!("{}", serde_json::to_string_pretty(&descriptor)?);

    if audit {
        let mut session = DeploymentSession::new(0, PathBuf::new());
        let mut engine = ExecutionEngine::new(&doc);
        engine.add_listener(Arc::new(LogAuditor::new(std::io::stdout(), AuditLevel::Info)));
        engine.configure(EngineEnvironment::new(PathBuf::new(), 0))?;
        engine.run(ExecutionMode::ParseOnly, &mut session)?;
    }
    Ok(())
}

/// Options shared by the deployment commands
pub struct DeployOptions {
    pub recipe: String,
    pub dest_dir: String,
    pub bundle_dir: String,
    pub deployment_id: u32,
    pub properties: Vec<String>,
    pub properties_file: Option<String>,
    pub clean: bool,
    pub dry_run: bool,
    pub log_file: Option<String>,
}

/// Drive every phase of the workflow against one session
pub fn run_workflow(workflow: Workflow, options: DeployOptions) -> Result<()> {
    let recipe_path = Path::new(&options.recipe);
    let doc = parse_recipe_file(recipe_path)
        .with_context(|| format!("failed to parse recipe {}", options.recipe))?;
    let handle = validate(&doc).context("recipe failed validation")?;
    let descriptor = extract(&handle);
    info!(
        "deploying bundle {} version {} via {}",
        descriptor.name, descriptor.version, workflow
    );

    let properties = collect_properties(&options)?;
    let dest_dir = PathBuf::from(&options.dest_dir);
    let auditor = make_auditor(options.log_file.as_deref())?;

    let mut session = DeploymentSession::new(options.deployment_id, dest_dir.clone())
        .with_dry_run(options.dry_run);

    for phase in workflow.phases() {
        session.enter_phase(*phase);

        let mut engine = ExecutionEngine::new(&doc);
        engine.add_listener(auditor.clone());
        engine.add_listener(Arc::new(TracingAuditor));

        let mut environment = EngineEnvironment::new(dest_dir.clone(), options.deployment_id)
            .with_bundle_files_dir(PathBuf::from(&options.bundle_dir))
            .with_properties(properties.clone());
        environment.deployment_name = doc.name.clone();
        environment.clean = options.clean;
        engine.configure(environment)?;

        let result = engine.run(ExecutionMode::Full, &mut session)?;
        if let Some(error) = result.error {
            print!("{}", session.differences);
            bail!("phase {phase} failed: {error}");
        }
    }

    print!("{}", session.differences);
    if options.dry_run {
        println!("Dry run: no changes were made.");
    }
    Ok(())
}

fn collect_properties(options: &DeployOptions) -> Result<BTreeMap<String, String>> {
    let mut properties = match &options.properties_file {
        Some(file) => load_properties_file(Path::new(file))
            .with_context(|| format!("failed to read properties file {file}"))?,
        None => BTreeMap::new(),
    };
    for pair in &options.properties {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid property [{pair}], expected name=value");
        };
        properties.insert(key.to_string(), value.to_string());
    }
    Ok(properties)
}

fn make_auditor(log_file: Option<&str>) -> Result<Arc<dyn AuditListener>> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;
            Ok(Arc::new(LogAuditor::new(file, AuditLevel::Info)))
        }
        None => Ok(Arc::new(LogAuditor::new(std::io::stdout(), AuditLevel::Info))),
    }
}
