// src/phase.rs

//! Deployment phases, workflows, and the per-deployment session
//!
//! A workflow is an ordered sequence of phases; the caller runs the
//! execution engine once per phase against a single `DeploymentSession`.
//! The engine itself is phase-agnostic - directives see the current phase
//! only through the injected property table. Phases are stateless value
//! objects; all mutable execution state lives in the session, which is
//! discarded when the workflow completes or is abandoned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use strum_macros::{Display, EnumString};

/// One step of a deployment workflow
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentPhase {
    Stop,
    Install,
    Start,
    Upgrade,
    Uninstall,
}

/// A canonical multi-phase deployment workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Workflow {
    Deploy,
    Redeploy,
    Undeploy,
}

impl Workflow {
    /// Phases in execution order
    ///
    /// STOP leads every workflow; on a first deploy it is a no-op but the
    /// sequence stays uniform.
    pub fn phases(self) -> &'static [DeploymentPhase] {
        match self {
            Workflow::Deploy => &[
                DeploymentPhase::Stop,
                DeploymentPhase::Install,
                DeploymentPhase::Start,
            ],
            Workflow::Redeploy => &[
                DeploymentPhase::Stop,
                DeploymentPhase::Upgrade,
                DeploymentPhase::Start,
            ],
            Workflow::Undeploy => &[DeploymentPhase::Stop, DeploymentPhase::Uninstall],
        }
    }
}

/// Record of everything a deployment changed on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployDifferences {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub changed: Vec<String>,
    pub ignored: Vec<String>,
    /// Files whose template references were realized
    pub realized: Vec<String>,
    /// destination -> backup location
    pub backed_up: Vec<(String, String)>,
    /// destination <- backup location
    pub restored: Vec<(String, String)>,
    /// path -> error message
    pub errors: Vec<(String, String)>,
    pub was_cleaned: bool,
}

impl DeployDifferences {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.deleted.is_empty()
            && self.changed.is_empty()
            && self.ignored.is_empty()
            && self.realized.is_empty()
            && self.backed_up.is_empty()
            && self.restored.is_empty()
            && self.errors.is_empty()
    }
}

impl fmt::Display for DeployDifferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const INDENT: &str = "    ";
        writeln!(f, "DEPLOYMENT DETAILS:")?;

        writeln!(f, "Added Files: {}", self.added.len())?;
        for path in &self.added {
            writeln!(f, "{INDENT}{path}")?;
        }
        writeln!(f, "Deleted Files: {}", self.deleted.len())?;
        for path in &self.deleted {
            writeln!(f, "{INDENT}{path}")?;
        }
        writeln!(f, "Changed Files: {}", self.changed.len())?;
        for path in &self.changed {
            writeln!(f, "{INDENT}{path}")?;
        }
        writeln!(f, "Backed Up Files: {}", self.backed_up.len())?;
        for (dest, backup) in &self.backed_up {
            writeln!(f, "{INDENT}{dest} -> {backup}")?;
        }
        writeln!(f, "Restored Files: {}", self.restored.len())?;
        for (dest, backup) in &self.restored {
            writeln!(f, "{INDENT}{dest} <- {backup}")?;
        }
        writeln!(f, "Ignored Files: {}", self.ignored.len())?;
        for path in &self.ignored {
            writeln!(f, "{INDENT}{path}")?;
        }
        writeln!(f, "Realized Files: {}", self.realized.len())?;
        for path in &self.realized {
            writeln!(f, "{INDENT}{path}")?;
        }
        writeln!(f, "Was Cleaned?: {}", self.was_cleaned)?;
        writeln!(f, "Errors: {}", self.errors.len())?;
        for (path, error) in &self.errors {
            writeln!(f, "{INDENT}{path} : {error}")?;
        }
        Ok(())
    }
}

/// Mutable state for one deployment workflow
///
/// Created by the caller, mutated only by the execution engine, and
/// destroyed when the workflow completes or aborts. There is no rollback
/// here: abandoning a session leaves already-executed directives applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSession {
    /// Advisory identifier assigned by the caller
    pub deployment_id: u32,
    /// Absolute deployment target directory
    pub deploy_dir: PathBuf,
    pub dry_run: bool,
    pub current_phase: Option<DeploymentPhase>,
    pub started_at: DateTime<Utc>,
    /// Property bindings visible to directives
    pub properties: BTreeMap<String, String>,
    /// Accumulates across phases of the workflow
    pub differences: DeployDifferences,
}

impl DeploymentSession {
    pub fn new(deployment_id: u32, deploy_dir: PathBuf) -> Self {
        DeploymentSession {
            deployment_id,
            deploy_dir,
            dry_run: false,
            current_phase: None,
            started_at: Utc::now(),
            properties: BTreeMap::new(),
            differences: DeployDifferences::default(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Advance to the next phase of the workflow
    pub fn enter_phase(&mut self, phase: DeploymentPhase) {
        self.current_phase = Some(phase);
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }
}
