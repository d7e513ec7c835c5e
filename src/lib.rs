// src/lib.rs

//! Rollout Bundle Deployment Engine
//!
//! Interprets declarative XML deployment recipes and ships software
//! bundles onto managed hosts under a phased lifecycle, with a complete
//! ordered audit trail of everything that happened.
//!
//! # Architecture
//!
//! - Recipe-first: an immutable `RecipeDocument` is parsed up front, then
//!   validated, then executed - no hidden shared state between stages
//! - Fail-fast execution: a deployment never partially applies silently
//! - Phased workflows: deploy/redeploy/undeploy drive the engine once per
//!   phase against a single mutable `DeploymentSession`
//! - Boundaries as traits: content placement (`ContentDeployer`) and
//!   handover to external resource managers (`HandoverTarget`) are
//!   pluggable collaborators

pub mod audit;
pub mod cli;
pub mod commands;
pub mod deployer;
pub mod engine;
mod error;
pub mod handover;
pub mod phase;
pub mod recipe;

pub use audit::{AuditEvent, AuditKind, AuditLevel, AuditListener, LogAuditor, TracingAuditor};
pub use deployer::{ContentDeployer, DeploymentData, FsDeployer};
pub use engine::{EngineEnvironment, EngineResult, EngineState, ExecutionEngine, ExecutionMode};
pub use error::{Error, Result, ValidationErrorKind};
pub use handover::{HandoverInfo, HandoverTarget};
pub use phase::{DeployDifferences, DeploymentPhase, DeploymentSession, Workflow};
pub use recipe::{
    extract, parse, parse_recipe_file, validate, BundleDescriptor, BundleHandle, RecipeDocument,
};
