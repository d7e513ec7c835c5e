// src/recipe/mod.rs

//! Recipe parsing, validation, and metadata extraction
//!
//! A recipe is the declarative deployment script a bundle provider authors
//! in the host build-automation XML grammar. This module owns everything
//! that happens before execution:
//!
//! - **document**: the parsed, immutable in-memory tree of blocks and
//!   directives
//! - **parser**: XML bytes -> `RecipeDocument`, order-preserving, with
//!   unknown directives kept opaque
//! - **validate**: the structural invariants a bundle recipe must satisfy
//!   before execution is permitted
//! - **descriptor**: side-effect-free resolution of the bundle declaration
//!   into typed metadata (name, version, configuration schema, deployment
//!   unit manifests)
//!
//! Execution lives in the `engine` module and borrows the document
//! produced here.

pub mod descriptor;
pub mod document;
pub mod parser;
pub mod validate;

pub use descriptor::{
    extract, resolve, ArchiveEntry, BundleDescriptor, BundleHandle, ComplianceMode,
    DeploymentUnitDecl, FileEntry, HandoverDecl, PropertyDef, PropertyType, SystemServiceDecl,
};
pub use document::{Block, Directive, RecipeDocument, IMPLICIT_BLOCK};
pub use parser::{parse, parse_recipe_file};
pub use validate::validate;
