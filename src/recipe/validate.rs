// src/recipe/validate.rs

//! Structural validation of parsed recipes
//!
//! Runs after parsing and before anything may execute. This is a pure
//! read-only pass: the bundle declaration is resolved into its typed
//! handle (see `recipe::descriptor`) but never executed, so validating a
//! recipe has no side effects whatsoever.

use crate::error::{Error, Result, ValidationErrorKind};
use crate::recipe::descriptor::{resolve, BundleHandle};
use crate::recipe::document::{Directive, RecipeDocument};

/// Local name of the bundle declaration; must appear namespaced
const BUNDLE_LOCAL_NAME: &str = "bundle";

fn is_bundle_declaration(d: &Directive) -> bool {
    d.is_namespaced() && d.local_name() == BUNDLE_LOCAL_NAME
}

/// Validate the document's structural invariants
///
/// - exactly one namespaced `bundle` directive exists,
/// - it is a direct child of the implicit block,
/// - its resolution yields at least one deployment unit with content.
///
/// Returns the resolved handle so callers never resolve twice.
pub fn validate(doc: &RecipeDocument) -> Result<BundleHandle> {
    let mut found: Vec<(&str, &Directive)> = Vec::new();
    for (block, directive) in doc.directives_with_blocks() {
        if is_bundle_declaration(directive) {
            found.push((block, directive));
        }
    }

    let (block, bundle) = match found.as_slice() {
        [] => {
            return Err(Error::Validation(ValidationErrorKind::MissingBundleDirective));
        }
        [single] => *single,
        _ => {
            return Err(Error::Validation(ValidationErrorKind::DuplicateBundleDirective));
        }
    };

    let top_level = doc
        .implicit_block()
        .directives
        .iter()
        .any(|d| std::ptr::eq(d, bundle));
    if !top_level {
        return Err(Error::Validation(
            ValidationErrorKind::BundleDirectiveInsideNamedBlock {
                block: block.to_string(),
            },
        ));
    }

    let handle = resolve(bundle);
    if !handle.units.iter().any(|u| u.has_content()) {
        return Err(Error::Validation(ValidationErrorKind::EmptyDeploymentUnit));
    }

    Ok(handle)
}
