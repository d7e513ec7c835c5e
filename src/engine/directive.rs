// src/engine/directive.rs

//! Directive resolution for execution
//!
//! The engine understands a closed set of directive kinds; everything
//! else stays `Opaque`. Resolution is a pure match over names - no
//! registry, no dynamic lookup - so resolving is cheap, idempotent, and
//! safe to do while a recipe is only being inspected.

use crate::audit::AuditLevel;
use crate::recipe::document::Directive;

/// The directive kinds the engine can evaluate
#[derive(Debug)]
pub enum DirectiveKind<'a> {
    /// Bind a property into the session
    Property { name: String, value: String },
    /// Emit an audit message at a severity level
    Echo { message: String, level: AuditLevel },
    /// The namespaced bundle declaration; dispatched by phase
    Bundle(&'a Directive),
    /// Recognized by name only; executing it is a failure
    Opaque(&'a Directive),
}

/// Resolve a directive to its executable kind
pub fn resolve_directive(directive: &Directive) -> DirectiveKind<'_> {
    if directive.is_namespaced() && directive.local_name() == "bundle" {
        return DirectiveKind::Bundle(directive);
    }
    match directive.name.as_str() {
        "property" => match (directive.attr("name"), directive.attr("value")) {
            (Some(name), Some(value)) => DirectiveKind::Property {
                name: name.to_string(),
                value: value.to_string(),
            },
            _ => DirectiveKind::Opaque(directive),
        },
        "echo" => DirectiveKind::Echo {
            message: directive.attr("message").unwrap_or_default().to_string(),
            level: echo_level(directive.attr("level")),
        },
        _ => DirectiveKind::Opaque(directive),
    }
}

/// `echo` defaults to warning severity in the host language
fn echo_level(level: Option<&str>) -> AuditLevel {
    match level {
        Some("error") => AuditLevel::Error,
        Some("info") => AuditLevel::Info,
        Some("verbose") => AuditLevel::Verbose,
        Some("debug") => AuditLevel::Debug,
        _ => AuditLevel::Warn,
    }
}
