// src/error.rs

//! Error taxonomy for recipe parsing, validation, and execution

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Structural validation failures, one variant per invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    /// No bundle declaration anywhere in the document
    #[error("recipe contains no bundle declaration")]
    MissingBundleDirective,

    /// Two or more bundle declarations
    #[error("recipe contains more than one bundle declaration")]
    DuplicateBundleDirective,

    /// The declaration is nested inside a named block
    #[error("bundle declaration must be declared outside any named block, found in [{block}]")]
    BundleDirectiveInsideNamedBlock { block: String },

    /// The declaration resolves to no deployable content
    #[error("bundle declaration contains no deployment unit with at least one file or archive")]
    EmptyDeploymentUnit,
}

/// Errors surfaced by the recipe engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed recipe document; fatal before validation runs
    #[error("recipe parse error at byte {offset}: {message}")]
    Parse { offset: u64, message: String },

    /// Structural rule violation; fatal before execution
    #[error("recipe validation failed: {0}")]
    Validation(ValidationErrorKind),

    /// A directive raised a failure while the engine was running
    #[error("directive [{directive}] in block [{block}] failed: {message}")]
    DirectiveFailure {
        block: String,
        directive: String,
        message: String,
    },

    /// The handover target refused the content
    #[error("handover of [{filename}] was rejected by the handover target")]
    HandoverRejected { filename: String },

    /// Engine driven through an invalid state transition
    #[error("engine is in state {state}, expected {expected}")]
    InvalidEngineState {
        state: &'static str,
        expected: &'static str,
    },
}

impl Error {
    /// Shorthand used by the parser
    pub(crate) fn parse(offset: u64, message: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            message: message.into(),
        }
    }
}
