// src/handover.rs

//! Handover of content placement to an external collaborator
//!
//! A deployment entry marked for handover is not written to disk by this
//! crate. Instead the engine packages the content reference into a
//! `HandoverInfo` and asks the registered `HandoverTarget` to place it.
//! The indirection keeps the interpreter core decoupled from any
//! specific file-placement mechanism (application servers, resource
//! agents, and so on live behind the trait).

use std::path::PathBuf;

/// Everything a handover target needs to place one piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverInfo {
    /// Base name of the content
    pub filename: String,
    /// Local path the content can be read from
    pub content: PathBuf,
    /// Target-defined action, e.g. "deployment"
    pub action: Option<String>,
    /// Target-defined parameters in declaration order
    pub params: Vec<(String, String)>,
    /// True when the enclosing run is reverting a previous deployment
    pub revert: bool,
}

/// External component that physically places handed-over content
///
/// Returning `false` reports a placement failure; the calling directive
/// treats it as a directive-level failure unless the entry opted out
/// with `failonerror="false"`.
pub trait HandoverTarget: Send + Sync {
    fn handover_content(&self, info: &HandoverInfo) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        calls: AtomicUsize,
        accept: bool,
    }

    impl HandoverTarget for Recorder {
        fn handover_content(&self, _info: &HandoverInfo) -> bool {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.accept
        }
    }

    #[test]
    fn test_handover_target_outcome() {
        let target = Recorder {
            calls: AtomicUsize::new(0),
            accept: false,
        };
        let info = HandoverInfo {
            filename: "app.war".to_string(),
            content: PathBuf::from("/tmp/app.war"),
            action: Some("deployment".to_string()),
            params: vec![("runtimeName".to_string(), "app.war".to_string())],
            revert: false,
        };
        assert!(!target.handover_content(&info));
        assert_eq!(target.calls.load(Ordering::Relaxed), 1);
    }
}
