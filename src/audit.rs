// src/audit.rs

//! Audit trail for recipe execution
//!
//! The execution engine pushes `AuditEvent`s to every attached
//! `AuditListener` as it works: run/block/directive start and finish,
//! diagnostic messages, and failures. Events are produced in strict
//! chronological order and never mutated after creation.
//!
//! Two listeners ship with the crate:
//! - `LogAuditor` renders events to an append-only text sink with a
//!   severity threshold, flushing after every event so a crash never
//!   loses rendered lines. The sink sits behind a mutex so engines
//!   running in parallel can share one destination without interleaving
//!   within a line.
//! - `TracingAuditor` forwards events to the `tracing` subscriber.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Message severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditLevel {
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditLevel::Error => "ERROR",
            AuditLevel::Warn => "WARN",
            AuditLevel::Info => "INFO",
            AuditLevel::Verbose => "VERBOSE",
            AuditLevel::Debug => "DEBUG",
        };
        f.write_str(s)
    }
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    RunStarted,
    RunFinished,
    BlockStarted,
    BlockFinished,
    DirectiveStarted,
    DirectiveFinished,
    Message(AuditLevel),
    Failure,
}

/// One immutable entry of the audit trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    /// Enclosing block; empty string for the implicit block
    pub block: Option<String>,
    pub directive: Option<String>,
    pub message: Option<String>,
    /// Full error chain for failures
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind) -> Self {
        AuditEvent {
            timestamp: Utc::now(),
            kind,
            block: None,
            directive: None,
            message: None,
            error: None,
        }
    }

    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.block = Some(block.into());
        self
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Push-based subscriber for engine events
///
/// Implementations must be safe to share across engines running on
/// different threads.
pub trait AuditListener: Send + Sync {
    fn event(&self, event: &AuditEvent);
}

/// Renders the audit trail to an append-only text destination
pub struct LogAuditor<W: Write + Send> {
    sink: Mutex<W>,
    threshold: AuditLevel,
}

impl<W: Write + Send> LogAuditor<W> {
    /// Messages above `threshold` are dropped; start/finish/failure
    /// events are always rendered
    pub fn new(sink: W, threshold: AuditLevel) -> Self {
        LogAuditor {
            sink: Mutex::new(sink),
            threshold,
        }
    }

    /// Recover the sink, e.g. to inspect rendered output in tests
    pub fn into_inner(self) -> W {
        self.sink.into_inner().unwrap()
    }

    fn prefix(event: &AuditEvent) -> String {
        let block = event.block.as_deref().unwrap_or_default();
        match &event.directive {
            Some(directive) => format!("[{block}][{directive}]"),
            None => format!("[{block}]"),
        }
    }

    fn render(&self, event: &AuditEvent, out: &mut W) -> std::io::Result<()> {
        let stamp = event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        match event.kind {
            AuditKind::RunStarted => {
                let recipe = event.message.as_deref().unwrap_or_default();
                writeln!(out, "========================================")?;
                writeln!(out, "{recipe} - {stamp}")?;
                writeln!(out, "========================================")?;
            }
            AuditKind::RunFinished => {
                writeln!(out, "{stamp} run finished")?;
            }
            AuditKind::BlockStarted => {
                writeln!(out, "{stamp} {} block started", Self::prefix(event))?;
            }
            AuditKind::BlockFinished => {
                writeln!(out, "{stamp} {} block finished", Self::prefix(event))?;
            }
            AuditKind::DirectiveStarted => {
                writeln!(out, "{stamp} {} started", Self::prefix(event))?;
            }
            AuditKind::DirectiveFinished => {
                writeln!(out, "{stamp} {} finished", Self::prefix(event))?;
            }
            AuditKind::Message(level) => {
                let text = event.message.as_deref().unwrap_or_default();
                writeln!(out, "{stamp} {} {level}: {text}", Self::prefix(event))?;
            }
            AuditKind::Failure => {
                let text = event.message.as_deref().unwrap_or_default();
                writeln!(out, "{stamp} {} FAILURE: {text}", Self::prefix(event))?;
                if let Some(chain) = &event.error {
                    for line in chain.lines() {
                        writeln!(out, "    {line}")?;
                    }
                }
            }
        }
        out.flush()
    }
}

impl<W: Write + Send> AuditListener for LogAuditor<W> {
    fn event(&self, event: &AuditEvent) {
        if let AuditKind::Message(level) = event.kind
            && level > self.threshold
        {
            return;
        }
        let mut out = self.sink.lock().unwrap();
        // a sink write failure must not abort the deployment itself
        if let Err(e) = self.render(event, &mut out) {
            error!("audit sink write failed: {}", e);
        }
    }
}

/// Forwards audit events to the tracing subscriber
#[derive(Debug, Default)]
pub struct TracingAuditor;

impl AuditListener for TracingAuditor {
    fn event(&self, event: &AuditEvent) {
        let block = event.block.as_deref().unwrap_or_default();
        let directive = event.directive.as_deref().unwrap_or_default();
        let message = event.message.as_deref().unwrap_or_default();
        match event.kind {
            AuditKind::Failure => {
                error!(block, directive, error = event.error.as_deref(), "{}", message);
            }
            AuditKind::Message(AuditLevel::Error) => error!(block, directive, "{}", message),
            AuditKind::Message(AuditLevel::Warn) => warn!(block, directive, "{}", message),
            AuditKind::Message(AuditLevel::Info) => info!(block, directive, "{}", message),
            AuditKind::Message(_) => debug!(block, directive, "{}", message),
            _ => debug!(block, directive, kind = ?event.kind, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(events: &[AuditEvent], threshold: AuditLevel) -> String {
        let auditor = LogAuditor::new(Vec::new(), threshold);
        for event in events {
            auditor.event(event);
        }
        String::from_utf8(auditor.into_inner()).unwrap()
    }

    #[test]
    fn test_run_header_carries_recipe_and_timestamp() {
        let out = rendered(
            &[AuditEvent::new(AuditKind::RunStarted).with_message("my-bundle")],
            AuditLevel::Info,
        );
        assert!(out.starts_with("========================================\n"));
        assert!(out.contains("my-bundle - "));
    }

    #[test]
    fn test_severity_filtering_drops_only_messages() {
        let events = [
            AuditEvent::new(AuditKind::DirectiveStarted)
                .with_block("")
                .with_directive("echo"),
            AuditEvent::new(AuditKind::Message(AuditLevel::Verbose))
                .with_block("")
                .with_directive("echo")
                .with_message("noisy detail"),
            AuditEvent::new(AuditKind::DirectiveFinished)
                .with_block("")
                .with_directive("echo"),
        ];
        let out = rendered(&events, AuditLevel::Info);
        assert!(!out.contains("noisy detail"));
        assert!(out.contains("[][echo] started"));
        assert!(out.contains("[][echo] finished"));

        let verbose = rendered(&events, AuditLevel::Verbose);
        assert!(verbose.contains("noisy detail"));
    }

    #[test]
    fn test_failure_always_rendered_with_chain() {
        let out = rendered(
            &[AuditEvent::new(AuditKind::Failure)
                .with_block("main")
                .with_directive("x:bundle")
                .with_message("deployer failed")
                .with_error("copy failed\ncaused by: permission denied")],
            AuditLevel::Error,
        );
        assert!(out.contains("[main][x:bundle] FAILURE: deployer failed"));
        assert!(out.contains("    copy failed"));
        assert!(out.contains("    caused by: permission denied"));
    }

    #[test]
    fn test_empty_block_marker() {
        let out = rendered(
            &[AuditEvent::new(AuditKind::BlockStarted).with_block("")],
            AuditLevel::Info,
        );
        assert!(out.contains("[] block started"));
    }

    #[test]
    fn test_level_ordering() {
        assert!(AuditLevel::Error < AuditLevel::Warn);
        assert!(AuditLevel::Info < AuditLevel::Debug);
    }

    #[test]
    fn test_shared_sink_is_serialized() {
        use std::sync::Arc;

        let auditor = Arc::new(LogAuditor::new(Vec::new(), AuditLevel::Info));
        let mut handles = Vec::new();
        for i in 0..4 {
            let auditor = Arc::clone(&auditor);
            handles.push(std::thread::spawn(move || {
                for j in 0..25 {
                    auditor.event(
                        &AuditEvent::new(AuditKind::Message(AuditLevel::Info))
                            .with_block("")
                            .with_message(format!("engine-{i} line-{j}")),
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let out = String::from_utf8(
            Arc::try_unwrap(auditor)
                .unwrap_or_else(|_| panic!("auditor still shared"))
                .into_inner(),
        )
        .unwrap();
        assert_eq!(out.lines().count(), 100);
        for line in out.lines() {
            assert!(line.contains("engine-"));
        }
    }
}
