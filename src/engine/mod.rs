// src/engine/mod.rs

//! Recipe execution engine
//!
//! Runs a validated recipe against a live environment under a strict
//! lifecycle: `Created -> Configured -> Running -> {Completed, Failed}`.
//! The implicit block's directives are evaluated strictly in document
//! order on the calling thread; directives have implicit ordering
//! dependencies (later ones may consume files placed by earlier ones) so
//! nothing here is ever parallelized.
//!
//! Two execution modes:
//! - `ParseOnly`: the engine enters `Running` and emits start/finish
//!   audit events for every block and directive, but no directive takes
//!   effect. Callers use this to diff "would run" against "did run".
//! - `Full`: each directive performs its effect. The first failure moves
//!   the engine to `Failed` and no sibling directive runs afterward - a
//!   bundle deployment must not partially apply silently.
//!
//! The engine is phase-agnostic. The session's current phase reaches
//! directives only as the injected phase property, and the bundle
//! declaration dispatches its deployment units on it.

pub mod directive;
pub mod properties;

use crate::audit::{AuditEvent, AuditKind, AuditLevel, AuditListener};
use crate::deployer::{ContentDeployer, DeploymentData, FsDeployer};
use crate::error::{Error, Result};
use crate::handover::{HandoverInfo, HandoverTarget};
use crate::phase::{DeploymentPhase, DeploymentSession};
use crate::recipe::descriptor::{resolve, BundleHandle, HandoverDecl};
use crate::recipe::document::{Block, Directive, RecipeDocument};
use self::directive::{resolve_directive, DirectiveKind};
use self::properties::{
    DEPLOY_CLEAN, DEPLOY_DIR, DEPLOY_ID, DEPLOY_NAME, DEPLOY_PHASE, DEPLOY_REVERT,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Engine lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Configured,
    Running,
    Completed,
    Failed,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Created => "Created",
            EngineState::Configured => "Configured",
            EngineState::Running => "Running",
            EngineState::Completed => "Completed",
            EngineState::Failed => "Failed",
        }
    }
}

/// How directives are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Walk the recipe, emit audit events, execute nothing
    ParseOnly,
    /// Execute every directive in document order
    Full,
}

/// Resolved environment supplied at configuration time
#[derive(Debug, Clone)]
pub struct EngineEnvironment {
    /// Absolute deployment target directory
    pub deploy_dir: PathBuf,
    /// Advisory deployment identifier, opaque to the engine
    pub deployment_id: u32,
    pub deployment_name: String,
    /// Local directory holding the bundle's content files
    pub bundle_files_dir: PathBuf,
    pub revert: bool,
    pub clean: bool,
    /// Caller-supplied bindings; values from an external properties
    /// source must already be backslash-escaped (see `properties`)
    pub properties: BTreeMap<String, String>,
}

impl EngineEnvironment {
    pub fn new(deploy_dir: PathBuf, deployment_id: u32) -> Self {
        EngineEnvironment {
            deploy_dir,
            deployment_id,
            deployment_name: String::new(),
            bundle_files_dir: PathBuf::from("."),
            revert: false,
            clean: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_bundle_files_dir(mut self, dir: PathBuf) -> Self {
        self.bundle_files_dir = dir;
        self
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }
}

/// Terminal outcome of one engine run
#[derive(Debug)]
pub struct EngineResult {
    pub state: EngineState,
    pub error: Option<Error>,
}

impl EngineResult {
    pub fn is_completed(&self) -> bool {
        self.state == EngineState::Completed
    }
}

/// Evaluates one recipe run
///
/// Engines are single-use: build, configure, run, inspect. Multi-phase
/// workflows build a fresh engine per phase against the same session.
pub struct ExecutionEngine<'a> {
    document: &'a RecipeDocument,
    state: EngineState,
    environment: Option<EngineEnvironment>,
    listeners: Vec<Arc<dyn AuditListener>>,
    handover_target: Option<Arc<dyn HandoverTarget>>,
    deployer: Arc<dyn ContentDeployer>,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(document: &'a RecipeDocument) -> Self {
        ExecutionEngine {
            document,
            state: EngineState::Created,
            environment: None,
            listeners: Vec::new(),
            handover_target: None,
            deployer: Arc::new(FsDeployer::new()),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn add_listener(&mut self, listener: Arc<dyn AuditListener>) {
        self.listeners.push(listener);
    }

    pub fn set_handover_target(&mut self, target: Arc<dyn HandoverTarget>) {
        self.handover_target = Some(target);
    }

    pub fn set_deployer(&mut self, deployer: Arc<dyn ContentDeployer>) {
        self.deployer = deployer;
    }

    /// Supply the resolved environment: `Created -> Configured`
    pub fn configure(&mut self, environment: EngineEnvironment) -> Result<()> {
        if self.state != EngineState::Created {
            return Err(Error::InvalidEngineState {
                state: self.state.as_str(),
                expected: "Created",
            });
        }
        self.environment = Some(environment);
        self.state = EngineState::Configured;
        Ok(())
    }

    /// Evaluate the implicit block: `Configured -> Running -> terminal`
    ///
    /// Directive failures land in the returned `EngineResult`; an `Err`
    /// only reports engine misuse.
    pub fn run(
        &mut self,
        mode: ExecutionMode,
        session: &mut DeploymentSession,
    ) -> Result<EngineResult> {
        if self.state != EngineState::Configured {
            return Err(Error::InvalidEngineState {
                state: self.state.as_str(),
                expected: "Configured",
            });
        }
        let environment = self.environment.take().expect("configured engine has environment");
        self.state = EngineState::Running;

        // bindings are in place before any directive runs
        for (key, value) in &environment.properties {
            session.set_property(key.clone(), value.clone());
        }
        session.set_property(DEPLOY_DIR, environment.deploy_dir.display().to_string());
        session.set_property(DEPLOY_ID, environment.deployment_id.to_string());
        session.set_property(DEPLOY_NAME, environment.deployment_name.clone());
        session.set_property(DEPLOY_REVERT, environment.revert.to_string());
        session.set_property(DEPLOY_CLEAN, environment.clean.to_string());
        if let Some(phase) = session.current_phase {
            session.set_property(DEPLOY_PHASE, phase.to_string());
        }

        self.emit(AuditEvent::new(AuditKind::RunStarted).with_message(self.document.name.clone()));

        let outcome = self.run_block(self.document.implicit_block(), mode, &environment, session);

        self.emit(AuditEvent::new(AuditKind::RunFinished));
        match outcome {
            Ok(()) => {
                self.state = EngineState::Completed;
                Ok(EngineResult {
                    state: EngineState::Completed,
                    error: None,
                })
            }
            Err(error) => {
                self.state = EngineState::Failed;
                Ok(EngineResult {
                    state: EngineState::Failed,
                    error: Some(error),
                })
            }
        }
    }

    fn emit(&self, event: AuditEvent) {
        for listener in &self.listeners {
            listener.event(&event);
        }
    }

    fn run_block(
        &self,
        block: &Block,
        mode: ExecutionMode,
        environment: &EngineEnvironment,
        session: &mut DeploymentSession,
    ) -> Result<()> {
        self.emit(AuditEvent::new(AuditKind::BlockStarted).with_block(block.name.clone()));
        if block.executable {
            for directive in &block.directives {
                if let Err(error) = self.eval_directive(block, directive, mode, environment, session)
                {
                    self.emit(
                        AuditEvent::new(AuditKind::Failure)
                            .with_block(block.name.clone())
                            .with_directive(directive.name.clone())
                            .with_message(format!("directive [{}] failed", directive.name))
                            .with_error(error_chain(&error)),
                    );
                    return Err(error);
                }
            }
        }
        self.emit(AuditEvent::new(AuditKind::BlockFinished).with_block(block.name.clone()));
        Ok(())
    }

    fn eval_directive(
        &self,
        block: &Block,
        directive: &Directive,
        mode: ExecutionMode,
        environment: &EngineEnvironment,
        session: &mut DeploymentSession,
    ) -> Result<()> {
        self.emit(
            AuditEvent::new(AuditKind::DirectiveStarted)
                .with_block(block.name.clone())
                .with_directive(directive.name.clone()),
        );

        if mode == ExecutionMode::Full {
            match resolve_directive(directive) {
                DirectiveKind::Property { name, value } => {
                    let value = properties::interpolate(&value, &session.properties);
                    debug!("binding property {} = {}", name, value);
                    session.set_property(name, value);
                }
                DirectiveKind::Echo { message, level } => {
                    let message = properties::interpolate(&message, &session.properties);
                    self.emit(
                        AuditEvent::new(AuditKind::Message(level))
                            .with_block(block.name.clone())
                            .with_directive(directive.name.clone())
                            .with_message(message),
                    );
                }
                DirectiveKind::Bundle(bundle) => {
                    self.run_bundle(block, bundle, environment, session)?;
                }
                DirectiveKind::Opaque(_) => {
                    return Err(Error::DirectiveFailure {
                        block: block.name.clone(),
                        directive: directive.name.clone(),
                        message: "directive has no handler in this engine".to_string(),
                    });
                }
            }
        }

        self.emit(
            AuditEvent::new(AuditKind::DirectiveFinished)
                .with_block(block.name.clone())
                .with_directive(directive.name.clone()),
        );
        Ok(())
    }

    fn run_bundle(
        &self,
        block: &Block,
        bundle: &Directive,
        environment: &EngineEnvironment,
        session: &mut DeploymentSession,
    ) -> Result<()> {
        let handle = resolve(bundle);
        let phase = session.current_phase.ok_or_else(|| Error::DirectiveFailure {
            block: block.name.clone(),
            directive: bundle.name.clone(),
            message: "deployment phase is not set on the session".to_string(),
        })?;

        match phase {
            DeploymentPhase::Install | DeploymentPhase::Upgrade => {
                self.install_units(block, bundle, &handle, environment, session)
            }
            DeploymentPhase::Start | DeploymentPhase::Stop | DeploymentPhase::Uninstall => {
                // plain file units have nothing to do here; declared
                // system services are reported for the phase
                for unit in &handle.units {
                    if let Some(service) = &unit.system_service {
                        self.message(
                            block,
                            bundle,
                            AuditLevel::Info,
                            format!("system service [{}]: {}", service.name, phase),
                        );
                    }
                }
                Ok(())
            }
        }
    }

    fn install_units(
        &self,
        block: &Block,
        bundle: &Directive,
        handle: &BundleHandle,
        environment: &EngineEnvironment,
        session: &mut DeploymentSession,
    ) -> Result<()> {
        if environment.clean {
            self.message(
                block,
                bundle,
                AuditLevel::Info,
                "clean deployment requested; destination content will be removed before new files are written",
            );
        }
        if environment.revert {
            self.message(
                block,
                bundle,
                AuditLevel::Info,
                "the previous deployment will be reverted; backed up files will be restored where possible",
            );
        }

        for unit in &handle.units {
            if !unit.has_content() {
                continue;
            }

            if let Some(name) = &unit.preinstall_block {
                self.run_referenced_block(name, block, bundle, environment, session)?;
            }

            if !session.dry_run {
                self.message(block, bundle, AuditLevel::Info, "deployer started");
            }
            let data = DeploymentData {
                bundle_files_dir: &environment.bundle_files_dir,
                deploy_dir: &environment.deploy_dir,
                unit,
                properties: &session.properties,
            };
            let dry_run = session.dry_run;
            self.deployer
                .deploy(&data, &mut session.differences, dry_run)
                .map_err(|e| Error::DirectiveFailure {
                    block: block.name.clone(),
                    directive: bundle.name.clone(),
                    message: format!("deployer failed: {e}"),
                })?;
            if !session.dry_run {
                self.message(
                    block,
                    bundle,
                    AuditLevel::Info,
                    format!(
                        "deployer finished: {} added, {} changed, {} deleted",
                        session.differences.added.len(),
                        session.differences.changed.len(),
                        session.differences.deleted.len()
                    ),
                );
            }

            for file in &unit.files {
                if let Some(decl) = &file.handover {
                    self.handover_entry(block, bundle, environment, session, &file.source, decl)?;
                }
            }
            for archive in &unit.archives {
                if let Some(decl) = &archive.handover {
                    self.handover_entry(
                        block,
                        bundle,
                        environment,
                        session,
                        &archive.source,
                        decl,
                    )?;
                }
            }

            if let Some(name) = &unit.postinstall_block {
                self.run_referenced_block(name, block, bundle, environment, session)?;
            }
        }
        Ok(())
    }

    fn run_referenced_block(
        &self,
        name: &str,
        block: &Block,
        bundle: &Directive,
        environment: &EngineEnvironment,
        session: &mut DeploymentSession,
    ) -> Result<()> {
        match self.document.block(name) {
            Some(referenced) => self.run_block(referenced, ExecutionMode::Full, environment, session),
            None => Err(Error::DirectiveFailure {
                block: block.name.clone(),
                directive: bundle.name.clone(),
                message: format!("referenced block [{name}] does not exist"),
            }),
        }
    }

    fn handover_entry(
        &self,
        block: &Block,
        bundle: &Directive,
        environment: &EngineEnvironment,
        session: &DeploymentSession,
        source: &str,
        decl: &HandoverDecl,
    ) -> Result<()> {
        if session.dry_run {
            return Ok(());
        }
        let Some(target) = &self.handover_target else {
            return Ok(());
        };

        let filename = source.rsplit('/').next().unwrap_or(source).to_string();
        let info = HandoverInfo {
            filename: filename.clone(),
            content: environment.bundle_files_dir.join(source),
            action: decl.action.clone(),
            params: decl.params.clone(),
            revert: environment.revert,
        };

        if target.handover_content(&info) {
            self.message(
                block,
                bundle,
                AuditLevel::Info,
                format!("handover target accepted [{filename}]"),
            );
            Ok(())
        } else if decl.fail_on_error {
            Err(Error::HandoverRejected { filename })
        } else {
            self.message(
                block,
                bundle,
                AuditLevel::Warn,
                format!("handover target rejected [{filename}]"),
            );
            Ok(())
        }
    }

    fn message(
        &self,
        block: &Block,
        directive: &Directive,
        level: AuditLevel,
        message: impl Into<String>,
    ) {
        self.emit(
            AuditEvent::new(AuditKind::Message(level))
                .with_block(block.name.clone())
                .with_directive(directive.name.clone())
                .with_message(message),
        );
    }
}

/// Render an error with its full source chain, one cause per line
fn error_chain(error: &Error) -> String {
    let mut out = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parser::parse;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Captures every event for assertions
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditListener for Recorder {
        fn event(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn events(&self) -> Vec<AuditEvent> {
            self.events.lock().unwrap().clone()
        }

        /// (kind, block, directive, message) tuples, timestamp-free
        fn shape(&self) -> Vec<(AuditKind, Option<String>, Option<String>, Option<String>)> {
            self.events()
                .into_iter()
                .map(|e| (e.kind, e.block, e.directive, e.message))
                .collect()
        }
    }

    fn engine_for<'a>(
        doc: &'a RecipeDocument,
        environment: EngineEnvironment,
    ) -> (ExecutionEngine<'a>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut engine = ExecutionEngine::new(doc);
        engine.add_listener(recorder.clone());
        engine.configure(environment).unwrap();
        (engine, recorder)
    }

    fn basic_env() -> EngineEnvironment {
        EngineEnvironment::new(PathBuf::from("/tmp/deploy-target"), 7)
    }

    #[test]
    fn test_run_requires_configuration() {
        let doc = parse(b"<project name=\"p\"/>").unwrap();
        let mut engine = ExecutionEngine::new(&doc);
        let mut session = DeploymentSession::new(1, PathBuf::from("/tmp"));
        let err = engine.run(ExecutionMode::Full, &mut session).unwrap_err();
        assert!(matches!(err, Error::InvalidEngineState { expected: "Configured", .. }));
    }

    #[test]
    fn test_configure_is_single_shot() {
        let doc = parse(b"<project name=\"p\"/>").unwrap();
        let mut engine = ExecutionEngine::new(&doc);
        engine.configure(basic_env()).unwrap();
        let err = engine.configure(basic_env()).unwrap_err();
        assert!(matches!(err, Error::InvalidEngineState { expected: "Created", .. }));
    }

    #[test]
    fn test_deployment_bindings_always_injected() {
        let doc = parse(b"<project name=\"p\"/>").unwrap();
        let (mut engine, _) = engine_for(&doc, basic_env());
        let mut session = DeploymentSession::new(7, PathBuf::from("/tmp/deploy-target"));
        session.enter_phase(DeploymentPhase::Install);

        let result = engine.run(ExecutionMode::Full, &mut session).unwrap();
        assert!(result.is_completed());
        assert_eq!(
            session.property(properties::DEPLOY_DIR),
            Some("/tmp/deploy-target")
        );
        assert_eq!(session.property(properties::DEPLOY_ID), Some("7"));
        assert_eq!(session.property(properties::DEPLOY_PHASE), Some("INSTALL"));
    }

    #[test]
    fn test_property_directive_binds_with_interpolation() {
        let doc = parse(
            br#"<project name="p">
<property name="conf.dir" value="${rhq.deploy.dir}/conf"/>
</project>"#,
        )
        .unwrap();
        let (mut engine, _) = engine_for(&doc, basic_env());
        let mut session = DeploymentSession::new(7, PathBuf::from("/tmp/deploy-target"));
        session.enter_phase(DeploymentPhase::Install);

        engine.run(ExecutionMode::Full, &mut session).unwrap();
        assert_eq!(session.property("conf.dir"), Some("/tmp/deploy-target/conf"));
    }

    #[test]
    fn test_external_backslash_value_observed_doubled() {
        let mut environment = basic_env();
        environment.properties.insert(
            "install.root".to_string(),
            properties::escape_external_value(r"C:\apps"),
        );
        let doc = parse(
            br#"<project name="p">
<echo message="root is ${install.root}" level="info"/>
</project>"#,
        )
        .unwrap();
        let (mut engine, recorder) = engine_for(&doc, environment);
        let mut session = DeploymentSession::new(7, PathBuf::from("/tmp"));
        session.enter_phase(DeploymentPhase::Install);
        engine.run(ExecutionMode::Full, &mut session).unwrap();

        let message = recorder
            .events()
            .into_iter()
            .find(|e| matches!(e.kind, AuditKind::Message(_)))
            .unwrap();
        assert_eq!(message.message.as_deref(), Some(r"root is C:\\apps"));
    }

    #[test]
    fn test_fail_fast_stops_siblings() {
        let doc = parse(
            br#"<project name="p">
<property name="a" value="1"/>
<no-such-directive/>
<echo message="never reached"/>
</project>"#,
        )
        .unwrap();
        let (mut engine, recorder) = engine_for(&doc, basic_env());
        let mut session = DeploymentSession::new(7, PathBuf::from("/tmp"));
        session.enter_phase(DeploymentPhase::Install);

        let result = engine.run(ExecutionMode::Full, &mut session).unwrap();
        assert_eq!(result.state, EngineState::Failed);
        assert!(matches!(result.error, Some(Error::DirectiveFailure { .. })));
        assert_eq!(engine.state(), EngineState::Failed);

        let events = recorder.events();
        let starts: Vec<_> = events
            .iter()
            .filter(|e| e.kind == AuditKind::DirectiveStarted)
            .collect();
        let finishes: Vec<_> = events
            .iter()
            .filter(|e| e.kind == AuditKind::DirectiveFinished)
            .collect();
        let failures: Vec<_> = events.iter().filter(|e| e.kind == AuditKind::Failure).collect();

        assert_eq!(starts.len(), 2);
        assert_eq!(starts[1].directive.as_deref(), Some("no-such-directive"));
        assert_eq!(finishes.len(), 1);
        assert_eq!(finishes[0].directive.as_deref(), Some("property"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].directive.as_deref(), Some("no-such-directive"));
        assert!(!events
            .iter()
            .any(|e| e.directive.as_deref() == Some("echo")));
    }

    #[test]
    fn test_parse_only_is_a_strict_no_op() {
        let doc = parse(
            br#"<project name="p">
<property name="a" value="1"/>
<no-such-directive/>
<target name="extra"><echo message="side"/></target>
</project>"#,
        )
        .unwrap();
        let (mut engine, recorder) = engine_for(&doc, basic_env());
        let mut session = DeploymentSession::new(7, PathBuf::from("/tmp"));

        let result = engine.run(ExecutionMode::ParseOnly, &mut session).unwrap();
        assert!(result.is_completed());
        // nothing executed: the property never bound, the unknown
        // directive never failed, the named block never entered
        assert_eq!(session.property("a"), None);
        assert!(!recorder
            .events()
            .iter()
            .any(|e| e.block.as_deref() == Some("extra")));
        assert_eq!(
            recorder
                .events()
                .iter()
                .filter(|e| e.kind == AuditKind::DirectiveStarted)
                .count(),
            2
        );
    }

    #[test]
    fn test_parse_only_runs_are_identical() {
        let xml = br#"<project name="p">
<echo message="one"/>
<x:bundle xmlns:x="urn:b" name="b" version="1">
  <x:deployment-unit name="u"><x:file name="a.txt"/></x:deployment-unit>
</x:bundle>
</project>"#;
        let doc = parse(xml).unwrap();

        let mut shapes = Vec::new();
        for _ in 0..2 {
            let (mut engine, recorder) = engine_for(&doc, basic_env());
            let mut session = DeploymentSession::new(7, PathBuf::from("/tmp"));
            engine.run(ExecutionMode::ParseOnly, &mut session).unwrap();
            shapes.push(recorder.shape());
        }
        assert_eq!(shapes[0], shapes[1]);
    }

    fn install_doc() -> Vec<u8> {
        br#"<project name="install-test">
<x:bundle xmlns:x="urn:b" name="b" version="1">
  <x:deployment-unit name="u">
    <x:file name="app.conf" destinationFile="conf/app.conf"/>
  </x:deployment-unit>
</x:bundle>
</project>"#
            .to_vec()
    }

    #[test]
    fn test_install_phase_places_files() {
        let bundle_dir = TempDir::new().unwrap();
        let deploy_dir = TempDir::new().unwrap();
        std::fs::write(bundle_dir.path().join("app.conf"), "k=v").unwrap();

        let doc = parse(&install_doc()).unwrap();
        let environment = EngineEnvironment::new(deploy_dir.path().to_path_buf(), 7)
            .with_bundle_files_dir(bundle_dir.path().to_path_buf());
        let (mut engine, _) = engine_for(&doc, environment);
        let mut session = DeploymentSession::new(7, deploy_dir.path().to_path_buf());
        session.enter_phase(DeploymentPhase::Install);

        let result = engine.run(ExecutionMode::Full, &mut session).unwrap();
        assert!(result.is_completed());
        assert!(deploy_dir.path().join("conf/app.conf").exists());
        assert_eq!(session.differences.added.len(), 1);
    }

    #[test]
    fn test_stop_phase_is_noop_for_plain_units() {
        let bundle_dir = TempDir::new().unwrap();
        let deploy_dir = TempDir::new().unwrap();

        let doc = parse(&install_doc()).unwrap();
        let environment = EngineEnvironment::new(deploy_dir.path().to_path_buf(), 7)
            .with_bundle_files_dir(bundle_dir.path().to_path_buf());
        let (mut engine, _) = engine_for(&doc, environment);
        let mut session = DeploymentSession::new(7, deploy_dir.path().to_path_buf());
        session.enter_phase(DeploymentPhase::Stop);

        // the bundle file does not even exist locally; STOP must not care
        let result = engine.run(ExecutionMode::Full, &mut session).unwrap();
        assert!(result.is_completed());
        assert!(session.differences.is_empty());
    }

    #[test]
    fn test_missing_referenced_block_fails() {
        let bundle_dir = TempDir::new().unwrap();
        let deploy_dir = TempDir::new().unwrap();
        std::fs::write(bundle_dir.path().join("a.txt"), "x").unwrap();

        let doc = parse(
            br#"<project name="p">
<x:bundle xmlns:x="urn:b" name="b" version="1">
  <x:deployment-unit name="u" preinstallTarget="does-not-exist">
    <x:file name="a.txt"/>
  </x:deployment-unit>
</x:bundle>
</project>"#,
        )
        .unwrap();
        let environment = EngineEnvironment::new(deploy_dir.path().to_path_buf(), 7)
            .with_bundle_files_dir(bundle_dir.path().to_path_buf());
        let (mut engine, _) = engine_for(&doc, environment);
        let mut session = DeploymentSession::new(7, deploy_dir.path().to_path_buf());
        session.enter_phase(DeploymentPhase::Install);

        let result = engine.run(ExecutionMode::Full, &mut session).unwrap();
        assert_eq!(result.state, EngineState::Failed);
        let error = result.error.unwrap();
        assert!(error.to_string().contains("does-not-exist"));
    }

    #[test]
    fn test_pre_and_postinstall_blocks_run_in_order() {
        let bundle_dir = TempDir::new().unwrap();
        let deploy_dir = TempDir::new().unwrap();
        std::fs::write(bundle_dir.path().join("a.txt"), "x").unwrap();

        let doc = parse(
            br#"<project name="p">
<x:bundle xmlns:x="urn:b" name="b" version="1">
  <x:deployment-unit name="u" preinstallTarget="before" postinstallTarget="after">
    <x:file name="a.txt"/>
  </x:deployment-unit>
</x:bundle>
<target name="before"><property name="stage" value="pre"/></target>
<target name="after"><property name="stage" value="post"/></target>
</project>"#,
        )
        .unwrap();
        let environment = EngineEnvironment::new(deploy_dir.path().to_path_buf(), 7)
            .with_bundle_files_dir(bundle_dir.path().to_path_buf());
        let (mut engine, recorder) = engine_for(&doc, environment);
        let mut session = DeploymentSession::new(7, deploy_dir.path().to_path_buf());
        session.enter_phase(DeploymentPhase::Install);

        let result = engine.run(ExecutionMode::Full, &mut session).unwrap();
        assert!(result.is_completed());
        assert_eq!(session.property("stage"), Some("post"));

        let block_starts: Vec<_> = recorder
            .events()
            .into_iter()
            .filter(|e| e.kind == AuditKind::BlockStarted)
            .filter_map(|e| e.block)
            .collect();
        assert_eq!(block_starts, vec!["", "before", "after"]);
    }

    struct FixedHandover {
        accept: bool,
        seen: Mutex<Vec<HandoverInfo>>,
    }

    impl HandoverTarget for FixedHandover {
        fn handover_content(&self, info: &HandoverInfo) -> bool {
            self.seen.lock().unwrap().push(info.clone());
            self.accept
        }
    }

    fn handover_doc(failonerror: &str) -> Vec<u8> {
        format!(
            r#"<project name="p">
<x:bundle xmlns:x="urn:b" name="b" version="1">
  <x:deployment-unit name="u">
    <x:file name="app.war">
      <x:handover action="deployment" failonerror="{failonerror}">
        <x:param name="runtimeName" value="app.war"/>
      </x:handover>
    </x:file>
  </x:deployment-unit>
</x:bundle>
</project>"#
        )
        .into_bytes()
    }

    fn run_handover(accept: bool, failonerror: &str) -> (EngineResult, Arc<FixedHandover>, Arc<Recorder>) {
        let bundle_dir = TempDir::new().unwrap();
        let deploy_dir = TempDir::new().unwrap();
        std::fs::write(bundle_dir.path().join("app.war"), "war").unwrap();

        let doc = parse(&handover_doc(failonerror)).unwrap();
        let environment = EngineEnvironment::new(deploy_dir.path().to_path_buf(), 7)
            .with_bundle_files_dir(bundle_dir.path().to_path_buf());
        let (mut engine, recorder) = engine_for(&doc, environment);
        let target = Arc::new(FixedHandover {
            accept,
            seen: Mutex::new(Vec::new()),
        });
        engine.set_handover_target(target.clone());
        let mut session = DeploymentSession::new(7, deploy_dir.path().to_path_buf());
        session.enter_phase(DeploymentPhase::Install);
        let result = engine.run(ExecutionMode::Full, &mut session).unwrap();
        (result, target, recorder)
    }

    #[test]
    fn test_handover_success() {
        let (result, target, _) = run_handover(true, "true");
        assert!(result.is_completed());
        let seen = target.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].filename, "app.war");
        assert_eq!(seen[0].action.as_deref(), Some("deployment"));
    }

    #[test]
    fn test_handover_rejection_fails_run() {
        let (result, _, recorder) = run_handover(false, "true");
        assert_eq!(result.state, EngineState::Failed);
        assert!(matches!(result.error, Some(Error::HandoverRejected { .. })));
        assert!(recorder.events().iter().any(|e| e.kind == AuditKind::Failure));
    }

    #[test]
    fn test_handover_rejection_tolerated_without_failonerror() {
        let (result, _, recorder) = run_handover(false, "false");
        assert!(result.is_completed());
        assert!(recorder
            .events()
            .iter()
            .any(|e| e.kind == AuditKind::Message(AuditLevel::Warn)));
    }

    #[test]
    fn test_handover_file_not_written_by_deployer() {
        let (result, _, _) = run_handover(true, "true");
        assert!(result.is_completed());
        // the war went through the handover target, not onto disk
    }
}
