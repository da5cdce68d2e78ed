//! # Transformation Engine
//!
//! [`PipelineEngine`] is the façade the host talks to. The host's own
//! transformer chain ends with the engine's [`ProxyTransformer`], which hands
//! every class to [`MixinTransformer::transform_class_bytes`]:
//!
//! ```text
//! host chain:  unit A ─► unit B ─► … ─► ProxyTransformer
//!                                            │ (Weak)
//!                                            ▼
//!                              PipelineEngine::transform_class_bytes
//!                                 bytes? ──yes──► apply mixin definitions
//!                                   │
//!                                   no ─────────► class generators
//! ```
//!
//! Mixin definitions may ask the [`ClassBytecodeProvider`] for other classes
//! with the delegated chain applied. If a delegated unit loads a class while
//! doing so, the host routes that load back through the proxy, the engine
//! entry opens a second re-entrance level and the driver promotes the unit
//! to the exclusion set.

use anyhow::Context;
use class_pipeline_types::Phase;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

use crate::chain::DelegationChainBuilder;
use crate::codec::ClassCodec;
use crate::config::PipelineConfig;
use crate::driver::TransformDriver;
use crate::error::{PipelineError, PipelineResult};
use crate::exclusion::{ClassExclusions, ExclusionSet};
use crate::guard::ReentranceLock;
use crate::metrics::PipelineMetrics;
use crate::mixin::{ApplyContext, ClassGenerator, ClassStatus, MixinDefinition, TransformEnvironment};
use crate::phase::{BacktraceProbe, EarlyStartProbe, InitPlan, PhaseNegotiator};
use crate::registry::{LegacyClassTransformer, TransformerHandle, TransformerRegistry};
use crate::resolver::ArtifactResolver;
use crate::service::ClassBytecodeProvider;
use crate::source::{ClassDataSource, NoopSource, ParentLoader};

/// Operations a host-facing transformation engine provides.
pub trait MixinTransformer: Send + Sync {
    type Tree;

    /// Force every not-yet-processed mixin target through the pipeline.
    fn audit(&self, env: TransformEnvironment) -> AuditReport;

    /// Replace a definition's class tree. Returns the targets it had already
    /// been applied to; they are not redefined.
    fn reload(&self, definition: &str, tree: Self::Tree) -> PipelineResult<Vec<String>>;

    fn compute_frames_for_class(
        &self,
        env: TransformEnvironment,
        name: &str,
        tree: &Self::Tree,
    ) -> bool;

    /// Bytes present: transform them. Bytes absent: try to generate the class.
    fn transform_class_bytes(
        &self,
        name: &str,
        bytes: Option<Vec<u8>>,
    ) -> PipelineResult<Option<Vec<u8>>>;

    fn transform_class(
        &self,
        env: TransformEnvironment,
        name: &str,
        bytes: Vec<u8>,
    ) -> PipelineResult<Vec<u8>>;

    /// Returns whether the tree changed.
    fn transform_class_tree(
        &self,
        env: TransformEnvironment,
        name: &str,
        tree: &mut Self::Tree,
    ) -> PipelineResult<bool>;

    /// `Ok(None)` defers to normal class resolution.
    fn generate_class(
        &self,
        env: TransformEnvironment,
        name: &str,
    ) -> PipelineResult<Option<Vec<u8>>>;

    /// `Ok(false)` defers to normal class resolution.
    fn generate_class_tree(
        &self,
        env: TransformEnvironment,
        name: &str,
        tree: &mut Self::Tree,
    ) -> PipelineResult<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFailure {
    pub class: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Targets that had not been processed before the audit.
    pub checked: Vec<String>,
    pub transformed: Vec<String>,
    pub failures: Vec<AuditFailure>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// ProxyTransformer
// =============================================================================

/// The engine's entry in the host registry.
pub struct ProxyTransformer<C: ClassCodec + 'static> {
    name: String,
    engine: Weak<PipelineEngine<C>>,
}

impl<C: ClassCodec + 'static> LegacyClassTransformer for ProxyTransformer<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform_class_bytes(&self, name: &str, bytes: Vec<u8>) -> anyhow::Result<Vec<u8>> {
        let Some(engine) = self.engine.upgrade() else {
            return Ok(bytes);
        };
        // Input bytes always come back as `Some`.
        Ok(engine
            .transform_class_bytes(name, Some(bytes))?
            .unwrap_or_default())
    }
}

// =============================================================================
// PipelineEngine
// =============================================================================

pub struct PipelineEngine<C: ClassCodec + 'static> {
    config: PipelineConfig,
    codec: C,
    registry: Arc<TransformerRegistry>,
    chain: Arc<DelegationChainBuilder>,
    lock: Arc<ReentranceLock>,
    provider: ClassBytecodeProvider,
    negotiator: PhaseNegotiator,
    current_phase: RwLock<Option<Phase>>,
    definitions: RwLock<Vec<Arc<dyn MixinDefinition<C::Tree>>>>,
    generators: RwLock<Vec<Arc<dyn ClassGenerator>>>,
    status: Mutex<HashMap<String, ClassStatus>>,
    proxy_registered: AtomicBool,
    metrics: Arc<PipelineMetrics>,
    self_ref: Weak<PipelineEngine<C>>,
}

pub struct PipelineEngineBuilder<C: ClassCodec + 'static> {
    codec: C,
    config: PipelineConfig,
    registry: Option<Arc<TransformerRegistry>>,
    primary: Arc<dyn ClassDataSource>,
    parent: Arc<dyn ParentLoader>,
    probe: Option<Box<dyn EarlyStartProbe>>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl<C: ClassCodec + 'static> PipelineEngineBuilder<C> {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Host registry the proxy is added to. A fresh one is created otherwise.
    pub fn registry(mut self, registry: Arc<TransformerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn primary(mut self, primary: Arc<dyn ClassDataSource>) -> Self {
        self.primary = primary;
        self
    }

    pub fn parent(mut self, parent: Arc<dyn ParentLoader>) -> Self {
        self.parent = parent;
        self
    }

    pub fn probe(mut self, probe: Box<dyn EarlyStartProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> anyhow::Result<Arc<PipelineEngine<C>>> {
        let config = self.config;
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(PipelineMetrics::new().context("register pipeline metrics")?),
        };
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(TransformerRegistry::new()));

        let mut exclusions = ExclusionSet::new();
        exclusions.extend(&config.extra_exclusions);
        let chain = Arc::new(
            DelegationChainBuilder::new(registry.clone(), &config.self_name, exclusions)
                .with_metrics(metrics.clone()),
        );
        let lock = Arc::new(ReentranceLock::new(config.max_reentrance_depth));
        let driver = Arc::new(
            TransformDriver::new(
                chain.clone(),
                lock.clone(),
                ClassExclusions::new(config.class_exclusions.iter().cloned()),
            )
            .with_metrics(metrics.clone()),
        );
        let resolver = ArtifactResolver::new(self.primary, self.parent).with_metrics(metrics.clone());
        let provider = ClassBytecodeProvider::new(resolver, driver).with_metrics(metrics.clone());

        let probe = self
            .probe
            .unwrap_or_else(|| Box::new(BacktraceProbe::new(&config.bootstrap_entry)));
        let negotiator = PhaseNegotiator::from_config(probe, &config);

        debug!(self_name = %config.self_name, "pipeline engine created");
        Ok(Arc::new_cyclic(|self_ref| PipelineEngine {
            config,
            codec: self.codec,
            registry,
            chain,
            lock,
            provider,
            negotiator,
            current_phase: RwLock::new(None),
            definitions: RwLock::new(Vec::new()),
            generators: RwLock::new(Vec::new()),
            status: Mutex::new(HashMap::new()),
            proxy_registered: AtomicBool::new(false),
            metrics,
            self_ref: self_ref.clone(),
        }))
    }
}

impl<C: ClassCodec + 'static> PipelineEngine<C> {
    pub fn builder(codec: C) -> PipelineEngineBuilder<C> {
        PipelineEngineBuilder {
            codec,
            config: PipelineConfig::default(),
            registry: None,
            primary: Arc::new(NoopSource),
            parent: Arc::new(NoopSource),
            probe: None,
            metrics: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TransformerRegistry> {
        &self.registry
    }

    pub fn chain(&self) -> &Arc<DelegationChainBuilder> {
        &self.chain
    }

    pub fn lock(&self) -> &ReentranceLock {
        &self.lock
    }

    pub fn provider(&self) -> &ClassBytecodeProvider {
        &self.provider
    }

    pub fn negotiator(&self) -> &PhaseNegotiator {
        &self.negotiator
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Put the engine's proxy at the end of the host registry. Idempotent.
    pub fn begin_phase(&self) {
        if self.proxy_registered.swap(true, Ordering::AcqRel) {
            return;
        }
        let proxy = ProxyTransformer {
            name: self.config.self_name.clone(),
            engine: self.self_ref.clone(),
        };
        self.registry
            .register(TransformerHandle::Legacy(Arc::new(proxy)));
        self.chain.invalidate();
        debug!(proxy = %self.config.self_name, "proxy transformer registered");
    }

    /// Negotiate the initial phase, queue any deferred bootstrap step and
    /// register the proxy.
    pub fn init(&self, queue: &mut Vec<String>) -> InitPlan {
        self.negotiator.validate_init();
        let plan = InitPlan::for_phase(self.negotiator.decide_initial_phase());
        plan.schedule_into(queue);
        self.begin_phase();
        plan
    }

    /// Move the environment forward. Going back is ignored.
    pub fn transition_to(&self, phase: Phase) {
        let current = self.environment().phase;
        if phase < current {
            warn!(%current, requested = %phase, "ignoring backwards phase transition");
            return;
        }
        *self.current_phase.write() = Some(phase);
        info!(%phase, "environment phase changed");
    }

    pub fn environment(&self) -> TransformEnvironment {
        let phase = *self.current_phase.read();
        TransformEnvironment::new(phase.unwrap_or_else(|| self.negotiator.decide_initial_phase()))
    }

    pub fn add_definition(&self, definition: Arc<dyn MixinDefinition<C::Tree>>) {
        debug!(definition = definition.name(), targets = ?definition.targets(), "mixin definition added");
        self.definitions.write().push(definition);
    }

    pub fn add_generator(&self, generator: Arc<dyn ClassGenerator>) {
        self.generators.write().push(generator);
    }

    /// Host exclusion signal.
    pub fn add_exclusion(&self, entry: &str) -> bool {
        self.chain.add_exclusion(entry)
    }

    /// Host notice that the class was defined. Ignored for classes no
    /// definition targets.
    pub fn mark_defined(&self, name: &str) {
        self.track_status(name, ClassStatus::Defined);
    }

    pub fn status(&self, name: &str) -> ClassStatus {
        self.status
            .lock()
            .get(name)
            .copied()
            .unwrap_or(ClassStatus::NotRequested)
    }

    fn set_status(&self, name: &str, status: ClassStatus) {
        let mut statuses = self.status.lock();
        let entry = statuses
            .entry(name.to_string())
            .or_insert(ClassStatus::NotRequested);
        if entry.is_processed() && status == ClassStatus::BytesResolved {
            return;
        }
        trace!(class = %name, from = ?entry, to = ?status, "class status");
        *entry = status;
    }

    /// Status is kept only for mixin targets, so the map stays bounded by the
    /// registered definitions rather than by every class the host loads.
    fn track_status(&self, name: &str, status: ClassStatus) {
        if self.is_targeted(name) {
            self.set_status(name, status);
        }
    }

    fn is_targeted(&self, name: &str) -> bool {
        self.definitions
            .read()
            .iter()
            .any(|d| d.targets().iter().any(|t| t == name))
    }

    fn definitions_for(
        &self,
        env: TransformEnvironment,
        name: &str,
    ) -> Vec<Arc<dyn MixinDefinition<C::Tree>>> {
        self.definitions
            .read()
            .iter()
            .filter(|d| env.has_reached(d.phase()) && d.targets().iter().any(|t| t == name))
            .cloned()
            .collect()
    }

    fn apply_definitions(
        &self,
        env: TransformEnvironment,
        name: &str,
        definitions: &[Arc<dyn MixinDefinition<C::Tree>>],
        tree: &mut C::Tree,
    ) -> PipelineResult<bool> {
        let ctx = ApplyContext {
            provider: &self.provider,
            environment: env,
        };
        let mut changed = false;
        for definition in definitions {
            let applied = definition.apply(&ctx, name, tree).map_err(|source| {
                PipelineError::DefinitionFailure {
                    definition: definition.name().to_string(),
                    class: name.to_string(),
                    source,
                }
            })?;
            debug!(definition = definition.name(), class = %name, changed = applied, "mixin applied");
            changed |= applied;
        }
        Ok(changed)
    }

    fn codec_error(name: &str, source: anyhow::Error) -> PipelineError {
        PipelineError::Codec {
            class: name.to_string(),
            source,
        }
    }

    fn transform_inner(
        &self,
        env: TransformEnvironment,
        name: &str,
        bytes: Vec<u8>,
    ) -> PipelineResult<Vec<u8>> {
        self.track_status(name, ClassStatus::BytesResolved);

        let definitions = self.definitions_for(env, name);
        if definitions.is_empty() {
            self.track_status(name, ClassStatus::Transformed);
            return Ok(bytes);
        }

        let mut tree = self
            .codec
            .parse(name, &bytes)
            .map_err(|e| Self::codec_error(name, e))?;
        let changed = self.apply_definitions(env, name, &definitions, &mut tree)?;
        let out = if changed {
            self.codec
                .emit(name, &tree)
                .map_err(|e| Self::codec_error(name, e))?
        } else {
            bytes
        };

        self.track_status(name, ClassStatus::Transformed);
        Ok(out)
    }

    fn generate_inner(&self, name: &str) -> PipelineResult<Option<Vec<u8>>> {
        let generators: Vec<Arc<dyn ClassGenerator>> = self.generators.read().clone();
        for generator in generators {
            match generator.generate(name) {
                Ok(Some(bytes)) => {
                    debug!(generator = generator.name(), class = %name, size = bytes.len(), "class generated");
                    self.set_status(name, ClassStatus::Transformed);
                    return Ok(Some(bytes));
                }
                Ok(None) => continue,
                Err(source) => {
                    self.set_status(name, ClassStatus::GenerationFailed);
                    return Err(PipelineError::GenerationFailure {
                        class: name.to_string(),
                        source,
                    });
                }
            }
        }
        trace!(class = %name, "no generator produced the class");
        Ok(None)
    }
}

impl<C: ClassCodec + 'static> MixinTransformer for PipelineEngine<C> {
    type Tree = C::Tree;

    fn audit(&self, env: TransformEnvironment) -> AuditReport {
        let _scope = self.lock.push();

        let targets: BTreeSet<String> = self
            .definitions
            .read()
            .iter()
            .flat_map(|d| d.targets())
            .collect();

        let mut report = AuditReport::default();
        for target in targets {
            if self.status(&target).is_processed() {
                continue;
            }
            report.checked.push(target.clone());

            let result = self
                .provider
                .class_bytes(&target, true)
                .and_then(|bytes| self.transform_inner(env, &target, bytes));
            match result {
                Ok(_) => report.transformed.push(target),
                Err(err) => {
                    if err.is_not_found() {
                        self.set_status(&target, ClassStatus::NotFound);
                    }
                    warn!(class = %target, error = %err, "audit could not process mixin target");
                    report.failures.push(AuditFailure {
                        class: target,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            checked = report.checked.len(),
            failed = report.failures.len(),
            "mixin audit complete"
        );
        report
    }

    fn reload(&self, definition: &str, tree: C::Tree) -> PipelineResult<Vec<String>> {
        let found = self
            .definitions
            .read()
            .iter()
            .find(|d| d.name() == definition)
            .cloned();
        let Some(found) = found else {
            return Err(PipelineError::UnknownDefinition {
                name: definition.to_string(),
            });
        };

        found
            .reload(tree)
            .map_err(|source| PipelineError::DefinitionFailure {
                definition: definition.to_string(),
                class: definition.to_string(),
                source,
            })?;

        let targets: BTreeSet<String> = found
            .targets()
            .into_iter()
            .filter(|t| self.status(t).is_processed())
            .collect();
        info!(definition = %definition, affected = targets.len(), "mixin definition reloaded");
        Ok(targets.into_iter().collect())
    }

    fn compute_frames_for_class(
        &self,
        _env: TransformEnvironment,
        _name: &str,
        _tree: &C::Tree,
    ) -> bool {
        false
    }

    fn transform_class_bytes(
        &self,
        name: &str,
        bytes: Option<Vec<u8>>,
    ) -> PipelineResult<Option<Vec<u8>>> {
        let _scope = self.lock.push();
        let env = self.environment();
        match bytes {
            Some(bytes) => self.transform_inner(env, name, bytes).map(Some),
            None => self.generate_inner(name),
        }
    }

    fn transform_class(
        &self,
        env: TransformEnvironment,
        name: &str,
        bytes: Vec<u8>,
    ) -> PipelineResult<Vec<u8>> {
        let _scope = self.lock.push();
        self.transform_inner(env, name, bytes)
    }

    fn transform_class_tree(
        &self,
        env: TransformEnvironment,
        name: &str,
        tree: &mut C::Tree,
    ) -> PipelineResult<bool> {
        let _scope = self.lock.push();
        self.track_status(name, ClassStatus::BytesResolved);
        let definitions = self.definitions_for(env, name);
        let changed = self.apply_definitions(env, name, &definitions, tree)?;
        self.track_status(name, ClassStatus::Transformed);
        Ok(changed)
    }

    fn generate_class(
        &self,
        _env: TransformEnvironment,
        name: &str,
    ) -> PipelineResult<Option<Vec<u8>>> {
        let _scope = self.lock.push();
        self.generate_inner(name)
    }

    fn generate_class_tree(
        &self,
        _env: TransformEnvironment,
        name: &str,
        tree: &mut C::Tree,
    ) -> PipelineResult<bool> {
        let _scope = self.lock.push();
        let Some(bytes) = self.generate_inner(name)? else {
            return Ok(false);
        };
        *tree = self
            .codec
            .parse(name, &bytes)
            .map_err(|e| Self::codec_error(name, e))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawCodec;
    use crate::phase::FixedProbe;
    use crate::source::MemorySource;
    use anyhow::Result;

    struct Stamp {
        target: String,
        byte: u8,
        reloaded: Mutex<Vec<Vec<u8>>>,
    }

    impl MixinDefinition<Vec<u8>> for Stamp {
        fn name(&self) -> &str {
            "mixins.Stamp"
        }

        fn targets(&self) -> Vec<String> {
            vec![self.target.clone()]
        }

        fn apply(&self, _ctx: &ApplyContext<'_>, _class: &str, tree: &mut Vec<u8>) -> Result<bool> {
            tree.push(self.byte);
            Ok(true)
        }

        fn reload(&self, tree: Vec<u8>) -> Result<()> {
            self.reloaded.lock().push(tree);
            Ok(())
        }
    }

    fn engine(line: u32) -> Result<Arc<PipelineEngine<RawCodec>>> {
        PipelineEngine::builder(RawCodec)
            .probe(Box::new(FixedProbe::new(line, None)))
            .build()
    }

    #[test]
    fn test_transform_applies_matching_definitions() -> Result<()> {
        let engine = engine(10)?;
        engine.add_definition(Arc::new(Stamp {
            target: "net.Target".to_string(),
            byte: 0xEE,
            reloaded: Mutex::new(Vec::new()),
        }));

        let out = engine.transform_class_bytes("net.Target", Some(vec![1]))?;
        assert_eq!(out, Some(vec![1, 0xEE]));
        assert_eq!(engine.status("net.Target"), ClassStatus::Transformed);

        let untouched = engine.transform_class_bytes("net.Other", Some(vec![1]))?;
        assert_eq!(untouched, Some(vec![1]));
        assert_eq!(engine.lock().depth(), 0);
        Ok(())
    }

    #[test]
    fn test_status_only_tracks_targets() -> Result<()> {
        let engine = engine(10)?;
        engine.add_definition(Arc::new(Stamp {
            target: "net.Target".to_string(),
            byte: 0xEE,
            reloaded: Mutex::new(Vec::new()),
        }));

        for class in ["net.Other", "net.Another"] {
            engine.transform_class_bytes(class, Some(vec![1]))?;
            engine.mark_defined(class);
        }
        let mut tree = vec![1];
        engine.transform_class_tree(engine.environment(), "net.Third", &mut tree)?;
        engine.transform_class_bytes("net.Target", Some(vec![1]))?;

        assert_eq!(engine.status("net.Other"), ClassStatus::NotRequested);
        assert_eq!(engine.status("net.Third"), ClassStatus::NotRequested);
        assert_eq!(engine.status("net.Target"), ClassStatus::Transformed);
        assert_eq!(engine.status.lock().len(), 1);
        Ok(())
    }

    #[test]
    fn test_proxy_returns_engine_output() -> Result<()> {
        let engine = engine(10)?;
        engine.add_definition(Arc::new(Stamp {
            target: "net.Target".to_string(),
            byte: 0xEE,
            reloaded: Mutex::new(Vec::new()),
        }));
        let proxy = ProxyTransformer {
            name: engine.config().self_name.clone(),
            engine: Arc::downgrade(&engine),
        };

        assert_eq!(proxy.transform_class_bytes("net.Target", vec![1])?, vec![1, 0xEE]);
        assert_eq!(proxy.transform_class_bytes("net.Other", vec![2])?, vec![2]);

        drop(engine);
        assert_eq!(proxy.transform_class_bytes("net.Target", vec![3])?, vec![3]);
        Ok(())
    }

    #[test]
    fn test_definition_phase_gate() -> Result<()> {
        struct Late;
        impl MixinDefinition<Vec<u8>> for Late {
            fn name(&self) -> &str {
                "mixins.Late"
            }
            fn targets(&self) -> Vec<String> {
                vec!["net.Target".to_string()]
            }
            fn phase(&self) -> Phase {
                Phase::Default
            }
            fn apply(&self, _: &ApplyContext<'_>, _: &str, tree: &mut Vec<u8>) -> Result<bool> {
                tree.clear();
                Ok(true)
            }
            fn reload(&self, _: Vec<u8>) -> Result<()> {
                Ok(())
            }
        }

        let engine = engine(10)?;
        engine.add_definition(Arc::new(Late));
        assert_eq!(engine.environment().phase, Phase::PreInit);
        assert_eq!(engine.transform_class(engine.environment(), "net.Target", vec![3])?, vec![3]);

        engine.transition_to(Phase::Default);
        assert_eq!(engine.transform_class(engine.environment(), "net.Target", vec![3])?, Vec::<u8>::new());

        engine.transition_to(Phase::PreInit);
        assert_eq!(engine.environment().phase, Phase::Default);
        Ok(())
    }

    #[test]
    fn test_generate_without_generators_defers() -> Result<()> {
        let engine = engine(10)?;
        assert_eq!(engine.generate_class(engine.environment(), "net.Synthetic")?, None);
        assert_eq!(engine.transform_class_bytes("net.Synthetic", None)?, None);

        let mut tree = vec![9];
        assert!(!engine.generate_class_tree(engine.environment(), "net.Synthetic", &mut tree)?);
        assert_eq!(tree, vec![9]);
        assert_eq!(engine.status("net.Synthetic"), ClassStatus::NotRequested);
        Ok(())
    }

    #[test]
    fn test_generator_failure() -> Result<()> {
        struct Failing;
        impl ClassGenerator for Failing {
            fn name(&self) -> &str {
                "gen.Failing"
            }
            fn generate(&self, _class: &str) -> Result<Option<Vec<u8>>> {
                anyhow::bail!("template missing")
            }
        }

        let engine = engine(10)?;
        engine.add_generator(Arc::new(Failing));
        let err = engine
            .generate_class(engine.environment(), "net.Synthetic")
            .unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailure { .. }));
        assert_eq!(engine.status("net.Synthetic"), ClassStatus::GenerationFailed);
        Ok(())
    }

    #[test]
    fn test_init_queues_state_transition_when_early() -> Result<()> {
        let engine = engine(50)?;
        let mut queue = Vec::new();
        let plan = engine.init(&mut queue);
        assert_eq!(plan.phase, Phase::PreInit);
        assert_eq!(queue, vec![crate::phase::STATE_TRANSITION_STEP.to_string()]);
        assert!(engine.registry().contains(&engine.config().self_name));

        // Registering the proxy twice would put it in the host chain twice.
        engine.begin_phase();
        assert_eq!(engine.registry().len(), 1);

        let late = self::engine(500)?;
        let mut queue = Vec::new();
        assert_eq!(late.init(&mut queue).phase, Phase::Default);
        assert!(queue.is_empty());
        Ok(())
    }

    #[test]
    fn test_proxy_is_never_delegated_to() -> Result<()> {
        let engine = engine(10)?;
        engine.begin_phase();
        assert!(engine.chain().get().is_empty());
        assert_eq!(
            engine.chain().get().excluded()[0].reason,
            crate::chain::ExclusionReason::SelfProxy
        );
        Ok(())
    }

    #[test]
    fn test_reload_reports_processed_targets() -> Result<()> {
        let primary = Arc::new(MemorySource::new("primary"));
        primary.insert_class("net.Target", vec![1]);
        let engine = PipelineEngine::builder(RawCodec)
            .primary(primary)
            .probe(Box::new(FixedProbe::new(10, None)))
            .build()?;
        let stamp = Arc::new(Stamp {
            target: "net.Target".to_string(),
            byte: 1,
            reloaded: Mutex::new(Vec::new()),
        });
        engine.add_definition(stamp.clone());

        assert!(engine.reload("mixins.Stamp", vec![7])?.is_empty());
        engine.transform_class_bytes("net.Target", Some(vec![0]))?;
        assert_eq!(engine.reload("mixins.Stamp", vec![8])?, vec!["net.Target".to_string()]);
        assert_eq!(*stamp.reloaded.lock(), vec![vec![7], vec![8]]);

        let err = engine.reload("mixins.Gone", vec![]).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownDefinition { .. }));
        Ok(())
    }

    #[test]
    fn test_compute_frames_is_never_requested() -> Result<()> {
        let engine = engine(10)?;
        assert!(!engine.compute_frames_for_class(engine.environment(), "net.Target", &vec![1]));
        Ok(())
    }
}
