//! # class-pipeline-core
//!
//! A class-bytecode transformation pipeline. Compiled classes are intercepted
//! on their way into a host class loader, run through mixin definitions and,
//! for meta class data, through a filtered chain of the host's own legacy
//! transformers.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`resolver`] / [`source`] | tiered lookup of raw class bytes |
//! | [`registry`] | host-managed transformer registry |
//! | [`exclusion`] | transformer and class exclusion lists |
//! | [`chain`] | cached, filtered delegation chain |
//! | [`guard`] / [`driver`] | re-entrance detection and chain execution |
//! | [`phase`] | initial bootstrap phase negotiation |
//! | [`service`] | bytecode provider for mixin definitions |
//! | [`engine`] | the host-facing façade |
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use class_pipeline_core::{
//!     DirectorySource, FixedProbe, MixinTransformer, PipelineEngine, RawCodec,
//!     TransformerRegistry,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = Arc::new(TransformerRegistry::new());
//! let engine = PipelineEngine::builder(RawCodec)
//!     .registry(registry.clone())
//!     .primary(Arc::new(DirectorySource::new(["build/classes"])))
//!     .probe(Box::new(FixedProbe::new(200, None)))
//!     .build()?;
//!
//! let mut deferred = Vec::new();
//! engine.init(&mut deferred);
//! let out = engine.transform_class_bytes("net.example.Target", Some(vec![0xCA, 0xFE]))?;
//! # let _ = out;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod codec;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod guard;
pub mod metrics;
pub mod mixin;
pub mod phase;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod source;

pub use chain::{DelegationChain, DelegationChainBuilder, ExcludedUnit, ExclusionReason};
pub use codec::{ClassCodec, RawCodec};
pub use config::PipelineConfig;
pub use driver::TransformDriver;
pub use engine::{AuditFailure, AuditReport, MixinTransformer, PipelineEngine, ProxyTransformer};
pub use error::{PipelineError, PipelineResult};
pub use exclusion::{ClassExclusions, ExclusionMatcher, ExclusionSet, SubstringMatcher};
pub use guard::{ReentranceLock, ReentranceScope};
pub use metrics::{MetricsSnapshot, PipelineMetrics, Stage};
pub use mixin::{ApplyContext, ClassGenerator, ClassStatus, MixinDefinition, TransformEnvironment};
pub use phase::{
    refmap_remap_enabled, BacktraceProbe, EarlyStartProbe, EnvProbe, FixedProbe, InitPlan,
    PhaseNegotiator,
};
pub use registry::{
    FnTransformer, LegacyClassTransformer, TransformerHandle, TransformerRegistry,
    TransformerSource,
};
pub use resolver::{ArtifactResolver, Resolution, ResolutionTier};
pub use service::ClassBytecodeProvider;
pub use source::{ClassDataSource, DirectorySource, MemorySource, NoopSource, ParentLoader, ResourceLoader};

pub use class_pipeline_types::Phase;
