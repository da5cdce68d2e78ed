//! class-pipeline
//!
//! Facade over the workspace crates plus the pieces only the CLI and hosts
//! wiring the pipeline from files need:
//!
//! - [`core`]: the transformation pipeline itself (`class-pipeline-core`)
//! - [`types`]: class names, phases and environment helpers
//! - [`manifest`]: JSON description of a host transformer registry

pub mod manifest;

pub use class_pipeline_core as core;
pub use class_pipeline_types as types;

pub use class_pipeline_core::{
    DelegationChain, DelegationChainBuilder, ExclusionSet, MixinTransformer, PipelineConfig,
    PipelineEngine, PipelineError, PipelineResult, Resolution, TransformerRegistry,
};
pub use manifest::{ChainManifest, ManifestEntry};
