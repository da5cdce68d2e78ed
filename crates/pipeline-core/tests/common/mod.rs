#![allow(dead_code)]
//! Shared helpers for the engine integration tests.
//!
//! `host_load` plays the host class loader: it runs every legacy entry of the
//! registry over a class in registration order, the engine's proxy included.

use anyhow::Result;
use class_pipeline_core::{
    ApplyContext, FixedProbe, MixinDefinition, PipelineConfig, PipelineEngine, RawCodec,
    TransformerRegistry, TransformerSource,
};
use parking_lot::Mutex;
use std::sync::Arc;

pub type Engine = Arc<PipelineEngine<RawCodec>>;

/// Run the host's transformer chain over one class.
pub fn host_load(registry: &TransformerRegistry, name: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
    let mut bytes = bytes;
    for handle in registry.snapshot() {
        if let Some(unit) = handle.as_legacy() {
            bytes = unit.transform_class_bytes(name, bytes)?;
        }
    }
    Ok(bytes)
}

/// Engine wired to a shared registry, started late (no deferred steps).
pub fn late_engine(
    registry: Arc<TransformerRegistry>,
    config: PipelineConfig,
    primary: Arc<class_pipeline_core::MemorySource>,
) -> Result<Engine> {
    PipelineEngine::builder(RawCodec)
        .config(config)
        .registry(registry)
        .primary(primary)
        .probe(Box::new(FixedProbe::new(500, None)))
        .build()
}

/// Appends a marker byte to each target and records the meta class bytes it
/// looked at through the bytecode provider.
pub struct MetaReadingMixin {
    pub targets: Vec<String>,
    pub meta_class: Option<String>,
    pub seen_meta: Mutex<Vec<Vec<u8>>>,
}

impl MetaReadingMixin {
    pub fn new(targets: &[&str], meta_class: Option<&str>) -> Self {
        Self {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            meta_class: meta_class.map(str::to_string),
            seen_meta: Mutex::new(Vec::new()),
        }
    }
}

impl MixinDefinition<Vec<u8>> for MetaReadingMixin {
    fn name(&self) -> &str {
        "mixins.MetaReading"
    }

    fn targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    fn apply(&self, ctx: &ApplyContext<'_>, _class: &str, tree: &mut Vec<u8>) -> Result<bool> {
        if let Some(meta) = &self.meta_class {
            let bytes = ctx.provider.class_bytes(meta, true)?;
            self.seen_meta.lock().push(bytes);
        }
        tree.push(0x4D);
        Ok(true)
    }

    fn reload(&self, _tree: Vec<u8>) -> Result<()> {
        Ok(())
    }
}
