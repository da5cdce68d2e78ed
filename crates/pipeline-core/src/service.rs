//! Bytecode provider: resolved and, on request, transformed class bytes.
//!
//! This is what mixin definitions use to look at classes other than the one
//! being transformed, and what `audit` uses to force targets through the
//! pipeline.

use std::sync::Arc;
use tracing::trace;

use crate::codec::ClassCodec;
use crate::driver::TransformDriver;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{PipelineMetrics, Stage};
use crate::resolver::{ArtifactResolver, Resolution};

pub struct ClassBytecodeProvider {
    resolver: ArtifactResolver,
    driver: Arc<TransformDriver>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ClassBytecodeProvider {
    pub fn new(resolver: ArtifactResolver, driver: Arc<TransformDriver>) -> Self {
        Self {
            resolver,
            driver,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    pub fn driver(&self) -> &Arc<TransformDriver> {
        &self.driver
    }

    /// Resolve a class through the loader tiers, timed as `class.load`.
    pub fn resolve(&self, name: &str) -> Resolution {
        let _timer = self
            .metrics
            .as_ref()
            .map(|m| m.stage_timer(Stage::ClassLoad));
        self.resolver.resolve(name)
    }

    /// Bytes of `name`, run through the delegated chain when
    /// `run_transformers` is set.
    pub fn class_bytes(&self, name: &str, run_transformers: bool) -> PipelineResult<Vec<u8>> {
        let bytes = self
            .resolve(name)
            .into_bytes()
            .ok_or_else(|| PipelineError::not_found(name))?;

        if !run_transformers {
            return Ok(bytes);
        }

        let _timer = self
            .metrics
            .as_ref()
            .map(|m| m.stage_timer(Stage::ClassTransform));
        let out = self.driver.apply(name, bytes)?;
        trace!(class = %name, size = out.len(), "class bytes transformed");
        Ok(out)
    }

    /// [`Self::class_bytes`] parsed through `codec`.
    pub fn class_tree<C: ClassCodec>(
        &self,
        codec: &C,
        name: &str,
        run_transformers: bool,
    ) -> PipelineResult<C::Tree> {
        let bytes = self.class_bytes(name, run_transformers)?;
        codec
            .parse(name, &bytes)
            .map_err(|source| PipelineError::Codec {
                class: name.to_string(),
                source,
            })
    }
}
