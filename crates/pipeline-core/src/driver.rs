//! Runs the delegation chain over one class.

use class_pipeline_types::simple_name;
use std::sync::Arc;
use tracing::{info, trace};

use crate::chain::DelegationChainBuilder;
use crate::error::{PipelineError, PipelineResult};
use crate::exclusion::ClassExclusions;
use crate::guard::ReentranceLock;
use crate::metrics::PipelineMetrics;

pub struct TransformDriver {
    chain: Arc<DelegationChainBuilder>,
    lock: Arc<ReentranceLock>,
    class_exclusions: ClassExclusions,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl TransformDriver {
    pub fn new(
        chain: Arc<DelegationChainBuilder>,
        lock: Arc<ReentranceLock>,
        class_exclusions: ClassExclusions,
    ) -> Self {
        Self {
            chain,
            lock,
            class_exclusions,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn chain(&self) -> &Arc<DelegationChainBuilder> {
        &self.chain
    }

    pub fn lock(&self) -> &Arc<ReentranceLock> {
        &self.lock
    }

    pub fn class_exclusions(&self) -> &ClassExclusions {
        &self.class_exclusions
    }

    /// Pass `bytes` through every unit of the current chain.
    ///
    /// A unit that re-enters the pipeline while running is excluded for the
    /// rest of the process; its output for this call is still used. The first
    /// unit error aborts the whole class.
    pub fn apply(&self, class: &str, bytes: Vec<u8>) -> PipelineResult<Vec<u8>> {
        if self.class_exclusions.is_excluded(class) {
            trace!(class = %class, "class excluded from delegated transformation");
            return Ok(bytes);
        }

        // Engine entry points already hold a level; standalone callers get
        // the outermost one here.
        let _outer = (!self.lock.is_locked()).then(|| self.lock.push());
        // Inside a re-entrant load the semaphore belongs to the outer pass.
        let nested = self.lock.depth() > self.lock.max_depth();
        let chain = self.chain.get();

        let mut bytes = bytes;
        for unit in chain.units() {
            let name = unit.name();
            let timer = self
                .metrics
                .as_ref()
                .map(|m| m.unit_timer(simple_name(name)));

            let (result, reentered) = if nested {
                (unit.transform_class_bytes(class, bytes), false)
            } else {
                self.lock
                    .observe(|| unit.transform_class_bytes(class, bytes))
            };

            if let Some(timer) = timer {
                let elapsed = timer.stop_and_record();
                trace!(unit = %name, class = %class, seconds = elapsed, "unit applied");
            }

            if reentered && self.chain.add_exclusion(name) {
                info!(
                    "A re-entrant transformer '{}' was detected and will no longer process meta class data",
                    name
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_reentrant_unit();
                }
            }

            bytes = result.map_err(|source| PipelineError::TransformFailure {
                unit: name.to_string(),
                class: class.to_string(),
                source,
            })?;
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionSet;
    use crate::registry::{FnTransformer, TransformerHandle, TransformerRegistry};
    use anyhow::Result;
    use std::sync::OnceLock;

    fn driver(registry: &Arc<TransformerRegistry>) -> Result<(TransformDriver, Arc<PipelineMetrics>)> {
        let metrics = Arc::new(PipelineMetrics::new()?);
        let chain = Arc::new(
            DelegationChainBuilder::new(registry.clone(), "self.Proxy", ExclusionSet::new())
                .with_metrics(metrics.clone()),
        );
        let driver = TransformDriver::new(
            chain,
            Arc::new(ReentranceLock::new(1)),
            ClassExclusions::new(["java."]),
        )
        .with_metrics(metrics.clone());
        Ok((driver, metrics))
    }

    fn append(name: &str, byte: u8) -> TransformerHandle {
        TransformerHandle::legacy(FnTransformer::new(name, move |_, mut bytes| {
            bytes.push(byte);
            Ok(bytes)
        }))
    }

    #[test]
    fn test_applies_in_order() -> Result<()> {
        let registry = Arc::new(TransformerRegistry::new());
        registry.register(append("org.a.One", 1));
        registry.register(append("org.a.Two", 2));
        let (driver, metrics) = driver(&registry)?;

        assert_eq!(driver.apply("net.Target", vec![0])?, vec![0, 1, 2]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.units.get("one").map(|t| t.count), Some(1));
        assert_eq!(snapshot.units.get("two").map(|t| t.count), Some(1));
        Ok(())
    }

    #[test]
    fn test_excluded_class_untouched() -> Result<()> {
        let registry = Arc::new(TransformerRegistry::new());
        registry.register(append("org.a.One", 1));
        let (driver, _) = driver(&registry)?;
        assert_eq!(driver.apply("java.lang.Object", vec![0])?, vec![0]);
        Ok(())
    }

    #[test]
    fn test_failure_aborts_class() -> Result<()> {
        let registry = Arc::new(TransformerRegistry::new());
        registry.register(append("org.a.One", 1));
        registry.register(TransformerHandle::legacy(FnTransformer::new(
            "org.a.Broken",
            |_, _| anyhow::bail!("cannot parse"),
        )));
        registry.register(append("org.a.Three", 3));
        let (driver, _) = driver(&registry)?;

        let err = driver.apply("net.Target", vec![0]).unwrap_err();
        match err {
            PipelineError::TransformFailure { unit, class, .. } => {
                assert_eq!(unit, "org.a.Broken");
                assert_eq!(class, "net.Target");
            }
            other => panic!("unexpected error: {}", other),
        }
        Ok(())
    }

    #[test]
    fn test_reentrant_unit_is_promoted() -> Result<()> {
        let registry = Arc::new(TransformerRegistry::new());
        let driver_cell: Arc<OnceLock<Arc<TransformDriver>>> = Arc::new(OnceLock::new());

        // Loading a helper class from inside the unit goes back through an
        // engine entry, which opens a second level.
        let cell = driver_cell.clone();
        registry.register(TransformerHandle::legacy(FnTransformer::new(
            "org.x.Loader",
            move |class, bytes| {
                if let Some(driver) = cell.get() {
                    if class == "net.Target" {
                        let _entry = driver.lock().push();
                        driver.apply("net.Helper", Vec::new())?;
                    }
                }
                Ok(bytes)
            },
        )));
        registry.register(append("org.a.Tail", 9));

        let (driver, metrics) = driver(&registry)?;
        let driver = Arc::new(driver);
        let _ = driver_cell.set(driver.clone());

        // The current call still finishes with the remaining units.
        assert_eq!(driver.apply("net.Target", vec![0])?, vec![0, 9]);
        assert!(!driver.lock().is_set());
        assert!(driver.chain().is_excluded("org.x.Loader"));
        assert_eq!(driver.chain().get().names(), vec!["org.a.Tail"]);
        assert!(registry.contains("org.x.Loader"));
        assert_eq!(metrics.snapshot().reentrant_units, 1);
        Ok(())
    }
}
