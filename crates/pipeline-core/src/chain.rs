//! Delegation chain construction and caching.
//!
//! The chain is derived from a snapshot of the host registry:
//!
//! 1. only [`TransformerHandle::Legacy`] entries are considered
//! 2. the engine's own proxy (matched by exact name) is dropped
//! 3. a unit matched by any exclusion entry is dropped
//! 4. a unit reporting `is_delegation_excluded()` is dropped
//!
//! Survivors keep registry order. The result is cached as an
//! `Arc<DelegationChain>` until an exclusion is added, the host signals a
//! registry change, or the registry's generation moves.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::exclusion::ExclusionSet;
use crate::metrics::PipelineMetrics;
use crate::registry::{LegacyClassTransformer, TransformerHandle, TransformerSource};

/// Why a registered unit is missing from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "entry", rename_all = "snake_case")]
pub enum ExclusionReason {
    SelfProxy,
    /// Matched by this exclusion entry.
    Matched(String),
    DelegationExcluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedUnit {
    pub name: String,
    pub reason: ExclusionReason,
}

#[derive(Default)]
pub struct DelegationChain {
    units: Vec<Arc<dyn LegacyClassTransformer>>,
    excluded: Vec<ExcludedUnit>,
}

impl DelegationChain {
    pub fn units(&self) -> &[Arc<dyn LegacyClassTransformer>] {
        &self.units
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// Legacy units left out on the last build. Foreign entries are not listed.
    pub fn excluded(&self) -> &[ExcludedUnit] {
        &self.excluded
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for DelegationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationChain")
            .field("units", &self.names())
            .field("excluded", &self.excluded)
            .finish()
    }
}

struct CachedChain {
    chain: Arc<DelegationChain>,
    generation: u64,
}

pub struct DelegationChainBuilder {
    source: Arc<dyn TransformerSource>,
    self_name: String,
    exclusions: RwLock<ExclusionSet>,
    cache: Mutex<Option<CachedChain>>,
    /// Bumped under the cache lock by every `invalidate()`.
    epoch: AtomicU64,
    rebuilds: AtomicU64,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl DelegationChainBuilder {
    pub fn new(
        source: Arc<dyn TransformerSource>,
        self_name: &str,
        exclusions: ExclusionSet,
    ) -> Self {
        Self {
            source,
            self_name: self_name.to_string(),
            exclusions: RwLock::new(exclusions),
            cache: Mutex::new(None),
            epoch: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    pub fn source(&self) -> &Arc<dyn TransformerSource> {
        &self.source
    }

    /// The current chain, rebuilding it first if it is stale.
    ///
    /// A chain whose build overlapped an `invalidate()` is returned to this
    /// caller but not cached, so the next call rebuilds.
    pub fn get(&self) -> Arc<DelegationChain> {
        let generation = self.source.generation();
        let epoch = {
            let cache = self.cache.lock();
            if let Some(cached) = cache.as_ref() {
                if cached.generation == generation {
                    return Arc::clone(&cached.chain);
                }
            }
            self.epoch.load(Ordering::Acquire)
        };

        // Built without holding the cache lock; a host unit may call back in.
        let chain = Arc::new(self.build());
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_chain_rebuild();
        }

        let mut cache = self.cache.lock();
        if self.epoch.load(Ordering::Acquire) == epoch {
            *cache = Some(CachedChain {
                chain: Arc::clone(&chain),
                generation,
            });
        } else {
            debug!("Delegation list invalidated during rebuild, not caching");
        }
        chain
    }

    /// Add an exclusion entry and mark the chain for rebuild.
    ///
    /// Returns `false` if the entry was already present, in which case the
    /// cached chain is kept.
    pub fn add_exclusion(&self, entry: &str) -> bool {
        let added = self.exclusions.write().insert(entry);
        if added {
            self.invalidate();
        }
        added
    }

    /// Host signal that the registry changed.
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *cache = None;
    }

    pub fn is_pending(&self) -> bool {
        match self.cache.lock().as_ref() {
            Some(cached) => cached.generation != self.source.generation(),
            None => true,
        }
    }

    pub fn is_excluded(&self, unit_name: &str) -> bool {
        self.exclusions.read().excludes(unit_name)
    }

    /// Sorted copy of the exclusion entries.
    pub fn exclusions(&self) -> Vec<String> {
        self.exclusions
            .read()
            .entries()
            .map(str::to_string)
            .collect()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    fn build(&self) -> DelegationChain {
        debug!("Rebuilding transformer delegation list");

        let snapshot = self.source.snapshot();
        let exclusions = self.exclusions.read();
        let mut chain = DelegationChain::default();

        for handle in snapshot {
            let TransformerHandle::Legacy(unit) = handle else {
                continue;
            };
            let name = unit.name().to_string();

            let reason = if name == self.self_name {
                Some(ExclusionReason::SelfProxy)
            } else if let Some(entry) = exclusions.matching_entry(&name) {
                Some(ExclusionReason::Matched(entry.to_string()))
            } else if unit.is_delegation_excluded() {
                Some(ExclusionReason::DelegationExcluded)
            } else {
                None
            };

            match reason {
                None => {
                    debug!("  Adding:    {}", name);
                    chain.units.push(unit);
                }
                Some(reason) => {
                    debug!(?reason, "  Excluding: {}", name);
                    chain.excluded.push(ExcludedUnit { name, reason });
                }
            }
        }

        debug!(
            "Transformer delegation list created with {} entries",
            chain.units.len()
        );
        chain
    }
}
