//! Host-managed transformer registry.
//!
//! The host owns an insertion-ordered list of transformers and may add or
//! remove entries at any time. The pipeline never holds on to the list; it
//! takes a [`TransformerSource::snapshot`] whenever it rebuilds its delegation
//! chain. Every mutation bumps a generation counter so a consumer can tell
//! that its derived view is stale without being told explicitly.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A transformation unit the pipeline can re-apply on the host's behalf.
///
/// Implementations are opaque `bytes -> bytes` functions. Each call receives
/// the current bytes by value and returns their replacement.
pub trait LegacyClassTransformer: Send + Sync {
    /// Fully-qualified, dotted name. Identity for exclusion matching.
    fn name(&self) -> &str;

    /// Units reporting `true` are never delegated to.
    fn is_delegation_excluded(&self) -> bool {
        false
    }

    fn transform_class_bytes(&self, name: &str, bytes: Vec<u8>) -> anyhow::Result<Vec<u8>>;
}

type TransformFn = dyn Fn(&str, Vec<u8>) -> anyhow::Result<Vec<u8>> + Send + Sync;

/// Closure-backed transformer, for hosts wiring units in code.
pub struct FnTransformer {
    name: String,
    delegation_excluded: bool,
    transform: Box<TransformFn>,
}

impl FnTransformer {
    pub fn new<F>(name: &str, transform: F) -> Self
    where
        F: Fn(&str, Vec<u8>) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            delegation_excluded: false,
            transform: Box::new(transform),
        }
    }

    /// A unit that returns its input unchanged.
    pub fn passthrough(name: &str) -> Self {
        Self::new(name, |_, bytes| Ok(bytes))
    }

    pub fn delegation_excluded(mut self, excluded: bool) -> Self {
        self.delegation_excluded = excluded;
        self
    }
}

impl LegacyClassTransformer for FnTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_delegation_excluded(&self) -> bool {
        self.delegation_excluded
    }

    fn transform_class_bytes(&self, name: &str, bytes: Vec<u8>) -> anyhow::Result<Vec<u8>> {
        (self.transform)(name, bytes)
    }
}

impl fmt::Debug for FnTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransformer")
            .field("name", &self.name)
            .field("delegation_excluded", &self.delegation_excluded)
            .finish()
    }
}

/// Registry entry.
#[derive(Clone)]
pub enum TransformerHandle {
    /// Applicable by this pipeline.
    Legacy(Arc<dyn LegacyClassTransformer>),
    /// Belongs to another transformation mechanism; never delegated to.
    Foreign { name: String },
}

impl TransformerHandle {
    pub fn legacy<T: LegacyClassTransformer + 'static>(transformer: T) -> Self {
        TransformerHandle::Legacy(Arc::new(transformer))
    }

    pub fn foreign(name: &str) -> Self {
        TransformerHandle::Foreign {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TransformerHandle::Legacy(t) => t.name(),
            TransformerHandle::Foreign { name } => name,
        }
    }

    pub fn as_legacy(&self) -> Option<&Arc<dyn LegacyClassTransformer>> {
        match self {
            TransformerHandle::Legacy(t) => Some(t),
            TransformerHandle::Foreign { .. } => None,
        }
    }
}

impl fmt::Debug for TransformerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformerHandle::Legacy(t) => f.debug_tuple("Legacy").field(&t.name()).finish(),
            TransformerHandle::Foreign { name } => f.debug_tuple("Foreign").field(name).finish(),
        }
    }
}

/// Read side of the registry, as seen by the delegation chain builder.
pub trait TransformerSource: Send + Sync {
    /// Current entries in application order.
    fn snapshot(&self) -> Vec<TransformerHandle>;

    /// Changes whenever the entries change. Sources that cannot track this
    /// return a constant and rely on explicit invalidation.
    fn generation(&self) -> u64 {
        0
    }
}

#[derive(Default)]
pub struct TransformerRegistry {
    entries: RwLock<Vec<TransformerHandle>>,
    generation: AtomicU64,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: TransformerHandle) {
        self.entries.write().push(handle);
        self.bump();
    }

    pub fn register_legacy(&self, transformer: Arc<dyn LegacyClassTransformer>) {
        self.register(TransformerHandle::Legacy(transformer));
    }

    /// Remove the first entry with this exact name.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            match entries.iter().position(|h| h.name() == name) {
                Some(pos) => {
                    entries.remove(pos);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.bump();
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|h| h.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }
}

impl TransformerSource for TransformerRegistry {
    fn snapshot(&self) -> Vec<TransformerHandle> {
        self.entries.read().clone()
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("entries", &*self.entries.read())
            .field("generation", &self.generation())
            .finish()
    }
}
