//! # Artifact Resolution
//!
//! Obtains the raw bytes of a class through a tiered set of loaders.
//!
//! ```text
//!  resolve("org.a.Foo")
//!        │
//!        ▼
//! ┌──────────────────────┐  non-empty
//! │ primary.class_data() │ ───────────► Found { tier: Primary }
//! └──────────┬───────────┘
//!            │ empty / None
//!            ▼
//! ┌──────────────────────────────┐
//! │ parent as ResourceLoader     │  (or ParentResourceAdapter)
//! │ open "org/a/Foo.class"       │
//! └──────────┬───────────────────┘
//!     ┌──────┼───────────────┐
//!     ▼      ▼               ▼
//!  Found   NotFound     Unreadable { io error }
//! ```
//!
//! There are no retries beyond the two tiers. Callers treat `Unreadable`
//! exactly like `NotFound`; the variant exists so the difference is visible in
//! logs and metrics instead of being swallowed.

use class_pipeline_types::class_name::resource_path;
use serde::Serialize;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{trace, warn};

use crate::metrics::PipelineMetrics;
use crate::source::{ClassDataSource, ParentLoader, ParentResourceAdapter, ResourceLoader};

/// Loader tier that produced a class's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Primary,
    Secondary,
}

#[derive(Debug)]
pub enum Resolution {
    Found {
        bytes: Vec<u8>,
        tier: ResolutionTier,
    },
    NotFound,
    /// The resource exists but opening or draining it failed.
    Unreadable { path: String, error: io::Error },
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }

    pub fn tier(&self) -> Option<ResolutionTier> {
        match self {
            Resolution::Found { tier, .. } => Some(*tier),
            _ => None,
        }
    }

    /// Bytes if found; `None` for both `NotFound` and `Unreadable`.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Resolution::Found { bytes, .. } => Some(bytes),
            Resolution::NotFound | Resolution::Unreadable { .. } => None,
        }
    }

    /// Metric label of the outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Found {
                tier: ResolutionTier::Primary,
                ..
            } => "primary",
            Resolution::Found {
                tier: ResolutionTier::Secondary,
                ..
            } => "secondary",
            Resolution::NotFound => "not_found",
            Resolution::Unreadable { .. } => "unreadable",
        }
    }
}

pub struct ArtifactResolver {
    primary: Arc<dyn ClassDataSource>,
    parent: Arc<dyn ParentLoader>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ArtifactResolver {
    pub fn new(primary: Arc<dyn ClassDataSource>, parent: Arc<dyn ParentLoader>) -> Self {
        Self {
            primary,
            parent,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn primary(&self) -> &dyn ClassDataSource {
        self.primary.as_ref()
    }

    /// Resolve a dotted class name. Never fails; see the module docs.
    pub fn resolve(&self, name: &str) -> Resolution {
        let resolution = self.resolve_tiers(name);
        match &resolution {
            Resolution::Found { bytes, tier } => {
                trace!(class = %name, ?tier, size = bytes.len(), "resolved class bytes");
            }
            Resolution::NotFound => {
                trace!(class = %name, "class bytes not found in any tier");
            }
            Resolution::Unreadable { path, error } => {
                warn!(
                    class = %name,
                    path = %path,
                    error = %error,
                    "class resource unreadable, treating as not found"
                );
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_resolution(resolution.label());
        }
        resolution
    }

    fn resolve_tiers(&self, name: &str) -> Resolution {
        if let Some(bytes) = self.primary.class_data(name).filter(|b| !b.is_empty()) {
            return Resolution::Found {
                bytes,
                tier: ResolutionTier::Primary,
            };
        }

        let adapter;
        let loader: &dyn ResourceLoader = match self.parent.as_resource_loader() {
            Some(loader) => loader,
            None => {
                adapter = ParentResourceAdapter::new(self.parent.as_ref());
                &adapter
            }
        };

        read_resource(loader, &resource_path(name))
    }
}

fn read_resource(loader: &dyn ResourceLoader, path: &str) -> Resolution {
    let unreadable = |error: io::Error| Resolution::Unreadable {
        path: path.to_string(),
        error,
    };

    let mut stream = match loader.open_resource(path) {
        Ok(Some(stream)) => stream,
        Ok(None) => return Resolution::NotFound,
        Err(error) => return unreadable(error),
    };

    let mut bytes = Vec::new();
    match stream.read_to_end(&mut bytes) {
        Ok(_) => Resolution::Found {
            bytes,
            tier: ResolutionTier::Secondary,
        },
        Err(error) => unreadable(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, NoopSource, ResourceStream};
    use anyhow::Result;

    /// Parent that is not byte-addressable and only answers `find_resource`.
    struct OpaqueParent {
        inner: MemorySource,
    }

    impl ParentLoader for OpaqueParent {
        fn find_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>> {
            self.inner.find_resource(path)
        }
    }

    /// Parent whose streams fail mid-read.
    struct BrokenParent;

    struct BrokenStream;

    impl Read for BrokenStream {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "truncated archive"))
        }
    }

    impl ParentLoader for BrokenParent {
        fn find_resource(&self, _path: &str) -> io::Result<Option<ResourceStream<'_>>> {
            Ok(Some(Box::new(BrokenStream) as ResourceStream<'_>))
        }
    }

    #[test]
    fn test_primary_wins() -> Result<()> {
        let primary = Arc::new(MemorySource::new("primary"));
        let parent = Arc::new(MemorySource::new("parent"));
        primary.insert_class("org.a.Foo", vec![1]);
        parent.insert_class("org.a.Foo", vec![2]);

        let resolver = ArtifactResolver::new(primary, parent);
        let resolution = resolver.resolve("org.a.Foo");
        assert_eq!(resolution.tier(), Some(ResolutionTier::Primary));
        assert_eq!(resolution.into_bytes(), Some(vec![1]));
        Ok(())
    }

    #[test]
    fn test_empty_primary_falls_back_to_parent_stream() -> Result<()> {
        let primary = Arc::new(MemorySource::new("primary"));
        primary.insert_class("org.a.Foo", Vec::new());
        let parent = Arc::new(OpaqueParent {
            inner: MemorySource::new("parent"),
        });
        parent.inner.insert_class("org.a.Foo", vec![0xCA, 0xFE, 0xBA, 0xBE]);

        let resolver = ArtifactResolver::new(primary, parent);
        let resolution = resolver.resolve("org.a.Foo");
        assert_eq!(resolution.tier(), Some(ResolutionTier::Secondary));
        assert_eq!(resolution.into_bytes(), Some(vec![0xCA, 0xFE, 0xBA, 0xBE]));
        Ok(())
    }

    #[test]
    fn test_both_tiers_fail_is_not_found() -> Result<()> {
        let metrics = Arc::new(PipelineMetrics::new()?);
        let resolver = ArtifactResolver::new(Arc::new(NoopSource), Arc::new(NoopSource))
            .with_metrics(metrics.clone());

        let resolution = resolver.resolve("org.a.Missing");
        assert!(matches!(resolution, Resolution::NotFound));
        assert_eq!(metrics.snapshot().not_found, 1);
        Ok(())
    }

    #[test]
    fn test_read_error_is_unreadable_not_panic() -> Result<()> {
        let metrics = Arc::new(PipelineMetrics::new()?);
        let resolver = ArtifactResolver::new(Arc::new(NoopSource), Arc::new(BrokenParent))
            .with_metrics(metrics.clone());

        let resolution = resolver.resolve("org.a.Foo");
        match &resolution {
            Resolution::Unreadable { path, .. } => assert_eq!(path, "org/a/Foo.class"),
            other => panic!("expected Unreadable, got {:?}", other),
        }
        assert!(resolution.into_bytes().is_none());
        assert_eq!(metrics.snapshot().unreadable, 1);
        Ok(())
    }
}
