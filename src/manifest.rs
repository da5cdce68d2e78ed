//! Transformer manifests.
//!
//! A manifest lists the host's registered transformers in order, so a
//! delegation chain can be inspected without a running host:
//!
//! ```json
//! {
//!   "self_name": "org.classpipeline.transformer.Proxy",
//!   "exclusions": ["Bar"],
//!   "transformers": [
//!     { "name": "org.a.Foo" },
//!     { "name": "modern.Thing", "legacy": false },
//!     { "name": "org.c.Quiet", "delegation_excluded": true }
//!   ]
//! }
//! ```
//!
//! Entries become pass-through units; only their names and flags matter.

use anyhow::{Context, Result};
use class_pipeline_core::{FnTransformer, TransformerHandle, TransformerRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// `false` for entries that belong to another transformation mechanism.
    #[serde(default = "default_true")]
    pub legacy: bool,
    #[serde(default)]
    pub delegation_excluded: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainManifest {
    /// Overrides the configured proxy name when present.
    #[serde(default)]
    pub self_name: Option<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub transformers: Vec<ManifestEntry>,
}

impl ChainManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parse manifest {}", path.display()))
    }

    /// A registry holding one entry per manifest line, in order.
    pub fn to_registry(&self) -> TransformerRegistry {
        let registry = TransformerRegistry::new();
        for entry in &self.transformers {
            let handle = if entry.legacy {
                TransformerHandle::legacy(
                    FnTransformer::passthrough(&entry.name)
                        .delegation_excluded(entry.delegation_excluded),
                )
            } else {
                TransformerHandle::foreign(&entry.name)
            };
            registry.register(handle);
        }
        registry
    }
}
