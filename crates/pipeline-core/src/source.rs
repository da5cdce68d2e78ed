//! Artifact sources.
//!
//! The resolver consults two host-managed loaders:
//!
//! - a primary [`ClassDataSource`] that hands out raw class bytes by name, and
//! - a secondary [`ParentLoader`] (the application / parent loader) that only
//!   guarantees resource-stream lookup. When the parent is itself
//!   byte-addressable it can expose a [`ResourceLoader`] directly; otherwise
//!   the resolver wraps it in a [`ParentResourceAdapter`].
//!
//! Provided implementations: [`DirectorySource`] (filesystem classpath
//! roots), [`MemorySource`] (in-memory map) and [`NoopSource`] (always empty).

use class_pipeline_types::class_name::resource_path;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// Stream over a resource's bytes. Dropping it closes the underlying handle.
pub type ResourceStream<'a> = Box<dyn Read + Send + 'a>;

/// Primary, host-managed loader of raw class bytes.
pub trait ClassDataSource: Send + Sync {
    /// Raw bytes for a dotted class name. `None` or an empty buffer both mean
    /// "not available from this loader".
    fn class_data(&self, name: &str) -> Option<Vec<u8>>;

    /// Name used in diagnostics.
    fn source_name(&self) -> &str;
}

/// Byte-addressable resource lookup.
pub trait ResourceLoader: Send + Sync {
    /// Open the resource at a slash-separated path. `Ok(None)` when absent.
    fn open_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>>;
}

/// Secondary (parent / application) loader.
pub trait ParentLoader: Send + Sync {
    /// Direct access when the parent already is a byte-addressable loader.
    fn as_resource_loader(&self) -> Option<&dyn ResourceLoader> {
        None
    }

    /// Generic resource lookup every parent supports.
    fn find_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>>;
}

/// Minimal adapter exposing only the parent's resource-stream lookup.
pub struct ParentResourceAdapter<'a> {
    parent: &'a dyn ParentLoader,
}

impl<'a> ParentResourceAdapter<'a> {
    pub fn new(parent: &'a dyn ParentLoader) -> Self {
        Self { parent }
    }
}

impl ResourceLoader for ParentResourceAdapter<'_> {
    fn open_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>> {
        self.parent.find_resource(path)
    }
}

// =============================================================================
// NoopSource
// =============================================================================

/// A source that never has anything. Used when a tier is absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSource;

impl ClassDataSource for NoopSource {
    fn class_data(&self, _name: &str) -> Option<Vec<u8>> {
        None
    }

    fn source_name(&self) -> &str {
        "none"
    }
}

impl ParentLoader for NoopSource {
    fn find_resource(&self, _path: &str) -> io::Result<Option<ResourceStream<'_>>> {
        Ok(None)
    }
}

// =============================================================================
// DirectorySource
// =============================================================================

/// Filesystem classpath: a list of root directories searched in order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    name: String,
    roots: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: Vec<PathBuf> = roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        let name = roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        Self { name, roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn locate(&self, path: &str) -> Option<PathBuf> {
        let relative = path.trim_start_matches('/');
        self.roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

impl ClassDataSource for DirectorySource {
    fn class_data(&self, name: &str) -> Option<Vec<u8>> {
        let file = self.locate(&resource_path(name))?;
        std::fs::read(file).ok()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

impl ResourceLoader for DirectorySource {
    fn open_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>> {
        match self.locate(path) {
            Some(file) => Ok(Some(Box::new(File::open(file)?) as ResourceStream<'_>)),
            None => Ok(None),
        }
    }
}

impl ParentLoader for DirectorySource {
    fn as_resource_loader(&self) -> Option<&dyn ResourceLoader> {
        Some(self)
    }

    fn find_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>> {
        self.open_resource(path)
    }
}

// =============================================================================
// MemorySource
// =============================================================================

/// In-memory artifact store keyed by resource path.
///
/// Hosts use it for classes they synthesise at runtime; tests use it as a
/// stand-in for either tier.
#[derive(Debug, Default)]
pub struct MemorySource {
    name: String,
    resources: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Store class bytes under the resource path of a dotted name.
    pub fn insert_class(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.insert_resource(&resource_path(name), bytes);
    }

    pub fn insert_resource(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.resources
            .write()
            .insert(path.trim_start_matches('/').to_string(), bytes.into());
    }

    pub fn remove_class(&self, name: &str) -> bool {
        self.resources.write().remove(&resource_path(name)).is_some()
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

impl ClassDataSource for MemorySource {
    fn class_data(&self, name: &str) -> Option<Vec<u8>> {
        self.resources.read().get(&resource_path(name)).cloned()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

impl ResourceLoader for MemorySource {
    fn open_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>> {
        let bytes = self
            .resources
            .read()
            .get(path.trim_start_matches('/'))
            .cloned();
        Ok(bytes.map(|b| Box::new(Cursor::new(b)) as ResourceStream<'_>))
    }
}

impl ParentLoader for MemorySource {
    fn as_resource_loader(&self) -> Option<&dyn ResourceLoader> {
        Some(self)
    }

    fn find_resource(&self, path: &str) -> io::Result<Option<ResourceStream<'_>>> {
        self.open_resource(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn drain(stream: Option<ResourceStream<'_>>) -> Option<Vec<u8>> {
        let mut stream = stream?;
        let mut out = Vec::new();
        stream.read_to_end(&mut out).ok()?;
        Some(out)
    }

    #[test]
    fn test_directory_source_searches_roots_in_order() -> Result<()> {
        let first = TempDir::new()?;
        let second = TempDir::new()?;
        std::fs::create_dir_all(first.path().join("org/a"))?;
        std::fs::create_dir_all(second.path().join("org/a"))?;
        std::fs::write(first.path().join("org/a/Foo.class"), [1, 2])?;
        std::fs::write(second.path().join("org/a/Foo.class"), [9, 9])?;
        std::fs::write(second.path().join("org/a/Bar.class"), [3])?;

        let source = DirectorySource::new([first.path(), second.path()]);
        assert_eq!(source.class_data("org.a.Foo"), Some(vec![1, 2]));
        assert_eq!(source.class_data("org.a.Bar"), Some(vec![3]));
        assert_eq!(source.class_data("org.a.Missing"), None);

        let stream = source.open_resource("org/a/Bar.class")?;
        assert_eq!(drain(stream), Some(vec![3]));
        assert!(source.open_resource("org/a/Missing.class")?.is_none());
        Ok(())
    }

    #[test]
    fn test_memory_source_both_views() -> Result<()> {
        let source = MemorySource::new("mem");
        source.insert_class("org.b.Bar", vec![0xCA, 0xFE]);
        assert_eq!(source.len(), 1);
        assert_eq!(source.class_data("org.b.Bar"), Some(vec![0xCA, 0xFE]));

        let stream = source.find_resource("/org/b/Bar.class")?;
        assert_eq!(drain(stream), Some(vec![0xCA, 0xFE]));

        assert!(source.remove_class("org.b.Bar"));
        assert!(source.is_empty());
        Ok(())
    }

    #[test]
    fn test_adapter_delegates_to_parent() -> Result<()> {
        let parent = MemorySource::new("parent");
        parent.insert_resource("x/Y.class", vec![7]);
        let adapter = ParentResourceAdapter::new(&parent);
        assert_eq!(drain(adapter.open_resource("x/Y.class")?), Some(vec![7]));
        assert!(adapter.open_resource("x/Z.class")?.is_none());
        Ok(())
    }
}
