//! Transformer and class exclusions.
//!
//! [`ExclusionSet`] decides which registered transformers the pipeline must
//! not delegate to. An entry excludes a transformer when the entry is a
//! *substring* of the transformer's fully-qualified name: `"Bar"` excludes
//! `org.b.Bar` and `org.b.BarTransformer` alike. The rule is pluggable via
//! [`ExclusionMatcher`] but the default must stay substring containment, which
//! is what existing exclusion lists are written against.
//!
//! [`ClassExclusions`] is the unrelated per-class filter: classes whose name
//! starts with one of its prefixes are never run through the delegated chain.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Transformers known to break when re-applied outside the host's own chain.
pub const DEFAULT_EXCLUSIONS: [&str; 4] = [
    "net.minecraftforge.fml.common.asm.transformers.EventSubscriptionTransformer",
    "cpw.mods.fml.common.asm.transformers.EventSubscriptionTransformer",
    "net.minecraftforge.fml.common.asm.transformers.TerminalTransformer",
    "cpw.mods.fml.common.asm.transformers.TerminalTransformer",
];

pub trait ExclusionMatcher: Send + Sync {
    fn matches(&self, entry: &str, unit_name: &str) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringMatcher;

impl ExclusionMatcher for SubstringMatcher {
    fn matches(&self, entry: &str, unit_name: &str) -> bool {
        unit_name.contains(entry)
    }
}

/// Grow-only set of exclusion entries.
pub struct ExclusionSet {
    entries: BTreeSet<String>,
    matcher: Arc<dyn ExclusionMatcher>,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ExclusionSet {
    /// Seeded with [`DEFAULT_EXCLUSIONS`].
    pub fn new() -> Self {
        Self {
            entries: seed(),
            matcher: Arc::new(SubstringMatcher),
        }
    }

    /// No seed entries; for hosts that manage the whole list themselves.
    pub fn empty() -> Self {
        Self {
            entries: BTreeSet::new(),
            matcher: Arc::new(SubstringMatcher),
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn ExclusionMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Add an entry. Returns `false` if it was already present.
    pub fn insert(&mut self, entry: &str) -> bool {
        self.entries.insert(entry.to_string())
    }

    pub fn extend<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            self.insert(entry.as_ref());
        }
    }

    /// First entry that excludes `unit_name`, if any.
    pub fn matching_entry(&self, unit_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| self.matcher.matches(entry, unit_name))
            .map(String::as_str)
    }

    pub fn excludes(&self, unit_name: &str) -> bool {
        self.matching_entry(unit_name).is_some()
    }

    /// Exact membership, independent of the matching rule.
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything added since construction.
    #[cfg(test)]
    pub(crate) fn reset(&mut self) {
        self.entries = seed();
    }
}

impl fmt::Debug for ExclusionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.iter()).finish()
    }
}

fn seed() -> BTreeSet<String> {
    DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect()
}

/// Class-name prefixes that bypass delegated transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassExclusions {
    prefixes: Vec<String>,
}

impl ClassExclusions {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add(&mut self, prefix: &str) {
        if !self.prefixes.iter().any(|p| p == prefix) {
            self.prefixes.push(prefix.to_string());
        }
    }

    pub fn is_excluded(&self, class_name: &str) -> bool {
        self.prefixes.iter().any(|p| class_name.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_with_known_bad_transformers() {
        let set = ExclusionSet::new();
        assert_eq!(set.len(), 4);
        assert!(set.excludes("cpw.mods.fml.common.asm.transformers.TerminalTransformer"));
        assert!(!set.excludes("org.a.Foo"));
    }

    #[test]
    fn test_substring_semantics() {
        let name = "a.b.TerminalTransformer";

        let mut by_simple = ExclusionSet::empty();
        by_simple.insert("TerminalTransformer");
        assert!(by_simple.excludes(name));

        let mut by_prefix = ExclusionSet::empty();
        by_prefix.insert("a.b.");
        assert!(by_prefix.excludes(name));

        let mut by_infix = ExclusionSet::empty();
        by_infix.insert("minalTrans");
        assert!(by_infix.excludes(name));

        let mut unrelated = ExclusionSet::empty();
        unrelated.insert("EventSubscriptionTransformer");
        assert!(!unrelated.excludes(name));
    }

    #[test]
    fn test_grows_and_resets() {
        let mut set = ExclusionSet::new();
        assert!(set.insert("org.x.Reentrant"));
        assert!(!set.insert("org.x.Reentrant"));
        assert!(set.contains("org.x.Reentrant"));
        assert_eq!(set.len(), 5);

        set.reset();
        assert!(!set.contains("org.x.Reentrant"));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_custom_matcher() {
        struct ExactMatcher;
        impl ExclusionMatcher for ExactMatcher {
            fn matches(&self, entry: &str, unit_name: &str) -> bool {
                entry == unit_name
            }
        }

        let mut set = ExclusionSet::empty().with_matcher(Arc::new(ExactMatcher));
        set.insert("org.b.Bar");
        assert!(set.excludes("org.b.Bar"));
        assert!(!set.excludes("org.b.BarTransformer"));
    }

    #[test]
    fn test_class_exclusions_by_prefix() {
        let mut classes = ClassExclusions::new(["java.", "sun."]);
        classes.add("org.classpipeline.");
        classes.add("java.");
        assert!(classes.is_excluded("java.lang.String"));
        assert!(classes.is_excluded("org.classpipeline.transformer.Proxy"));
        assert!(!classes.is_excluded("javax.swing.JFrame"));
        assert!(!classes.is_excluded("net.Target"));
    }
}
