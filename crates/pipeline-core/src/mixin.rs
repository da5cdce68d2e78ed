//! Collaborators the engine applies but does not interpret.
//!
//! What a mixin definition does to its target is the definition's business.
//! The engine only decides *when* a definition applies (the class is one of
//! its targets and the environment has reached the definition's phase) and
//! records what happened to each class.

use class_pipeline_types::Phase;
use serde::{Deserialize, Serialize};

use crate::service::ClassBytecodeProvider;

/// Where the engine is in the host's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransformEnvironment {
    pub phase: Phase,
}

impl TransformEnvironment {
    pub fn new(phase: Phase) -> Self {
        Self { phase }
    }

    pub fn has_reached(&self, phase: Phase) -> bool {
        self.phase >= phase
    }
}

/// Handed to definitions while they are applied.
///
/// Gives access to other classes' bytes, optionally run through the
/// delegated transformer chain.
pub struct ApplyContext<'a> {
    pub provider: &'a ClassBytecodeProvider,
    pub environment: TransformEnvironment,
}

pub trait MixinDefinition<T>: Send + Sync {
    fn name(&self) -> &str;

    /// Dotted names of the classes this definition applies to.
    fn targets(&self) -> Vec<String>;

    fn phase(&self) -> Phase {
        Phase::PreInit
    }

    /// Apply to one target. Returns whether the tree changed.
    fn apply(&self, ctx: &ApplyContext<'_>, class: &str, tree: &mut T) -> anyhow::Result<bool>;

    /// Swap in a replacement for the definition's own class tree.
    fn reload(&self, tree: T) -> anyhow::Result<()>;
}

/// Produces synthetic classes that have no bytes anywhere.
pub trait ClassGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means "not mine", and resolution continues normally.
    fn generate(&self, class: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Per-class lifecycle.
///
/// ```text
/// NotRequested ─► BytesResolved ─► Transformed ─► Defined
///       │
///       ├─► NotFound
///       └─► GenerationFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassStatus {
    NotRequested,
    BytesResolved,
    Transformed,
    Defined,
    NotFound,
    GenerationFailed,
}

impl ClassStatus {
    /// A class the engine has already processed.
    pub fn is_processed(&self) -> bool {
        matches!(self, ClassStatus::Transformed | ClassStatus::Defined)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClassStatus::Defined | ClassStatus::NotFound | ClassStatus::GenerationFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_phase_gate() {
        let early = TransformEnvironment::new(Phase::PreInit);
        assert!(early.has_reached(Phase::PreInit));
        assert!(!early.has_reached(Phase::Default));
        assert!(TransformEnvironment::new(Phase::Default).has_reached(Phase::PreInit));
    }

    #[test]
    fn test_status_classification() {
        assert!(ClassStatus::Transformed.is_processed());
        assert!(ClassStatus::Defined.is_processed());
        assert!(!ClassStatus::BytesResolved.is_processed());
        assert!(ClassStatus::NotFound.is_terminal());
        assert!(!ClassStatus::Transformed.is_terminal());
    }
}
