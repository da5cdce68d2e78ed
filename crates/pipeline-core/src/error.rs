//! Errors the pipeline surfaces to its host.
//!
//! Re-entrant transformers are not represented here: they are recovered
//! locally by the driver and never abort a transformation. A generator that
//! has nothing to produce is not an error either (`Ok(None)`).

use std::error::Error;
use std::fmt;

/// Failure of a class request as seen by the host.
///
/// Every variant aborts the definition of the class it names; no partially
/// transformed bytes are ever returned alongside an error.
#[derive(Debug)]
pub enum PipelineError {
    /// No resolver tier produced bytes for the class. Unreadable resources
    /// end up here as well.
    ClassNotFound { name: String },

    /// A delegated transformer failed mid-chain.
    TransformFailure {
        unit: String,
        class: String,
        source: anyhow::Error,
    },

    /// A mixin definition failed while being applied to a target.
    DefinitionFailure {
        definition: String,
        class: String,
        source: anyhow::Error,
    },

    /// A synthetic-class generator raised an error.
    GenerationFailure { class: String, source: anyhow::Error },

    /// `reload` named a definition the engine does not know.
    UnknownDefinition { name: String },

    /// The class tree service could not parse or emit a class.
    Codec { class: String, source: anyhow::Error },
}

impl PipelineError {
    pub fn not_found(name: impl Into<String>) -> Self {
        PipelineError::ClassNotFound { name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::ClassNotFound { .. })
    }

    /// Class the error refers to, when it refers to one.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            PipelineError::ClassNotFound { name } => Some(name),
            PipelineError::TransformFailure { class, .. }
            | PipelineError::DefinitionFailure { class, .. }
            | PipelineError::GenerationFailure { class, .. }
            | PipelineError::Codec { class, .. } => Some(class),
            PipelineError::UnknownDefinition { .. } => None,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ClassNotFound { name } => {
                write!(f, "The specified class '{}' was not found", name)
            }
            PipelineError::TransformFailure {
                unit,
                class,
                source,
            } => write!(
                f,
                "Transformer '{}' failed on class '{}': {}",
                unit, class, source
            ),
            PipelineError::DefinitionFailure {
                definition,
                class,
                source,
            } => write!(
                f,
                "Mixin '{}' could not be applied to '{}': {}",
                definition, class, source
            ),
            PipelineError::GenerationFailure { class, source } => {
                write!(f, "Generating class '{}' failed: {}", class, source)
            }
            PipelineError::UnknownDefinition { name } => {
                write!(f, "No mixin definition named '{}' is registered", name)
            }
            PipelineError::Codec { class, source } => {
                write!(f, "Class tree service failed for '{}': {}", class, source)
            }
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::TransformFailure { source, .. }
            | PipelineError::DefinitionFailure { source, .. }
            | PipelineError::GenerationFailure { source, .. }
            | PipelineError::Codec { source, .. } => Some(&**source),
            PipelineError::ClassNotFound { .. } | PipelineError::UnknownDefinition { .. } => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
