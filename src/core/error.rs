use super::dataset::derive::DerivationError;
use super::ids::Identifier;
use std::fmt;
use thiserror::Error;

/// Which registry a missing record was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Dataset,
    Pipeline,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Dataset => write!(f, "Dataset"),
            EntityKind::Pipeline => write!(f, "Pipeline"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Identifier {0} is already in use")]
    DuplicateIdentifier(Identifier),

    #[error("Identifier space exhausted after {0}")]
    IdentifierExhausted(Identifier),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Identifier },

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Schema derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Pipeline '{pipeline}' requires raw values for its source dataset")]
    MissingValues { pipeline: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Script error: {0}")]
    Script(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn not_found(kind: EntityKind, id: Identifier) -> Self {
        Self::NotFound { kind, id }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
