//! Engine error type.

use uuid::Uuid;

use crate::repository::RepositoryError;
use crate::validation::ValidationError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by the mutation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The input was rejected; nothing was written.
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    /// The addressed entity does not exist; nothing was written.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// The session changed since the caller read it.
    #[error("session {id} is at version {actual}, expected {expected}")]
    StaleVersion { id: Uuid, expected: u64, actual: u64 },

    /// A session-store operation failed after retries.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Session-not-found shorthand.
    pub fn session_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "session",
            id,
        }
    }

    /// Conflict-not-found shorthand.
    pub fn conflict_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "conflict",
            id,
        }
    }

    /// Whether the caller's input was at fault (validation, missing entity
    /// or stale version) rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::StaleVersion { .. }
        )
    }
}

impl From<Vec<ValidationError>> for EngineError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
