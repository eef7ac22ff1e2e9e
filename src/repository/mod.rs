//! Storage seams for sessions and conflicts.
//!
//! The engine never talks to a database directly. It drives two async
//! repository traits; [`memory`] provides in-process implementations used
//! by tests and embedders that keep the timetable in memory.
//!
//! # Thread Safety
//! Implementations must be `Send + Sync`. The pipeline serializes its own
//! mutations, but reads may run concurrently with them.

mod error;
pub mod memory;

use async_trait::async_trait;

use crate::models::{Conflict, ConflictId, Session, SessionId, Severity};

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use memory::{InMemoryConflictRepository, InMemorySessionRepository};

/// Session storage.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// All sessions.
    async fn list_sessions(&self) -> RepositoryResult<Vec<Session>>;

    /// One session, if it exists.
    async fn get_session(&self, id: SessionId) -> RepositoryResult<Option<Session>>;

    /// Stores a new session. Fails if the id is taken.
    async fn insert_session(&self, session: Session) -> RepositoryResult<()>;

    /// Replaces an existing session. Fails with `NotFound` if absent.
    async fn replace_session(&self, session: Session) -> RepositoryResult<()>;

    /// Removes a session. Returns whether it existed.
    async fn delete_session(&self, id: SessionId) -> RepositoryResult<bool>;
}

/// Conflict storage.
#[async_trait]
pub trait ConflictRepository: Send + Sync {
    /// Stored conflicts, optionally only unresolved ones.
    async fn list_conflicts(&self, unresolved_only: bool) -> RepositoryResult<Vec<Conflict>>;

    /// One conflict, if it exists.
    async fn get_conflict(&self, id: ConflictId) -> RepositoryResult<Option<Conflict>>;

    /// Stores new conflict records.
    async fn insert_conflicts(&self, conflicts: Vec<Conflict>) -> RepositoryResult<()>;

    /// Refreshes the severity of a stored conflict.
    async fn update_severity(&self, id: ConflictId, severity: Severity) -> RepositoryResult<()>;

    /// Removes conflict records. Returns how many existed.
    async fn delete_conflicts(&self, ids: &[ConflictId]) -> RepositoryResult<usize>;

    /// Marks a conflict resolved and returns the updated record.
    ///
    /// Fails with `NotFound` if absent.
    async fn resolve_conflict(
        &self,
        id: ConflictId,
        notes: Option<String>,
    ) -> RepositoryResult<Conflict>;
}
