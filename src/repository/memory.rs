//! In-memory repositories.
//!
//! State lives behind a `parking_lot::RwLock`; no lock is held across an
//! await point.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    ConflictRepository, ErrorContext, RepositoryError, RepositoryResult, SessionRepository,
};
use crate::models::{Conflict, ConflictId, Session, SessionId, Severity};

/// Sessions kept in a hash map.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the repository, bypassing the engine.
    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let repo = Self::new();
        repo.sessions
            .write()
            .extend(sessions.into_iter().map(|s| (s.id, s)));
        repo
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn list_sessions(&self) -> RepositoryResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn get_session(&self, id: SessionId) -> RepositoryResult<Option<Session>> {
        Ok(self.sessions.read().get(&id).cloned())
    }

    async fn insert_session(&self, session: Session) -> RepositoryResult<()> {
        check_slot(&session, "insert_session")?;
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.id) {
            return Err(RepositoryError::query_with_context(
                "session id already exists",
                ErrorContext::new("insert_session")
                    .with_entity("session")
                    .with_entity_id(session.id),
            ));
        }
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn replace_session(&self, session: Session) -> RepositoryResult<()> {
        check_slot(&session, "replace_session")?;
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&session.id) {
            Some(slot) => {
                *slot = session;
                Ok(())
            }
            None => Err(RepositoryError::not_found_with_context(
                "session does not exist",
                ErrorContext::new("replace_session")
                    .with_entity("session")
                    .with_entity_id(session.id),
            )),
        }
    }

    async fn delete_session(&self, id: SessionId) -> RepositoryResult<bool> {
        Ok(self.sessions.write().remove(&id).is_some())
    }
}

/// Rejects rows whose slot does not end after it starts.
fn check_slot(session: &Session, operation: &str) -> RepositoryResult<()> {
    if session.slot.is_well_formed() {
        return Ok(());
    }
    Err(RepositoryError::validation_with_context(
        format!("session slot {} does not end after it starts", session.slot),
        ErrorContext::new(operation)
            .with_entity("session")
            .with_entity_id(session.id),
    ))
}

/// Conflicts kept in a hash map.
#[derive(Debug, Default)]
pub struct InMemoryConflictRepository {
    conflicts: RwLock<HashMap<ConflictId, Conflict>>,
}

impl InMemoryConflictRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the repository, bypassing the engine.
    pub fn with_conflicts(conflicts: impl IntoIterator<Item = Conflict>) -> Self {
        let repo = Self::new();
        repo.conflicts
            .write()
            .extend(conflicts.into_iter().map(|c| (c.id, c)));
        repo
    }

    /// Number of stored conflicts, resolved included.
    pub fn len(&self) -> usize {
        self.conflicts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.read().is_empty()
    }
}

#[async_trait]
impl ConflictRepository for InMemoryConflictRepository {
    async fn list_conflicts(&self, unresolved_only: bool) -> RepositoryResult<Vec<Conflict>> {
        let mut conflicts: Vec<Conflict> = self
            .conflicts
            .read()
            .values()
            .filter(|c| !unresolved_only || !c.resolved)
            .cloned()
            .collect();
        conflicts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(conflicts)
    }

    async fn get_conflict(&self, id: ConflictId) -> RepositoryResult<Option<Conflict>> {
        Ok(self.conflicts.read().get(&id).cloned())
    }

    async fn insert_conflicts(&self, conflicts: Vec<Conflict>) -> RepositoryResult<()> {
        let mut stored = self.conflicts.write();
        if let Some(taken) = conflicts.iter().find(|c| stored.contains_key(&c.id)) {
            return Err(RepositoryError::query_with_context(
                "conflict id already exists",
                ErrorContext::new("insert_conflicts")
                    .with_entity("conflict")
                    .with_entity_id(taken.id),
            ));
        }
        stored.extend(conflicts.into_iter().map(|c| (c.id, c)));
        Ok(())
    }

    async fn update_severity(&self, id: ConflictId, severity: Severity) -> RepositoryResult<()> {
        match self.conflicts.write().get_mut(&id) {
            Some(conflict) => {
                conflict.severity = severity;
                Ok(())
            }
            None => Err(RepositoryError::not_found_with_context(
                "conflict does not exist",
                ErrorContext::new("update_severity")
                    .with_entity("conflict")
                    .with_entity_id(id),
            )),
        }
    }

    async fn delete_conflicts(&self, ids: &[ConflictId]) -> RepositoryResult<usize> {
        let mut stored = self.conflicts.write();
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count())
    }

    async fn resolve_conflict(
        &self,
        id: ConflictId,
        notes: Option<String>,
    ) -> RepositoryResult<Conflict> {
        match self.conflicts.write().get_mut(&id) {
            Some(conflict) => {
                conflict.resolve(notes);
                Ok(conflict.clone())
            }
            None => Err(RepositoryError::not_found_with_context(
                "conflict does not exist",
                ErrorContext::new("resolve_conflict")
                    .with_entity("conflict")
                    .with_entity_id(id),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictCandidate, ConflictKey, ConflictType, SessionDraft, SessionType};
    use chrono::{NaiveTime, Utc};
    use uuid::Uuid;

    fn session() -> Session {
        SessionDraft::new("Algorithms", SessionType::Lecture)
            .with_department("CS")
            .with_lecturer("L1")
            .in_room("CS-101")
            .on_day(2)
            .between(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            )
            .with_capacity(60)
            .build(Uuid::new_v4(), Utc::now())
            .unwrap()
    }

    fn conflict() -> Conflict {
        let cand = ConflictCandidate::new(
            ConflictKey::pair(Uuid::new_v4(), Uuid::new_v4(), ConflictType::Room),
            Severity::Medium,
            "room clash",
        );
        Conflict::from_candidate(&cand, Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn test_session_crud() {
        let repo = InMemorySessionRepository::new();
        let s = session();
        repo.insert_session(s.clone()).await.unwrap();
        assert_eq!(repo.get_session(s.id).await.unwrap(), Some(s.clone()));

        let err = repo.insert_session(s.clone()).await.unwrap_err();
        assert!(!err.is_retryable());

        let mut edited = s.clone();
        edited.room = "CS-102".into();
        repo.replace_session(edited).await.unwrap();
        assert_eq!(repo.list_sessions().await.unwrap()[0].room, "CS-102");

        assert!(repo.delete_session(s.id).await.unwrap());
        assert!(!repo.delete_session(s.id).await.unwrap());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_slot_rejected() {
        let repo = InMemorySessionRepository::new();
        let mut s = session();
        s.slot.end = s.slot.start;

        let err = repo.insert_session(s.clone()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Validation { .. }));
        assert!(!err.is_retryable());
        assert_eq!(err.context().operation.as_deref(), Some("insert_session"));
        assert!(repo.is_empty());

        let good = session();
        repo.insert_session(good.clone()).await.unwrap();
        let mut bad = good.clone();
        bad.slot.end = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert!(repo.replace_session(bad).await.is_err());
        assert_eq!(repo.get_session(good.id).await.unwrap(), Some(good));
    }

    #[tokio::test]
    async fn test_replace_missing_session() {
        let repo = InMemorySessionRepository::new();
        let err = repo.replace_session(session()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_conflict_lifecycle() {
        let repo = InMemoryConflictRepository::new();
        let c = conflict();
        repo.insert_conflicts(vec![c.clone()]).await.unwrap();

        repo.update_severity(c.id, Severity::High).await.unwrap();
        assert_eq!(
            repo.get_conflict(c.id).await.unwrap().unwrap().severity,
            Severity::High
        );

        let resolved = repo
            .resolve_conflict(c.id, Some("moved to Friday".into()))
            .await
            .unwrap();
        assert!(resolved.resolved);
        assert!(repo.list_conflicts(true).await.unwrap().is_empty());
        assert_eq!(repo.list_conflicts(false).await.unwrap().len(), 1);

        assert_eq!(repo.delete_conflicts(&[c.id, Uuid::new_v4()]).await.unwrap(), 1);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_missing_conflict() {
        let repo = InMemoryConflictRepository::new();
        let err = repo.resolve_conflict(Uuid::new_v4(), None).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
