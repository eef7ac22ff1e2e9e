//! Mutation pipeline.
//!
//! Wraps create/update/delete of sessions: persist the change, re-detect
//! conflicts for the affected session, reconcile the conflict store.
//! Duplicates and batch operations follow the same path; a batch holds
//! the gate once and reconciles every touched session in one pass.
//!
//! # Ordering
//!
//! Every mutation (and [`MutationPipeline::rescan`]) holds the write half
//! of a gate for its whole read-detect-write sequence, so each incremental
//! check runs against a consistent snapshot. Reads take the read half.
//! Updates may carry the version the caller last saw; a mismatch fails
//! with [`EngineError::StaleVersion`] and writes nothing.
//!
//! # Failure model
//!
//! Validation, not-found and stale-version errors are returned before any
//! write. Repository calls are retried with backoff on transient errors.
//! Session writes are not idempotent, so a failed write is read back: if
//! an earlier attempt committed, the mutation carries on as committed. If
//! the read back fails too, [`MutationPipeline::needs_rescan`] is set.
//! Once the session write has committed, a failure to refresh the conflict
//! store does not fail the mutation: the outcome reports
//! `conflicts_fresh == false` and [`MutationPipeline::needs_rescan`] stays
//! set until the next successful full rescan.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::detector::ConflictDetector;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Conflict, ConflictCandidate, ConflictId, Directory, Session, SessionDraft, SessionId,
    SessionPatch,
};
use crate::reconcile::{
    find_orphans, reconcile, reconcile_scoped, ReconcilePlan, ReconcileReport, ReconcileScope,
};
use crate::report::{ConflictReport, ConflictView};
use crate::repository::{
    ConflictRepository, RepositoryError, RepositoryResult, SessionRepository,
};
use crate::retry::with_retry;
use crate::suggest::{Suggester, Suggestion};
use crate::validation::{self, ValidationError};

/// Result of a committed session mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// The session after the mutation (the removed session for deletes).
    pub session: Session,
    /// What the conflict refresh changed; `None` if it failed.
    pub reconcile: Option<ReconcileReport>,
    /// Whether the conflict store reflects this mutation.
    pub conflicts_fresh: bool,
}

/// Result of a committed batch mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Sessions written (removed sessions for deletes), in request order.
    pub sessions: Vec<Session>,
    /// What the conflict refresh changed; `None` if it failed.
    pub reconcile: Option<ReconcileReport>,
    /// Whether the conflict store reflects the batch.
    pub conflicts_fresh: bool,
}

/// Point-in-time copy of both stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub sessions: Vec<Session>,
    /// All stored conflicts, resolved included.
    pub conflicts: Vec<Conflict>,
}

impl Snapshot {
    /// Unresolved conflicts only.
    pub fn unresolved(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| !c.resolved)
    }
}

/// Serialized session mutations with conflict-store upkeep.
#[derive(Debug)]
pub struct MutationPipeline<S, C> {
    sessions: S,
    conflicts: C,
    detector: ConflictDetector,
    directory: Option<Directory>,
    config: EngineConfig,
    gate: RwLock<()>,
    needs_rescan: AtomicBool,
}

impl<S, C> MutationPipeline<S, C>
where
    S: SessionRepository,
    C: ConflictRepository,
{
    /// Creates a pipeline with the default configuration.
    pub fn new(sessions: S, conflicts: C) -> Self {
        let config = EngineConfig::default();
        Self {
            sessions,
            conflicts,
            detector: ConflictDetector::new(config.rule_set()),
            directory: None,
            config,
            gate: RwLock::new(()),
            needs_rescan: AtomicBool::new(false),
        }
    }

    /// Creates a pipeline with a validated configuration.
    pub fn with_config(sessions: S, conflicts: C, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let mut pipeline = Self::new(sessions, conflicts);
        pipeline.detector = ConflictDetector::new(config.rule_set());
        pipeline.config = config;
        Ok(pipeline)
    }

    /// Enables reference checks and room/lecturer suggestions.
    pub fn with_directory(mut self, directory: Directory) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn session_repository(&self) -> &S {
        &self.sessions
    }

    pub fn conflict_repository(&self) -> &C {
        &self.conflicts
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether an earlier conflict refresh failed and the store may be stale.
    pub fn needs_rescan(&self) -> bool {
        self.needs_rescan.load(Ordering::SeqCst)
    }

    // ==================== Mutations ====================

    /// Validates and stores a new session, then records its conflicts.
    pub async fn create(&self, draft: SessionDraft) -> EngineResult<MutationOutcome> {
        let _guard = self.gate.write().await;
        self.create_locked(draft).await
    }

    /// Stores a copy of a session, titled "<title> (Copy)".
    ///
    /// The copy keeps the slot, room and lecturer, so it is flagged as a
    /// duplicate booking until one of the two is moved.
    pub async fn duplicate(&self, id: SessionId) -> EngineResult<MutationOutcome> {
        let _guard = self.gate.write().await;
        let original = self
            .fetch_session(id)
            .await?
            .ok_or_else(|| EngineError::session_not_found(id))?;
        self.create_locked(original.copy_draft()).await
    }

    /// Applies a patch to a session, then refreshes its conflicts.
    ///
    /// A move (day, time or room change) is an update like any other, so
    /// conflicts the move did not affect keep their identity.
    pub async fn update(
        &self,
        id: SessionId,
        patch: SessionPatch,
        expected_version: Option<u64>,
    ) -> EngineResult<MutationOutcome> {
        let _guard = self.gate.write().await;

        let before = self
            .fetch_session(id)
            .await?
            .ok_or_else(|| EngineError::session_not_found(id))?;
        if let Some(expected) = expected_version {
            if expected != before.version {
                return Err(EngineError::StaleVersion {
                    id,
                    expected,
                    actual: before.version,
                });
            }
        }

        let after = self.patch_checked(&before, &patch)?;
        self.replace_record(&after).await?;
        info!(session_id = %id, version = after.version, "session updated");

        let refreshed = self
            .refresh(id, |all| {
                let update = self.detector.detect_update(&before, &after, all);
                debug!(
                    session_id = %id,
                    vanished = update.vanished().len(),
                    appeared = update.appeared().len(),
                    "update re-detection"
                );
                update.after
            })
            .await;
        Ok(self.outcome(after, refreshed))
    }

    /// Removes a session and drops the unresolved conflicts referencing it.
    ///
    /// Resolved conflicts referencing the session are kept as history.
    pub async fn delete(&self, id: SessionId) -> EngineResult<MutationOutcome> {
        let _guard = self.gate.write().await;

        let removed = self
            .fetch_session(id)
            .await?
            .ok_or_else(|| EngineError::session_not_found(id))?;
        self.delete_record(id).await?;
        info!(session_id = %id, title = %removed.title, "session deleted");

        let refreshed = self
            .refresh(id, |all| {
                let vanished = self.detector.detect_removal(&removed, all);
                debug!(session_id = %id, vanished = vanished.len(), "removal re-detection");
                Vec::new()
            })
            .await;
        Ok(self.outcome(removed, refreshed))
    }

    // ==================== Batch mutations ====================

    /// Duplicates several sessions under one hold of the gate.
    ///
    /// Repeated ids are copied once. Every source must exist and every copy
    /// must validate before anything is written.
    pub async fn duplicate_many(&self, ids: &[SessionId]) -> EngineResult<BatchOutcome> {
        let _guard = self.gate.write().await;

        let mut copies = Vec::new();
        for id in distinct(ids) {
            let original = self
                .fetch_session(id)
                .await?
                .ok_or_else(|| EngineError::session_not_found(id))?;
            copies.push(self.build_checked(original.copy_draft())?);
        }

        let mut written = BTreeSet::new();
        for copy in &copies {
            if let Err(e) = self.insert_record(copy).await {
                return Err(self.abort_batch(written, e).await);
            }
            written.insert(copy.id);
        }
        info!(count = copies.len(), "sessions duplicated");

        let refreshed = self.refresh_many(written).await;
        Ok(self.batch_outcome(copies, refreshed))
    }

    /// Applies one patch per session under one hold of the gate.
    ///
    /// All-or-nothing up front: an unknown id, a repeated id or a patch
    /// that fails validation rejects the whole batch before any write.
    pub async fn update_many(
        &self,
        changes: Vec<(SessionId, SessionPatch)>,
    ) -> EngineResult<BatchOutcome> {
        let _guard = self.gate.write().await;

        let mut seen = HashSet::new();
        let duplicates: Vec<ValidationError> = changes
            .iter()
            .filter(|(id, _)| !seen.insert(*id))
            .map(|(id, _)| ValidationError::duplicate_id(*id))
            .collect();
        if !duplicates.is_empty() {
            return Err(duplicates.into());
        }

        let mut updated = Vec::with_capacity(changes.len());
        for (id, patch) in &changes {
            let before = self
                .fetch_session(*id)
                .await?
                .ok_or_else(|| EngineError::session_not_found(*id))?;
            updated.push(self.patch_checked(&before, patch)?);
        }

        let mut written = BTreeSet::new();
        for after in &updated {
            if let Err(e) = self.replace_record(after).await {
                return Err(self.abort_batch(written, e).await);
            }
            written.insert(after.id);
        }
        info!(count = updated.len(), "sessions updated");

        let refreshed = self.refresh_many(written).await;
        Ok(self.batch_outcome(updated, refreshed))
    }

    /// Applies the same patch to several sessions (bulk move).
    pub async fn move_many(
        &self,
        ids: &[SessionId],
        patch: SessionPatch,
    ) -> EngineResult<BatchOutcome> {
        let changes = distinct(ids)
            .into_iter()
            .map(|id| (id, patch.clone()))
            .collect();
        self.update_many(changes).await
    }

    /// Removes several sessions under one hold of the gate.
    ///
    /// Repeated ids are removed once. An unknown id rejects the whole batch
    /// before any write.
    pub async fn delete_many(&self, ids: &[SessionId]) -> EngineResult<BatchOutcome> {
        let _guard = self.gate.write().await;

        let mut removed = Vec::new();
        for id in distinct(ids) {
            let session = self
                .fetch_session(id)
                .await?
                .ok_or_else(|| EngineError::session_not_found(id))?;
            removed.push(session);
        }

        let mut written = BTreeSet::new();
        for session in &removed {
            if let Err(e) = self.delete_record(session.id).await {
                return Err(self.abort_batch(written, e).await);
            }
            written.insert(session.id);
        }
        info!(count = removed.len(), "sessions deleted");

        let refreshed = self.refresh_many(written).await;
        Ok(self.batch_outcome(removed, refreshed))
    }

    /// Marks a stored conflict resolved.
    ///
    /// Resolving an already resolved conflict only replaces its notes.
    pub async fn resolve(&self, id: ConflictId, notes: Option<String>) -> EngineResult<Conflict> {
        let _guard = self.gate.write().await;
        let repo = &self.conflicts;
        let result = with_retry(&self.config.retry, "resolve_conflict", move || {
            repo.resolve_conflict(id, notes.clone())
        })
        .await;
        match result {
            Ok(conflict) => {
                info!(conflict_id = %id, "conflict resolved");
                Ok(conflict)
            }
            Err(e) if e.is_not_found() => Err(EngineError::conflict_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Recomputes every conflict and reconciles the whole store.
    ///
    /// Also prunes unresolved conflicts that reference missing sessions.
    /// Clears [`needs_rescan`](Self::needs_rescan) on success.
    pub async fn rescan(&self) -> EngineResult<ReconcileReport> {
        let _guard = self.gate.write().await;

        let sessions = self.list_sessions().await?;
        if let Err(errors) = validation::validate_sessions(&sessions) {
            for e in &errors {
                warn!(error = %e, "stored session failed validation");
            }
        }
        let candidates = self.detector.detect_full(&sessions);

        let existing = self.list_conflicts(false).await?;
        let known: HashSet<SessionId> = sessions.iter().map(|s| s.id).collect();
        let orphans = find_orphans(&existing, &known);
        let live: Vec<Conflict> = existing
            .into_iter()
            .filter(|c| !orphans.contains(&c.id))
            .collect();

        let mut plan = reconcile(&candidates, &live);
        let orphans_pruned = orphans.len();
        plan.to_delete.extend(orphans);

        let mut report = self.apply_plan(&plan).await?;
        report.deleted -= orphans_pruned;
        report.orphans_pruned = orphans_pruned;
        self.needs_rescan.store(false, Ordering::SeqCst);

        info!(
            sessions = sessions.len(),
            inserted = report.inserted,
            deleted = report.deleted,
            updated = report.updated,
            orphans_pruned,
            "full rescan"
        );
        Ok(report)
    }

    // ==================== Reads ====================

    /// Consistent copy of sessions and conflicts.
    pub async fn snapshot(&self) -> EngineResult<Snapshot> {
        let _guard = self.gate.read().await;
        Ok(Snapshot {
            sessions: self.list_sessions().await?,
            conflicts: self.list_conflicts(false).await?,
        })
    }

    /// Stored conflicts joined with their sessions.
    pub async fn conflict_views(&self, unresolved_only: bool) -> EngineResult<Vec<ConflictView>> {
        let _guard = self.gate.read().await;
        let sessions = self.list_sessions().await?;
        let conflicts = self.list_conflicts(unresolved_only).await?;
        Ok(ConflictView::join(&conflicts, &sessions))
    }

    /// Conflict and room-usage summary.
    pub async fn report(&self) -> EngineResult<ConflictReport> {
        let snapshot = self.snapshot().await?;
        Ok(ConflictReport::calculate_with_week(
            &snapshot.sessions,
            &snapshot.conflicts,
            self.config.week_minutes(),
        ))
    }

    /// Resolution suggestions for a stored conflict.
    pub async fn suggest(&self, id: ConflictId) -> EngineResult<Vec<Suggestion>> {
        let _guard = self.gate.read().await;
        let repo = &self.conflicts;
        let conflict = with_retry(&self.config.retry, "get_conflict", move || {
            repo.get_conflict(id)
        })
        .await?
        .ok_or_else(|| EngineError::conflict_not_found(id))?;
        let sessions = self.list_sessions().await?;

        let mut suggester = Suggester::new(&self.config.suggest);
        if let Some(directory) = &self.directory {
            suggester = suggester.with_directory(directory);
        }
        Ok(suggester.suggest(&conflict, &sessions))
    }

    // ==================== Internals ====================

    /// Re-detects for one session and reconciles the conflicts involving it.
    async fn refresh<F>(&self, id: SessionId, detect: F) -> RepositoryResult<ReconcileReport>
    where
        F: FnOnce(&[Session]) -> Vec<ConflictCandidate>,
    {
        let sessions = self.list_sessions().await?;
        let candidates = detect(sessions.as_slice());
        let existing = self.list_conflicts(true).await?;
        let plan = reconcile_scoped(&candidates, &existing, ReconcileScope::Session(id));
        debug!(
            session_id = %id,
            insert = plan.to_insert.len(),
            delete = plan.to_delete.len(),
            update = plan.to_update.len(),
            "reconcile plan"
        );
        self.apply_plan(&plan).await
    }

    /// Re-detects for every touched session and reconciles in one pass.
    ///
    /// Sessions that no longer exist contribute no candidates, so their
    /// unresolved conflicts are dropped.
    async fn refresh_many(
        &self,
        touched: BTreeSet<SessionId>,
    ) -> RepositoryResult<ReconcileReport> {
        let sessions = self.list_sessions().await?;
        let candidates: Vec<ConflictCandidate> = sessions
            .iter()
            .filter(|s| touched.contains(&s.id))
            .flat_map(|s| self.detector.detect_incremental(s, &sessions))
            .collect();
        let existing = self.list_conflicts(true).await?;
        let count = touched.len();
        let plan = reconcile_scoped(&candidates, &existing, ReconcileScope::Sessions(touched));
        debug!(
            sessions = count,
            insert = plan.to_insert.len(),
            delete = plan.to_delete.len(),
            update = plan.to_update.len(),
            "batch reconcile plan"
        );
        self.apply_plan(&plan).await
    }

    async fn apply_plan(&self, plan: &ReconcilePlan) -> RepositoryResult<ReconcileReport> {
        let repo = &self.conflicts;
        let policy = &self.config.retry;

        if !plan.to_delete.is_empty() {
            let ids = plan.to_delete.as_slice();
            with_retry(policy, "delete_conflicts", move || repo.delete_conflicts(ids)).await?;
        }
        for change in &plan.to_update {
            let (id, severity) = (change.id, change.to);
            with_retry(policy, "update_severity", move || {
                repo.update_severity(id, severity)
            })
            .await?;
        }
        if !plan.to_insert.is_empty() {
            let now = Utc::now();
            let records: Vec<Conflict> = plan
                .to_insert
                .iter()
                .map(|c| Conflict::from_candidate(c, Uuid::new_v4(), now))
                .collect();
            let records = &records;
            with_retry(policy, "insert_conflicts", move || {
                repo.insert_conflicts(records.clone())
            })
            .await?;
        }

        Ok(ReconcileReport {
            inserted: plan.to_insert.len(),
            deleted: plan.to_delete.len(),
            updated: plan.to_update.len(),
            orphans_pruned: 0,
        })
    }

    async fn create_locked(&self, draft: SessionDraft) -> EngineResult<MutationOutcome> {
        let session = self.build_checked(draft)?;
        self.insert_record(&session).await?;
        info!(session_id = %session.id, title = %session.title, "session created");

        let refreshed = self
            .refresh(session.id, |all| self.detector.detect_incremental(&session, all))
            .await;
        Ok(self.outcome(session, refreshed))
    }

    fn build_checked(&self, draft: SessionDraft) -> EngineResult<Session> {
        validation::validate_with_directory(&draft, self.directory.as_ref())?;
        Ok(draft.build(Uuid::new_v4(), Utc::now())?)
    }

    fn patch_checked(&self, before: &Session, patch: &SessionPatch) -> EngineResult<Session> {
        let after = before.patched(patch)?;
        if let Some(directory) = &self.directory {
            validation::validate_references(&SessionDraft::from(&after), directory)?;
        }
        Ok(after)
    }

    /// Inserts a session row.
    ///
    /// A retried insert can fail after an earlier attempt committed without
    /// its acknowledgement arriving. The id is fresh, so a stored row equal
    /// to `session` is that attempt.
    async fn insert_record(&self, session: &Session) -> EngineResult<()> {
        let repo = &self.sessions;
        let result = with_retry(&self.config.retry, "insert_session", move || {
            repo.insert_session(session.clone())
        })
        .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.confirm_write(session.id, e, |stored| stored == Some(session))
                    .await
            }
        }
    }

    async fn replace_record(&self, session: &Session) -> EngineResult<()> {
        let repo = &self.sessions;
        let result = with_retry(&self.config.retry, "replace_session", move || {
            repo.replace_session(session.clone())
        })
        .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.confirm_write(session.id, e, |stored| stored == Some(session))
                    .await
            }
        }
    }

    /// Deletes a session row whose existence was checked under the gate.
    ///
    /// `false` from the store therefore means an earlier attempt removed it.
    async fn delete_record(&self, id: SessionId) -> EngineResult<()> {
        let repo = &self.sessions;
        let result = with_retry(&self.config.retry, "delete_session", move || {
            repo.delete_session(id)
        })
        .await;
        match result {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(session_id = %id, "session already gone on delete");
                Ok(())
            }
            Err(e) => self.confirm_write(id, e, |stored| stored.is_none()).await,
        }
    }

    /// Reads a row back after a failed write and decides whether the write
    /// committed anyway.
    ///
    /// If the read fails too, the outcome is unknown: the conflict store is
    /// flagged for a rescan and the write error is returned.
    async fn confirm_write<F>(
        &self,
        id: SessionId,
        error: RepositoryError,
        committed: F,
    ) -> EngineResult<()>
    where
        F: FnOnce(Option<&Session>) -> bool,
    {
        match self.fetch_session(id).await {
            Ok(stored) => {
                if !committed(stored.as_ref()) {
                    return Err(error.into());
                }
                warn!(
                    session_id = %id,
                    error = %error,
                    "session write reported an error but committed"
                );
                Ok(())
            }
            Err(read_error) => {
                warn!(
                    session_id = %id,
                    error = %error,
                    read_error = %read_error,
                    "session write outcome unknown; full rescan required"
                );
                self.needs_rescan.store(true, Ordering::SeqCst);
                Err(error.into())
            }
        }
    }

    /// Brings conflicts in line with the writes a failed batch committed,
    /// then hands back the error.
    async fn abort_batch(
        &self,
        written: BTreeSet<SessionId>,
        error: EngineError,
    ) -> EngineError {
        if written.is_empty() {
            return error;
        }
        let ids: Vec<SessionId> = written.iter().copied().collect();
        warn!(committed = ids.len(), error = %error, "batch mutation failed part way");
        let refreshed = self.refresh_many(written).await;
        self.settle(refreshed, &ids);
        error
    }

    /// Unwraps a refresh result, flagging a rescan on failure.
    fn settle(
        &self,
        refreshed: RepositoryResult<ReconcileReport>,
        touched: &[SessionId],
    ) -> Option<ReconcileReport> {
        match refreshed {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(
                    sessions = ?touched,
                    error = %e,
                    "conflict refresh failed; full rescan required"
                );
                self.needs_rescan.store(true, Ordering::SeqCst);
                None
            }
        }
    }

    fn outcome(
        &self,
        session: Session,
        refreshed: RepositoryResult<ReconcileReport>,
    ) -> MutationOutcome {
        let reconcile = self.settle(refreshed, &[session.id]);
        MutationOutcome {
            session,
            conflicts_fresh: reconcile.is_some(),
            reconcile,
        }
    }

    fn batch_outcome(
        &self,
        sessions: Vec<Session>,
        refreshed: RepositoryResult<ReconcileReport>,
    ) -> BatchOutcome {
        let ids: Vec<SessionId> = sessions.iter().map(|s| s.id).collect();
        let reconcile = self.settle(refreshed, &ids);
        BatchOutcome {
            sessions,
            conflicts_fresh: reconcile.is_some(),
            reconcile,
        }
    }

    async fn fetch_session(&self, id: SessionId) -> RepositoryResult<Option<Session>> {
        let repo = &self.sessions;
        with_retry(&self.config.retry, "get_session", move || repo.get_session(id)).await
    }

    async fn list_sessions(&self) -> RepositoryResult<Vec<Session>> {
        let repo = &self.sessions;
        with_retry(&self.config.retry, "list_sessions", move || repo.list_sessions()).await
    }

    async fn list_conflicts(&self, unresolved_only: bool) -> RepositoryResult<Vec<Conflict>> {
        let repo = &self.conflicts;
        with_retry(&self.config.retry, "list_conflicts", move || {
            repo.list_conflicts(unresolved_only)
        })
        .await
    }
}

/// Ids in first-seen order without repeats.
fn distinct(ids: &[SessionId]) -> Vec<SessionId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
