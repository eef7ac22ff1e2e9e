//! Conflict-store reconciliation.
//!
//! Diffs freshly detected candidates against stored unresolved conflicts
//! and produces a plan:
//!
//! 1. Candidates with no stored match (by [`ConflictKey`]) are inserted.
//! 2. Stored unresolved conflicts with no candidate are deleted. A vanished
//!    condition is removed, not marked resolved: resolution is a human act.
//! 3. Matches are kept, preserving id, timestamp and notes. Only the
//!    severity is refreshed when it changed.
//! 4. Resolved conflicts are history. They never match a candidate, so a
//!    condition that reappears after resolution gets a new record.
//!
//! Applying a plan and reconciling again with the same candidates yields
//! an empty plan.
//!
//! # Scope
//! An incremental scan only speaks for pairs involving one session, so its
//! candidates must only be diffed against stored conflicts involving that
//! session. [`reconcile_scoped`] applies that filter. A batch mutation
//! speaks for every session it touched.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::models::{Conflict, ConflictCandidate, ConflictId, ConflictKey, SessionId, Severity};

/// Which stored conflicts a candidate list speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileScope {
    /// Every stored conflict (full rescan).
    All,
    /// Stored conflicts involving one session (incremental scan).
    Session(SessionId),
    /// Stored conflicts involving any of these sessions (batch mutation).
    Sessions(BTreeSet<SessionId>),
}

impl ReconcileScope {
    /// Whether a key falls in this scope.
    pub fn covers(&self, key: &ConflictKey) -> bool {
        match self {
            Self::All => true,
            Self::Session(id) => key.involves(*id),
            Self::Sessions(ids) => key.session_ids().any(|id| ids.contains(&id)),
        }
    }
}

/// Severity refresh for a conflict that persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityChange {
    pub id: ConflictId,
    pub from: Severity,
    pub to: Severity,
}

/// Changes needed to make the stored unresolved set mirror the candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// New conflicts to store, sorted by key.
    pub to_insert: Vec<ConflictCandidate>,
    /// Stored conflicts whose condition no longer holds.
    pub to_delete: Vec<ConflictId>,
    /// Persisting conflicts whose severity changed.
    pub to_update: Vec<SeverityChange>,
}

impl ReconcilePlan {
    /// Whether the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty() && self.to_update.is_empty()
    }

    /// Applies the plan to an in-memory conflict list.
    ///
    /// New records get fresh ids and `now` as their creation time.
    pub fn apply_to(&self, conflicts: &mut Vec<Conflict>, now: DateTime<Utc>) {
        let deleted: HashSet<ConflictId> = self.to_delete.iter().copied().collect();
        conflicts.retain(|c| !deleted.contains(&c.id));
        for change in &self.to_update {
            if let Some(c) = conflicts.iter_mut().find(|c| c.id == change.id) {
                c.severity = change.to;
            }
        }
        conflicts.extend(
            self.to_insert
                .iter()
                .map(|cand| Conflict::from_candidate(cand, Uuid::new_v4(), now)),
        );
    }
}

/// Counts of what a reconciliation actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub deleted: usize,
    pub updated: usize,
    /// Conflicts pruned because they referenced a missing session.
    pub orphans_pruned: usize,
}

impl ReconcileReport {
    /// Whether anything changed.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Diffs candidates against stored conflicts.
///
/// Resolved entries in `existing` are ignored. If several unresolved
/// entries share a key, the oldest is kept and the rest are deleted.
pub fn reconcile(candidates: &[ConflictCandidate], existing: &[Conflict]) -> ReconcilePlan {
    reconcile_scoped(candidates, existing, ReconcileScope::All)
}

/// Diffs candidates against the stored conflicts inside `scope`.
///
/// Candidates outside the scope are ignored as well, so a caller cannot
/// insert conflicts the scan did not speak for.
pub fn reconcile_scoped(
    candidates: &[ConflictCandidate],
    existing: &[Conflict],
    scope: ReconcileScope,
) -> ReconcilePlan {
    let mut wanted: BTreeMap<ConflictKey, &ConflictCandidate> = BTreeMap::new();
    for cand in candidates.iter().filter(|c| scope.covers(&c.key)) {
        wanted.entry(cand.key).or_insert(cand);
    }

    // Oldest unresolved record per key wins; ties broken by id.
    let mut stored: Vec<&Conflict> = existing
        .iter()
        .filter(|c| !c.resolved && scope.covers(&c.key()))
        .collect();
    stored.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut plan = ReconcilePlan::default();
    let mut matched: BTreeSet<ConflictKey> = BTreeSet::new();

    for conflict in stored {
        let key = conflict.key();
        match wanted.get(&key) {
            Some(cand) if matched.insert(key) => {
                if cand.severity != conflict.severity {
                    plan.to_update.push(SeverityChange {
                        id: conflict.id,
                        from: conflict.severity,
                        to: cand.severity,
                    });
                }
            }
            // Condition gone, or a second record for an already matched key.
            _ => plan.to_delete.push(conflict.id),
        }
    }

    plan.to_insert = wanted
        .into_iter()
        .filter(|(key, _)| !matched.contains(key))
        .map(|(_, cand)| cand.clone())
        .collect();

    plan
}

/// Unresolved conflicts that cannot describe a real condition.
///
/// Covers rows referencing a session that no longer exists and rows
/// pairing a session with itself. Outside the delete path either means
/// the store was edited behind the engine's back. Conflicts are a derived
/// cache, so the orphans are reported for pruning instead of failing.
pub fn find_orphans(existing: &[Conflict], known: &HashSet<SessionId>) -> Vec<ConflictId> {
    existing
        .iter()
        .filter(|c| !c.resolved)
        .filter_map(|c| {
            let reason = if c.is_self_referencing() {
                "conflict pairs a session with itself"
            } else if c.key().session_ids().any(|id| !known.contains(&id)) {
                "conflict references a missing session"
            } else {
                return None;
            };
            warn!(
                conflict_id = %c.id,
                original = %c.original_session_id,
                conflicting = ?c.conflicting_session_id,
                "store inconsistency: {reason}"
            );
            Some(c.id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictType;
    use chrono::Duration;

    fn cand(a: SessionId, b: SessionId, t: ConflictType, s: Severity) -> ConflictCandidate {
        ConflictCandidate::new(ConflictKey::pair(a, b, t), s, "")
    }

    fn stored(c: &ConflictCandidate) -> Conflict {
        Conflict::from_candidate(c, Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_insert_new() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = cand(a, b, ConflictType::Lecturer, Severity::High);
        let plan = reconcile(std::slice::from_ref(&c), &[]);
        assert_eq!(plan.to_insert, vec![c]);
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_delete_vanished() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let old = stored(&cand(a, b, ConflictType::Room, Severity::Medium));
        let plan = reconcile(&[], std::slice::from_ref(&old));
        assert_eq!(plan.to_delete, vec![old.id]);
        assert!(plan.to_insert.is_empty());
    }

    #[test]
    fn test_keep_matching() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = cand(a, b, ConflictType::Room, Severity::Medium);
        let mut old = stored(&c);
        old.resolution_notes = Some("checking with registry".into());
        let plan = reconcile(std::slice::from_ref(&c), &[old]);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_severity_refresh_preserves_identity() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let old = stored(&cand(a, b, ConflictType::Lecturer, Severity::Medium));
        let now = cand(a, b, ConflictType::Lecturer, Severity::High);
        let plan = reconcile(&[now], std::slice::from_ref(&old));
        assert!(plan.to_insert.is_empty());
        assert!(plan.to_delete.is_empty());
        assert_eq!(
            plan.to_update,
            vec![SeverityChange {
                id: old.id,
                from: Severity::Medium,
                to: Severity::High
            }]
        );
    }

    #[test]
    fn test_type_change_replaces_record() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let old = stored(&cand(a, b, ConflictType::Room, Severity::Medium));
        let now = cand(a, b, ConflictType::Lecturer, Severity::High);
        let plan = reconcile(std::slice::from_ref(&now), std::slice::from_ref(&old));
        assert_eq!(plan.to_insert, vec![now]);
        assert_eq!(plan.to_delete, vec![old.id]);
    }

    #[test]
    fn test_resolved_never_matches() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = cand(a, b, ConflictType::Lecturer, Severity::High);
        let mut old = stored(&c);
        old.resolve(Some("approved by dean".into()));
        let plan = reconcile(std::slice::from_ref(&c), std::slice::from_ref(&old));
        assert_eq!(plan.to_insert, vec![c]);
        assert!(plan.to_delete.is_empty()); // history is kept
    }

    #[test]
    fn test_duplicate_records_keep_oldest() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = cand(a, b, ConflictType::Room, Severity::Medium);
        let mut older = stored(&c);
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = stored(&c);
        let plan = reconcile(std::slice::from_ref(&c), &[newer.clone(), older]);
        assert_eq!(plan.to_delete, vec![newer.id]);
        assert!(plan.to_insert.is_empty());
    }

    #[test]
    fn test_idempotent_after_apply() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let candidates = vec![
            cand(a, b, ConflictType::Lecturer, Severity::High),
            cand(b, c, ConflictType::Overlap, Severity::Low),
        ];
        let mut conflicts = vec![stored(&cand(a, c, ConflictType::Room, Severity::Medium))];

        let first = reconcile(&candidates, &conflicts);
        assert!(!first.is_empty());
        first.apply_to(&mut conflicts, Utc::now());

        let second = reconcile(&candidates, &conflicts);
        assert!(second.is_empty());
        assert_eq!(conflicts.len(), 2);
    }

    #[test]
    fn test_scope_leaves_unrelated_conflicts() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let unrelated = stored(&cand(c, d, ConflictType::Room, Severity::Medium));
        let involving = stored(&cand(a, b, ConflictType::Room, Severity::Medium));
        let plan = reconcile_scoped(
            &[],
            &[unrelated, involving.clone()],
            ReconcileScope::Session(a),
        );
        assert_eq!(plan.to_delete, vec![involving.id]);
    }

    #[test]
    fn test_scope_filters_candidates() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let outside = cand(b, c, ConflictType::Room, Severity::Medium);
        let plan = reconcile_scoped(&[outside], &[], ReconcileScope::Session(a));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_find_orphans() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = stored(&cand(a, b, ConflictType::Room, Severity::Medium));
        let mut resolved = stored(&cand(a, b, ConflictType::Lecturer, Severity::High));
        resolved.resolve(None);

        let known: HashSet<SessionId> = [a].into_iter().collect();
        assert_eq!(find_orphans(&[c.clone(), resolved], &known), vec![c.id]);

        let all: HashSet<SessionId> = [a, b].into_iter().collect();
        assert!(find_orphans(&[c], &all).is_empty());
    }

    #[test]
    fn test_find_orphans_flags_self_pairs() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut corrupt = stored(&cand(a, b, ConflictType::Room, Severity::Medium));
        corrupt.conflicting_session_id = Some(corrupt.original_session_id);

        let known: HashSet<SessionId> = [a, b].into_iter().collect();
        assert_eq!(find_orphans(&[corrupt.clone()], &known), vec![corrupt.id]);

        // Never matches a candidate, so a scoped pass drops it too.
        let plan = reconcile_scoped(
            &[],
            &[corrupt.clone()],
            ReconcileScope::Session(corrupt.original_session_id),
        );
        assert_eq!(plan.to_delete, vec![corrupt.id]);
    }

    #[test]
    fn test_sessions_scope_covers_every_touched_session() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let ab = stored(&cand(a, b, ConflictType::Room, Severity::Medium));
        let cd = stored(&cand(c, d, ConflictType::Lecturer, Severity::High));
        let bd = stored(&cand(b, d, ConflictType::Overlap, Severity::Low));
        let fresh = cand(a, d, ConflictType::Room, Severity::Medium);

        let touched: BTreeSet<SessionId> = [a, c].into_iter().collect();
        let plan = reconcile_scoped(
            &[fresh.clone()],
            &[ab.clone(), cd.clone(), bd],
            ReconcileScope::Sessions(touched),
        );
        let mut deleted = plan.to_delete.clone();
        deleted.sort();
        let mut expected = vec![ab.id, cd.id];
        expected.sort();
        assert_eq!(deleted, expected);
        assert_eq!(plan.to_insert, vec![fresh]);
    }

    #[test]
    fn test_report_noop() {
        assert!(ReconcileReport::default().is_noop());
        let r = ReconcileReport {
            inserted: 1,
            ..Default::default()
        };
        assert!(!r.is_noop());
    }
}
