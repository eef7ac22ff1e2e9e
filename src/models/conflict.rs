//! Conflict model.
//!
//! A conflict is a detected incompatibility between two sessions
//! (lecturer clash, room clash, generic overlap) or a single session
//! whose students exceed its room capacity.
//!
//! # Identity
//! Detection identifies a conflict by its [`ConflictKey`]: the unordered
//! session pair plus the conflict type. The pair is stored ordered by
//! session id so the "original"/"conflicting" roles stay stable for display.
//! Stored conflicts additionally carry their own [`ConflictId`], which is
//! preserved across reconciliations for as long as the key keeps matching.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::SessionId;

/// Stored conflict identifier.
pub type ConflictId = Uuid;

/// Classification of conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    /// Same lecturer booked twice at overlapping times.
    Lecturer,
    /// Same room booked twice at overlapping times.
    Room,
    /// Students exceed the declared room capacity (single session).
    Capacity,
    /// Other overlap flagged for awareness (e.g. same department).
    Overlap,
}

impl ConflictType {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lecturer => "lecturer",
            Self::Room => "room",
            Self::Capacity => "capacity",
            Self::Overlap => "overlap",
        }
    }

    /// Whether conflicts of this type involve two sessions.
    #[inline]
    pub fn is_pairwise(self) -> bool {
        !matches!(self, Self::Capacity)
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative urgency, ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matching identity of a conflict: session pair plus type.
///
/// `first < second` always holds for pairs; `second` is `None` for
/// single-session (capacity) conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConflictKey {
    pub first: SessionId,
    pub second: Option<SessionId>,
    pub conflict_type: ConflictType,
}

impl ConflictKey {
    /// Key for a two-session conflict. Argument order does not matter.
    pub fn pair(a: SessionId, b: SessionId, conflict_type: ConflictType) -> Self {
        debug_assert_ne!(a, b, "a session cannot conflict with itself");
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first,
            second: Some(second),
            conflict_type,
        }
    }

    /// Key for a single-session conflict.
    pub fn single(session: SessionId, conflict_type: ConflictType) -> Self {
        Self {
            first: session,
            second: None,
            conflict_type,
        }
    }

    /// Whether the key references the given session.
    #[inline]
    pub fn involves(&self, session: SessionId) -> bool {
        self.first == session || self.second == Some(session)
    }

    /// Referenced session ids.
    pub fn session_ids(&self) -> impl Iterator<Item = SessionId> {
        std::iter::once(self.first).chain(self.second)
    }
}

/// A freshly detected conflict, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictCandidate {
    /// Pair and type.
    pub key: ConflictKey,
    /// Derived severity.
    pub severity: Severity,
    /// Overlapping minutes (0 for capacity conflicts).
    pub overlap_minutes: u32,
    /// Human-readable description.
    pub description: String,
}

impl ConflictCandidate {
    /// Creates a candidate.
    pub fn new(key: ConflictKey, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            key,
            severity,
            overlap_minutes: 0,
            description: description.into(),
        }
    }

    /// Sets the overlap in minutes.
    pub fn with_overlap(mut self, minutes: u32) -> Self {
        self.overlap_minutes = minutes;
        self
    }

    /// Conflict type.
    #[inline]
    pub fn conflict_type(&self) -> ConflictType {
        self.key.conflict_type
    }
}

/// A stored conflict record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique conflict identifier.
    pub id: ConflictId,
    /// Lower-id session of the pair (or the only session).
    pub original_session_id: SessionId,
    /// Higher-id session of the pair; `None` for capacity conflicts.
    pub conflicting_session_id: Option<SessionId>,
    /// Conflict type.
    pub conflict_type: ConflictType,
    /// Severity at detection time (refreshed while unresolved).
    pub severity: Severity,
    /// Set by an explicit administrator resolution.
    pub resolved: bool,
    /// Free-text resolution notes.
    pub resolution_notes: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Conflict {
    /// Materializes a candidate into a new unresolved record.
    pub fn from_candidate(
        candidate: &ConflictCandidate,
        id: ConflictId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            original_session_id: candidate.key.first,
            conflicting_session_id: candidate.key.second,
            conflict_type: candidate.key.conflict_type,
            severity: candidate.severity,
            resolved: false,
            resolution_notes: None,
            description: candidate.description.clone(),
            created_at,
        }
    }

    /// Matching key.
    ///
    /// Built without the pair checks so a corrupted row still yields a key.
    /// A self-referencing row never matches a detected candidate.
    pub fn key(&self) -> ConflictKey {
        let first = self.original_session_id;
        match self.conflicting_session_id {
            Some(other) => ConflictKey {
                first: first.min(other),
                second: Some(first.max(other)),
                conflict_type: self.conflict_type,
            },
            None => ConflictKey::single(first, self.conflict_type),
        }
    }

    /// Whether the row pairs a session with itself.
    #[inline]
    pub fn is_self_referencing(&self) -> bool {
        self.conflicting_session_id == Some(self.original_session_id)
    }

    /// Whether the record references the given session.
    #[inline]
    pub fn involves(&self, session: SessionId) -> bool {
        self.original_session_id == session || self.conflicting_session_id == Some(session)
    }

    /// Marks the conflict resolved.
    ///
    /// New notes replace earlier ones; `None` keeps what is there.
    pub fn resolve(&mut self, notes: Option<String>) {
        self.resolved = true;
        if notes.is_some() {
            self.resolution_notes = notes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_unordered() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let k1 = ConflictKey::pair(a, b, ConflictType::Lecturer);
        let k2 = ConflictKey::pair(b, a, ConflictType::Lecturer);
        assert_eq!(k1, k2);
        assert!(k1.first < k1.second.unwrap());
        assert!(k1.involves(a) && k1.involves(b));
        assert_eq!(k1.session_ids().count(), 2);
    }

    #[test]
    fn test_key_type_distinguishes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(
            ConflictKey::pair(a, b, ConflictType::Lecturer),
            ConflictKey::pair(a, b, ConflictType::Room)
        );
    }

    #[test]
    fn test_single_key() {
        let a = Uuid::new_v4();
        let k = ConflictKey::single(a, ConflictType::Capacity);
        assert!(k.involves(a));
        assert_eq!(k.session_ids().collect::<Vec<_>>(), vec![a]);
        assert!(!ConflictType::Capacity.is_pairwise());
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::ALL.iter().max(), Some(&Severity::Critical));
    }

    #[test]
    fn test_conflict_from_candidate_round_trips_key() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let cand = ConflictCandidate::new(
            ConflictKey::pair(a, b, ConflictType::Room),
            Severity::Medium,
            "Room CS-101 is double-booked",
        )
        .with_overlap(30);
        let c = Conflict::from_candidate(&cand, Uuid::new_v4(), Utc::now());
        assert_eq!(c.key(), cand.key);
        assert!(!c.resolved);
        assert!(c.involves(a));
        assert_eq!(c.description, "Room CS-101 is double-booked");
    }

    #[test]
    fn test_resolve_keeps_existing_notes_when_none() {
        let cand = ConflictCandidate::new(
            ConflictKey::single(Uuid::new_v4(), ConflictType::Capacity),
            Severity::High,
            "",
        );
        let mut c = Conflict::from_candidate(&cand, Uuid::new_v4(), Utc::now());
        c.resolution_notes = Some("waiting on facilities".into());
        c.resolve(None);
        assert!(c.resolved);
        assert_eq!(c.resolution_notes.as_deref(), Some("waiting on facilities"));
    }

    #[test]
    fn test_resolve_again_replaces_notes() {
        let cand = ConflictCandidate::new(
            ConflictKey::pair(Uuid::new_v4(), Uuid::new_v4(), ConflictType::Room),
            Severity::Medium,
            "",
        );
        let mut c = Conflict::from_candidate(&cand, Uuid::new_v4(), Utc::now());
        c.resolve(Some("swapped rooms".into()));
        c.resolve(Some("moved to Thursday".into()));
        assert!(c.resolved);
        assert_eq!(c.resolution_notes.as_deref(), Some("moved to Thursday"));
    }

    #[test]
    fn test_self_referencing_row_has_a_key() {
        let a = Uuid::new_v4();
        let cand = ConflictCandidate::new(
            ConflictKey::pair(a, Uuid::new_v4(), ConflictType::Lecturer),
            Severity::High,
            "",
        );
        let mut c = Conflict::from_candidate(&cand, Uuid::new_v4(), Utc::now());
        c.original_session_id = a;
        c.conflicting_session_id = Some(a);

        assert!(c.is_self_referencing());
        let key = c.key();
        assert_eq!(key.first, a);
        assert_eq!(key.second, Some(a));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&ConflictType::Lecturer).unwrap();
        assert_eq!(json, "\"lecturer\"");
        let sev: Severity = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(sev, Severity::Critical);
    }
}
