//! Conflict detection.
//!
//! The detector is a pure function of a session set: it returns candidate
//! conflicts and never touches the conflict store. Reconciling candidates
//! against stored conflicts is a separate step ([`crate::reconcile`]).
//!
//! # Modes
//!
//! - **Full rescan**: all `C(N, 2)` pairs plus every single-session rule.
//!   Used on cold start and whenever incremental tracking is suspect.
//! - **Incremental**: only pairs involving one changed session, `O(N)`.
//!   Used after every mutation.
//!
//! Both modes return candidates sorted by [`ConflictKey`], with at most one
//! candidate per key, so output is deterministic regardless of input order
//! or of whether the `parallel` feature evaluates pairs concurrently.
//!
//! # Complexity
//! Full: O(N²) rule evaluations. Incremental: O(N).

use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{ConflictCandidate, ConflictKey, Session};
use crate::rules::RuleSet;

/// Candidates for an edited session, before and after the edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDetection {
    /// Conflicts the pre-image had with the rest of the set.
    pub before: Vec<ConflictCandidate>,
    /// Conflicts the post-image has with the rest of the set.
    pub after: Vec<ConflictCandidate>,
}

impl UpdateDetection {
    /// Keys present before the edit and gone after it.
    pub fn vanished(&self) -> Vec<ConflictKey> {
        let after: BTreeSet<ConflictKey> = self.after.iter().map(|c| c.key).collect();
        self.before
            .iter()
            .map(|c| c.key)
            .filter(|k| !after.contains(k))
            .collect()
    }

    /// Keys absent before the edit and present after it.
    pub fn appeared(&self) -> Vec<ConflictKey> {
        let before: BTreeSet<ConflictKey> = self.before.iter().map(|c| c.key).collect();
        self.after
            .iter()
            .map(|c| c.key)
            .filter(|k| !before.contains(k))
            .collect()
    }
}

/// Detects conflicts with a rule set.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    rules: RuleSet,
}

impl ConflictDetector {
    /// Creates a detector with the given rules.
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// The rule set in use.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Evaluates every pair and every session.
    pub fn detect_full(&self, sessions: &[Session]) -> Vec<ConflictCandidate> {
        let mut found = self.pair_candidates(sessions);
        found.extend(sessions.iter().flat_map(|s| self.rules.check_session(s)));
        let found = normalize(found);

        debug!(
            sessions = sessions.len(),
            candidates = found.len(),
            "full conflict scan"
        );
        found
    }

    /// Evaluates only the pairs involving `changed`, plus its own
    /// single-session rules.
    ///
    /// `sessions` may or may not contain `changed` (or a stale version of
    /// it); any entry with the same id is skipped.
    pub fn detect_incremental(
        &self,
        changed: &Session,
        sessions: &[Session],
    ) -> Vec<ConflictCandidate> {
        let mut found: Vec<ConflictCandidate> = sessions
            .iter()
            .filter(|other| other.id != changed.id)
            .filter_map(|other| self.rules.classify_pair(changed, other))
            .collect();
        found.extend(self.rules.check_session(changed));
        let found = normalize(found);

        debug!(
            session_id = %changed.id,
            others = sessions.len(),
            candidates = found.len(),
            "incremental conflict scan"
        );
        found
    }

    /// Evaluates both images of an edited session against the rest.
    pub fn detect_update(
        &self,
        before: &Session,
        after: &Session,
        sessions: &[Session],
    ) -> UpdateDetection {
        UpdateDetection {
            before: self.detect_incremental(before, sessions),
            after: self.detect_incremental(after, sessions),
        }
    }

    /// Conflicts that disappear when `removed` leaves the set.
    ///
    /// After removal the session has no candidates at all; this reports what
    /// it had, for logging and for the caller's bookkeeping.
    pub fn detect_removal(
        &self,
        removed: &Session,
        sessions: &[Session],
    ) -> Vec<ConflictCandidate> {
        self.detect_incremental(removed, sessions)
    }

    #[cfg(not(feature = "parallel"))]
    fn pair_candidates(&self, sessions: &[Session]) -> Vec<ConflictCandidate> {
        let mut found = Vec::new();
        for (i, a) in sessions.iter().enumerate() {
            for b in &sessions[i + 1..] {
                if let Some(c) = self.rules.classify_pair(a, b) {
                    found.push(c);
                }
            }
        }
        found
    }

    #[cfg(feature = "parallel")]
    fn pair_candidates(&self, sessions: &[Session]) -> Vec<ConflictCandidate> {
        use rayon::prelude::*;

        (0..sessions.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let a = &sessions[i];
                sessions[i + 1..]
                    .iter()
                    .filter_map(move |b| self.rules.classify_pair(a, b))
            })
            .collect()
    }
}

/// Full rescan with the standard rules.
pub fn detect_full(sessions: &[Session]) -> Vec<ConflictCandidate> {
    ConflictDetector::default().detect_full(sessions)
}

/// Incremental scan with the standard rules.
pub fn detect_incremental(changed: &Session, sessions: &[Session]) -> Vec<ConflictCandidate> {
    ConflictDetector::default().detect_incremental(changed, sessions)
}

/// Sorts by key and keeps one candidate per key.
///
/// Duplicate keys only arise when the input repeats a session id.
fn normalize(mut found: Vec<ConflictCandidate>) -> Vec<ConflictCandidate> {
    found.sort_by(|a, b| a.key.cmp(&b.key));
    found.dedup_by(|a, b| a.key == b.key);
    found
}
