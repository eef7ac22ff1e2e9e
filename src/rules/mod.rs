//! Conflict rules and the rule set.
//!
//! A rule looks at two sessions (or one, for capacity) and decides whether
//! they conflict, and if so with which type and severity. Rules are pure:
//! they read sessions and never mutate them.
//!
//! # Usage
//!
//! ```
//! use timetable_conflicts::rules::{builtin, RuleSet, SeverityPolicy};
//!
//! let rules = RuleSet::new(SeverityPolicy::default())
//!     .with_pair_rule(builtin::DuplicateBooking)
//!     .with_pair_rule(builtin::LecturerClash)
//!     .with_pair_rule(builtin::RoomClash)
//!     .with_session_rule(builtin::CapacityOverrun);
//! assert_eq!(rules.pair_rule_names(), vec!["DUPLICATE", "LECTURER", "ROOM"]);
//! ```
//!
//! # Precedence
//! Pair rules are tried in insertion order and the first match wins, so a
//! pair produces at most one conflict. The standard order is
//! duplicate → lecturer → room → department overlap: a pair sharing both
//! lecturer and room is reported once, as a lecturer conflict, and exact
//! duplicates are reported as critical room conflicts.

pub mod builtin;
mod policy;
mod set;

pub use policy::SeverityPolicy;
pub use set::{RuleSet, RuleToggles};

use std::fmt::Debug;

use crate::models::{ConflictCandidate, Minute, Session, TimeSlot};

/// Facts about an overlapping pair, computed once per pair.
#[derive(Debug, Clone, Copy)]
pub struct PairContext {
    /// Shared minutes.
    pub overlap_minutes: Minute,
    /// Duration of the shorter session.
    pub shorter_minutes: Minute,
    /// The shared part of both slots.
    pub window: TimeSlot,
}

impl PairContext {
    /// Computes the context for two sessions.
    ///
    /// Returns `None` if the slots do not overlap.
    pub fn new(a: &Session, b: &Session) -> Option<Self> {
        if !a.overlaps(b) {
            return None;
        }
        let window = TimeSlot {
            day: a.slot.day,
            start: a.slot.start.max(b.slot.start),
            end: a.slot.end.min(b.slot.end),
        };
        Some(Self {
            overlap_minutes: a.slot.overlap_minutes(&b.slot),
            shorter_minutes: a.slot.duration_minutes().min(b.slot.duration_minutes()),
            window,
        })
    }

    /// Fraction of the shorter session that is overlapped (0.0..=1.0).
    pub fn coverage(&self) -> f64 {
        if self.shorter_minutes == 0 {
            return 0.0;
        }
        f64::from(self.overlap_minutes) / f64::from(self.shorter_minutes)
    }
}

/// A rule over two distinct, overlapping sessions.
///
/// The rule set only calls `evaluate` with `a.id < b.id` and an
/// overlapping pair, so implementations need not re-check either.
pub trait PairRule: Send + Sync + Debug {
    /// Rule name (e.g. "LECTURER").
    fn name(&self) -> &'static str;

    /// Returns a candidate if the pair conflicts under this rule.
    fn evaluate(
        &self,
        a: &Session,
        b: &Session,
        context: &PairContext,
        policy: &SeverityPolicy,
    ) -> Option<ConflictCandidate>;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// A rule over a single session, independent of every other session.
pub trait SessionRule: Send + Sync + Debug {
    /// Rule name (e.g. "CAPACITY").
    fn name(&self) -> &'static str;

    /// Returns a candidate if the session is in conflict on its own.
    fn evaluate(&self, session: &Session, policy: &SeverityPolicy) -> Option<ConflictCandidate>;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
