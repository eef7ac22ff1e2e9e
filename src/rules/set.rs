//! Ordered rule set.
//!
//! Composes pair and single-session rules with a severity policy.
//! Pair rules are evaluated in order and the first match wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{builtin, PairContext, PairRule, SessionRule, SeverityPolicy};
use crate::models::{ConflictCandidate, Session};

/// Switches for the standard rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleToggles {
    pub lecturer: bool,
    pub room: bool,
    pub capacity: bool,
    pub department_overlap: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            lecturer: true,
            room: true,
            capacity: true,
            department_overlap: true,
        }
    }
}

/// An ordered, composable set of conflict rules.
///
/// # Example
/// ```
/// use timetable_conflicts::rules::RuleSet;
///
/// let rules = RuleSet::standard();
/// assert_eq!(
///     rules.pair_rule_names(),
///     vec!["DUPLICATE", "LECTURER", "ROOM", "OVERLAP"]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RuleSet {
    pair_rules: Vec<Arc<dyn PairRule>>,
    session_rules: Vec<Arc<dyn SessionRule>>,
    policy: SeverityPolicy,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new(policy: SeverityPolicy) -> Self {
        Self {
            pair_rules: Vec::new(),
            session_rules: Vec::new(),
            policy,
        }
    }

    /// All standard rules with the default policy.
    pub fn standard() -> Self {
        Self::from_toggles(&RuleToggles::default(), SeverityPolicy::default())
    }

    /// Standard rules filtered by `toggles`, in precedence order.
    ///
    /// Duplicate detection rides on the room rule.
    pub fn from_toggles(toggles: &RuleToggles, policy: SeverityPolicy) -> Self {
        let mut set = Self::new(policy);
        if toggles.room {
            set = set.with_pair_rule(builtin::DuplicateBooking);
        }
        if toggles.lecturer {
            set = set.with_pair_rule(builtin::LecturerClash);
        }
        if toggles.room {
            set = set.with_pair_rule(builtin::RoomClash);
        }
        if toggles.department_overlap {
            set = set.with_pair_rule(builtin::DepartmentOverlap);
        }
        if toggles.capacity {
            set = set.with_session_rule(builtin::CapacityOverrun);
        }
        set
    }

    /// Appends a pair rule (lowest precedence so far).
    pub fn with_pair_rule<R: PairRule + 'static>(mut self, rule: R) -> Self {
        self.pair_rules.push(Arc::new(rule));
        self
    }

    /// Appends a single-session rule.
    pub fn with_session_rule<R: SessionRule + 'static>(mut self, rule: R) -> Self {
        self.session_rules.push(Arc::new(rule));
        self
    }

    /// Replaces the severity policy.
    pub fn with_policy(mut self, policy: SeverityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The severity policy.
    pub fn policy(&self) -> &SeverityPolicy {
        &self.policy
    }

    /// Names of the pair rules, in precedence order.
    pub fn pair_rule_names(&self) -> Vec<&'static str> {
        self.pair_rules.iter().map(|r| r.name()).collect()
    }

    /// Names of the single-session rules.
    pub fn session_rule_names(&self) -> Vec<&'static str> {
        self.session_rules.iter().map(|r| r.name()).collect()
    }

    /// Classifies a pair.
    ///
    /// Returns `None` for the same session twice, for non-overlapping
    /// pairs, and for pairs no rule matches. The result does not depend on
    /// argument order.
    pub fn classify_pair(&self, a: &Session, b: &Session) -> Option<ConflictCandidate> {
        if a.id == b.id {
            return None;
        }
        let (a, b) = if a.id < b.id { (a, b) } else { (b, a) };
        let context = PairContext::new(a, b)?;
        self.pair_rules
            .iter()
            .find_map(|rule| rule.evaluate(a, b, &context, &self.policy))
    }

    /// Single-session conflicts of one session.
    pub fn check_session(&self, session: &Session) -> Vec<ConflictCandidate> {
        self.session_rules
            .iter()
            .filter_map(|rule| rule.evaluate(session, &self.policy))
            .collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}
