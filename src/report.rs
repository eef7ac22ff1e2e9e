//! Conflict summary and enriched conflict views.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Unresolved / resolved | Stored conflicts by resolution state |
//! | By type, by severity | Unresolved conflicts per category |
//! | By department | Unresolved conflicts touching a department's sessions |
//! | Conflicted sessions | Sessions in at least one unresolved conflict |
//! | Room hours | Weekly booked hours per room |
//! | Room utilization | Booked minutes / teaching-week minutes |

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{Conflict, ConflictType, Session, SessionId, Severity};

/// Default teaching week: five days of 08:00-18:00.
pub const DEFAULT_WEEK_MINUTES: u32 = 5 * 600;

/// A stored conflict joined with the sessions it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictView {
    pub conflict: Conflict,
    /// `None` if the session no longer exists.
    pub original: Option<Session>,
    /// `None` for capacity conflicts or if the session no longer exists.
    pub conflicting: Option<Session>,
}

impl ConflictView {
    /// Joins each conflict with its sessions.
    pub fn join(conflicts: &[Conflict], sessions: &[Session]) -> Vec<ConflictView> {
        let by_id: HashMap<SessionId, &Session> = sessions.iter().map(|s| (s.id, s)).collect();
        conflicts
            .iter()
            .map(|c| ConflictView {
                conflict: c.clone(),
                original: by_id.get(&c.original_session_id).map(|s| (*s).clone()),
                conflicting: c
                    .conflicting_session_id
                    .and_then(|id| by_id.get(&id))
                    .map(|s| (*s).clone()),
            })
            .collect()
    }

    /// One-line summary, e.g. `"lecturer (high): 'A' vs 'B'"`.
    pub fn headline(&self) -> String {
        let title = |s: &Option<Session>| {
            s.as_ref()
                .map(|s| format!("'{}'", s.title))
                .unwrap_or_else(|| "<missing>".to_string())
        };
        match self.conflict.conflicting_session_id {
            Some(_) => format!(
                "{} ({}): {} vs {}",
                self.conflict.conflict_type,
                self.conflict.severity,
                title(&self.original),
                title(&self.conflicting)
            ),
            None => format!(
                "{} ({}): {}",
                self.conflict.conflict_type,
                self.conflict.severity,
                title(&self.original)
            ),
        }
    }
}

/// Conflict and room-usage summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub total_sessions: usize,
    pub unresolved: usize,
    pub resolved: usize,
    /// Unresolved conflicts per type.
    pub by_type: BTreeMap<ConflictType, usize>,
    /// Unresolved conflicts per severity.
    pub by_severity: BTreeMap<Severity, usize>,
    /// Unresolved conflicts touching each department.
    pub by_department: BTreeMap<String, usize>,
    /// Sessions in at least one unresolved conflict.
    pub conflicted_sessions: BTreeSet<SessionId>,
    /// Weekly booked hours per room.
    pub room_hours: BTreeMap<String, f64>,
    /// Booked fraction of the teaching week per room (may exceed 1.0 when
    /// the room is double-booked).
    pub room_utilization: BTreeMap<String, f64>,
}

impl ConflictReport {
    /// Computes the report against the default teaching week.
    pub fn calculate(sessions: &[Session], conflicts: &[Conflict]) -> Self {
        Self::calculate_with_week(sessions, conflicts, DEFAULT_WEEK_MINUTES)
    }

    /// Computes the report against a teaching week of `week_minutes`.
    pub fn calculate_with_week(
        sessions: &[Session],
        conflicts: &[Conflict],
        week_minutes: u32,
    ) -> Self {
        let departments: HashMap<SessionId, &str> = sessions
            .iter()
            .map(|s| (s.id, s.department_id.as_str()))
            .collect();

        let mut report = Self {
            total_sessions: sessions.len(),
            ..Self::default()
        };

        for conflict in conflicts {
            if conflict.resolved {
                report.resolved += 1;
                continue;
            }
            report.unresolved += 1;
            *report.by_type.entry(conflict.conflict_type).or_default() += 1;
            *report.by_severity.entry(conflict.severity).or_default() += 1;

            // A pair within one department counts once for it.
            let touched: BTreeSet<&str> = conflict
                .key()
                .session_ids()
                .filter_map(|id| departments.get(&id).copied())
                .collect();
            for dept in touched {
                *report.by_department.entry(dept.to_string()).or_default() += 1;
            }
            report.conflicted_sessions.extend(conflict.key().session_ids());
        }

        let mut room_minutes: BTreeMap<String, u32> = BTreeMap::new();
        for s in sessions {
            *room_minutes.entry(s.room.clone()).or_default() += s.slot.duration_minutes();
        }
        for (room, minutes) in room_minutes {
            report
                .room_hours
                .insert(room.clone(), f64::from(minutes) / 60.0);
            let utilization = if week_minutes == 0 {
                0.0
            } else {
                f64::from(minutes) / f64::from(week_minutes)
            };
            report.room_utilization.insert(room, utilization);
        }

        report
    }

    /// Whether any unresolved conflict is `High` or `Critical`.
    pub fn has_blocking(&self) -> bool {
        self.by_severity
            .iter()
            .any(|(severity, count)| *severity >= Severity::High && *count > 0)
    }

    /// Whether a session is in an unresolved conflict.
    pub fn is_conflicted(&self, session: SessionId) -> bool {
        self.conflicted_sessions.contains(&session)
    }

    /// Mean utilization over rooms in use (0.0 with no sessions).
    pub fn avg_utilization(&self) -> f64 {
        if self.room_utilization.is_empty() {
            0.0
        } else {
            self.room_utilization.values().sum::<f64>() / self.room_utilization.len() as f64
        }
    }
}
