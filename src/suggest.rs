//! Resolution suggestions.
//!
//! Given a stored conflict and the current session set, proposes concrete
//! edits that would clear it. Suggestions are advisory: nothing is applied.
//!
//! # Algorithm
//!
//! 1. Pick the session to act on: the conflicting (higher-id) session of a
//!    pair, or the only session of a capacity conflict.
//! 2. Slot moves: scan the teaching day in `step_minutes` increments,
//!    same day first, then the following days wrapping through the week.
//!    A slot qualifies when neither the lecturer nor the room is busy.
//! 3. Room changes: directory rooms seating the session's students and
//!    free during its slot, smallest adequate room first.
//! 4. Lecturer reassignment: free lecturers of the same department.
//!
//! # Complexity
//! Slot search is O(d * k * n) for d days, k steps per day and n sessions.

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::{
    minute_of_day, Conflict, ConflictType, Directory, Session, SessionId, TimeSlot, Weekday,
};

/// Settings for the slot search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    /// Earliest start considered.
    pub day_start: NaiveTime,
    /// Latest end considered.
    pub day_end: NaiveTime,
    /// Step between candidate start times.
    pub step_minutes: u32,
    /// Cap on suggestions per conflict.
    pub max_suggestions: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            step_minutes: 30,
            max_suggestions: 5,
        }
    }
}

impl SuggestConfig {
    /// Length of the teaching day in minutes.
    pub fn day_minutes(&self) -> u32 {
        minute_of_day(self.day_end).saturating_sub(minute_of_day(self.day_start))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.day_end <= self.day_start {
            return Err(format!(
                "day_end ({}) must be after day_start ({})",
                self.day_end, self.day_start
            ));
        }
        if self.step_minutes == 0 {
            return Err("step_minutes must be positive".to_string());
        }
        Ok(())
    }
}

/// A proposed edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    /// Move the session to another day/time, keeping lecturer and room.
    MoveToSlot {
        session_id: SessionId,
        title: String,
        slot: TimeSlot,
    },
    /// Keep the time, use another room.
    ChangeRoom {
        session_id: SessionId,
        title: String,
        room: String,
        capacity: u32,
    },
    /// Keep the time, use another lecturer. `None` when no directory is
    /// available to name one.
    ReassignLecturer {
        session_id: SessionId,
        title: String,
        lecturer_id: Option<String>,
    },
}

impl Suggestion {
    /// Session the suggestion edits.
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::MoveToSlot { session_id, .. }
            | Self::ChangeRoom { session_id, .. }
            | Self::ReassignLecturer { session_id, .. } => *session_id,
        }
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveToSlot { title, slot, .. } => write!(f, "Move '{title}' to {slot}"),
            Self::ChangeRoom {
                title,
                room,
                capacity,
                ..
            } => write!(f, "Move '{title}' to room {room} ({capacity} seats)"),
            Self::ReassignLecturer {
                title,
                lecturer_id: Some(lecturer),
                ..
            } => write!(f, "Assign '{title}' to lecturer {lecturer}"),
            Self::ReassignLecturer { title, .. } => {
                write!(f, "Assign another lecturer to '{title}'")
            }
        }
    }
}

/// Computes suggestions for stored conflicts.
#[derive(Debug, Clone)]
pub struct Suggester<'a> {
    config: &'a SuggestConfig,
    directory: Option<&'a Directory>,
}

impl<'a> Suggester<'a> {
    pub fn new(config: &'a SuggestConfig) -> Self {
        Self {
            config,
            directory: None,
        }
    }

    /// Enables room and lecturer suggestions.
    pub fn with_directory(mut self, directory: &'a Directory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Suggestions for one conflict, best first.
    ///
    /// Returns nothing when the sessions referenced by the conflict are not
    /// in `sessions`.
    pub fn suggest(&self, conflict: &Conflict, sessions: &[Session]) -> Vec<Suggestion> {
        let target_id = conflict
            .conflicting_session_id
            .unwrap_or(conflict.original_session_id);
        let Some(target) = sessions.iter().find(|s| s.id == target_id) else {
            return Vec::new();
        };

        let mut out = match conflict.conflict_type {
            ConflictType::Capacity => self.room_changes(target, sessions),
            ConflictType::Room => {
                let mut out = self.slot_moves(target, sessions);
                out.extend(self.room_changes(target, sessions));
                out
            }
            ConflictType::Lecturer => {
                let mut out = self.slot_moves(target, sessions);
                out.extend(self.lecturer_changes(target, sessions));
                out
            }
            ConflictType::Overlap => self.slot_moves(target, sessions),
        };
        out.truncate(self.config.max_suggestions);
        out
    }

    /// Earliest clash-free slots for `target`.
    pub fn slot_moves(&self, target: &Session, sessions: &[Session]) -> Vec<Suggestion> {
        let duration = target.slot.duration_minutes();
        let first = minute_of_day(self.config.day_start);
        let last = minute_of_day(self.config.day_end);
        let step = self.config.step_minutes.max(1) as usize;

        let mut out = Vec::new();
        let mut day = target.slot.day;
        for _ in 0..Weekday::ALL.len() {
            for start in (first..=last.saturating_sub(duration)).step_by(step) {
                if out.len() >= self.config.max_suggestions {
                    return out;
                }
                let Some(slot) = TimeSlot::from_minutes(day, start, start + duration) else {
                    continue;
                };
                if slot == target.slot {
                    continue;
                }
                let mut moved = target.clone();
                moved.slot = slot;
                if is_free(&moved, sessions, |a, b| {
                    a.lecturer_id == b.lecturer_id || a.room == b.room
                }) {
                    out.push(Suggestion::MoveToSlot {
                        session_id: target.id,
                        title: target.title.clone(),
                        slot,
                    });
                }
            }
            day = day.next();
        }
        out
    }

    /// Free rooms seating the session's students, smallest first.
    pub fn room_changes(&self, target: &Session, sessions: &[Session]) -> Vec<Suggestion> {
        let Some(directory) = self.directory else {
            return Vec::new();
        };
        let needed = target.student_count.unwrap_or(target.capacity);
        directory
            .rooms_with_capacity(needed)
            .into_iter()
            .filter(|room| room.name != target.room)
            .filter(|room| {
                let mut moved = target.clone();
                moved.room = room.name.clone();
                is_free(&moved, sessions, |a, b| a.room == b.room)
            })
            .map(|room| Suggestion::ChangeRoom {
                session_id: target.id,
                title: target.title.clone(),
                room: room.name.clone(),
                capacity: room.capacity,
            })
            .collect()
    }

    /// Free lecturers of the session's department.
    pub fn lecturer_changes(&self, target: &Session, sessions: &[Session]) -> Vec<Suggestion> {
        let Some(directory) = self.directory else {
            return vec![Suggestion::ReassignLecturer {
                session_id: target.id,
                title: target.title.clone(),
                lecturer_id: None,
            }];
        };
        directory
            .lecturers_in(&target.department_id)
            .into_iter()
            .filter(|l| l.id != target.lecturer_id)
            .filter(|l| {
                let mut moved = target.clone();
                moved.lecturer_id = l.id.clone();
                is_free(&moved, sessions, |a, b| a.lecturer_id == b.lecturer_id)
            })
            .map(|l| Suggestion::ReassignLecturer {
                session_id: target.id,
                title: target.title.clone(),
                lecturer_id: Some(l.id.clone()),
            })
            .collect()
    }
}

/// Whether no other session overlaps `candidate` while sharing a resource.
fn is_free(
    candidate: &Session,
    sessions: &[Session],
    shares: impl Fn(&Session, &Session) -> bool,
) -> bool {
    sessions
        .iter()
        .filter(|other| other.id != candidate.id)
        .all(|other| !(candidate.overlaps(other) && shares(candidate, other)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ConflictCandidate, ConflictKey, Department, Lecturer, Room, SessionDraft, SessionType,
        Severity,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn session(title: &str, lecturer: &str, room: &str, day: u8, start: u32, end: u32) -> Session {
        SessionDraft::new(title, SessionType::Lecture)
            .with_department("CS")
            .with_lecturer(lecturer)
            .in_room(room)
            .on_day(day)
            .between(t(start), t(end))
            .with_capacity(40)
            .with_students(35)
            .build(Uuid::new_v4(), Utc::now())
            .unwrap()
    }

    fn conflict_between(a: &Session, b: &Session, kind: ConflictType) -> Conflict {
        let cand = ConflictCandidate::new(ConflictKey::pair(a.id, b.id, kind), Severity::High, "");
        Conflict::from_candidate(&cand, Uuid::new_v4(), Utc::now())
    }

    fn directory() -> Directory {
        Directory::new()
            .with_department(Department::new("CS", "Computer Science"))
            .with_lecturer(Lecturer::new("L1", "Dr. Sarah Johnson", "CS"))
            .with_lecturer(Lecturer::new("L2", "Prof. Michael Chen", "CS"))
            .with_lecturer(Lecturer::new("L3", "Dr. Emily Rodriguez", "CS"))
            .with_room(Room::new("R1", 40))
            .with_room(Room::new("R2", 40))
            .with_room(Room::new("R3", 20))
            .with_room(Room::new("HALL", 200))
    }

    #[test]
    fn test_slot_moves_skip_busy_times() {
        let config = SuggestConfig::default();
        let a = session("A", "L1", "R1", 1, 8, 10);
        let b = session("B", "L1", "R2", 1, 9, 11);
        let conflict = conflict_between(&a, &b, ConflictType::Lecturer);
        let target_id = conflict.conflicting_session_id.unwrap();
        let other = if target_id == a.id { &b } else { &a };

        let found = Suggester::new(&config).suggest(&conflict, &[a.clone(), b.clone()]);
        assert!(!found.is_empty());
        for s in &found {
            if let Suggestion::MoveToSlot { slot, session_id, .. } = s {
                assert_eq!(*session_id, target_id);
                assert!(!slot.overlaps(&other.slot));
            }
        }
        // no directory: the lecturer suggestion is generic
        assert!(found.len() <= config.max_suggestions);
    }

    #[test]
    fn test_slot_moves_earliest_first_and_wrap() {
        let config = SuggestConfig {
            max_suggestions: 2,
            ..SuggestConfig::default()
        };
        // Friday fully blocked for lecturer L1 by a session that lasts all day.
        let blocker = session("Blocker", "L1", "R9", 5, 8, 18);
        let target = session("Target", "L1", "R1", 5, 9, 10);
        let moves = Suggester::new(&config).slot_moves(&target, &[blocker, target.clone()]);
        assert_eq!(moves.len(), 2);
        match &moves[0] {
            Suggestion::MoveToSlot { slot, .. } => {
                assert_eq!(slot.day, Weekday::Monday);
                assert_eq!(slot.start, t(8));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_room_change_smallest_free_first() {
        let config = SuggestConfig::default();
        let dir = directory();
        let a = session("A", "L1", "R1", 2, 9, 11);
        let b = session("B", "L2", "R1", 2, 10, 12);
        let busy = session("C", "L3", "R2", 2, 10, 11);
        let all = vec![a.clone(), b.clone(), busy];

        let target = if a.id > b.id { &a } else { &b };
        let rooms = Suggester::new(&config)
            .with_directory(&dir)
            .room_changes(target, &all);
        let names: Vec<String> = rooms
            .iter()
            .filter_map(|s| match s {
                Suggestion::ChangeRoom { room, .. } => Some(room.clone()),
                _ => None,
            })
            .collect();
        // R2 is busy, R3 is too small
        assert_eq!(names, vec!["HALL".to_string()]);
    }

    #[test]
    fn test_capacity_conflict_only_changes_room() {
        let config = SuggestConfig::default();
        let dir = directory();
        let mut s = session("Big", "L1", "R1", 3, 9, 10);
        s.student_count = Some(90);
        let cand = ConflictCandidate::new(
            ConflictKey::single(s.id, ConflictType::Capacity),
            Severity::Critical,
            "",
        );
        let conflict = Conflict::from_candidate(&cand, Uuid::new_v4(), Utc::now());
        let found = Suggester::new(&config)
            .with_directory(&dir)
            .suggest(&conflict, std::slice::from_ref(&s));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].to_string(), "Move 'Big' to room HALL (200 seats)");
    }

    #[test]
    fn test_lecturer_reassignment() {
        let config = SuggestConfig::default();
        let dir = directory();
        let a = session("A", "L1", "R1", 4, 9, 11);
        let b = session("B", "L1", "R2", 4, 9, 11);
        let busy = session("C", "L2", "R3", 4, 10, 12);
        let target = if a.id > b.id { &a } else { &b };
        let found = Suggester::new(&config)
            .with_directory(&dir)
            .lecturer_changes(target, &[a.clone(), b.clone(), busy]);
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].to_string(),
            format!("Assign '{}' to lecturer L3", target.title)
        );
    }

    #[test]
    fn test_missing_session_yields_nothing() {
        let config = SuggestConfig::default();
        let a = session("A", "L1", "R1", 1, 9, 10);
        let b = session("B", "L1", "R1", 1, 9, 10);
        let conflict = conflict_between(&a, &b, ConflictType::Room);
        assert!(Suggester::new(&config).suggest(&conflict, &[]).is_empty());
    }

    #[test]
    fn test_display() {
        let s = Suggestion::MoveToSlot {
            session_id: Uuid::nil(),
            title: "Databases".into(),
            slot: TimeSlot::new(Weekday::Tuesday, t(10), t(12)),
        };
        assert_eq!(s.to_string(), "Move 'Databases' to Tuesday 10:00-12:00");
        let generic = Suggestion::ReassignLecturer {
            session_id: Uuid::nil(),
            title: "Databases".into(),
            lecturer_id: None,
        };
        assert_eq!(generic.to_string(), "Assign another lecturer to 'Databases'");
        assert_eq!(generic.session_id(), Uuid::nil());
    }

    #[test]
    fn test_config_validate() {
        assert!(SuggestConfig::default().validate().is_ok());
        assert_eq!(SuggestConfig::default().day_minutes(), 600);
        let bad = SuggestConfig {
            step_minutes: 0,
            ..SuggestConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
