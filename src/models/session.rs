//! Session (scheduled class) model.
//!
//! A session is one weekly occurrence of a lecture, lab, tutorial or exam:
//! a lecturer and a room booked for a time slot on behalf of a department.
//!
//! Sessions are created from a [`SessionDraft`] and edited with a
//! [`SessionPatch`]. Both go through [`validation`](crate::validation)
//! before a [`Session`] value exists, so every `Session` satisfies
//! `end > start` and `day ∈ 1..=5`.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::slot::{minute_of_day, time_from_minute, TimeSlot, Weekday};
use crate::validation::{self, ValidationError};

/// Session identifier.
pub type SessionId = Uuid;

/// Kind of teaching session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Lecture,
    Lab,
    Tutorial,
    Exam,
}

/// A scheduled session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Course title shown on the timetable.
    pub title: String,
    /// Lecture, lab, tutorial or exam.
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Owning department.
    pub department_id: String,
    /// Assigned lecturer.
    pub lecturer_id: String,
    /// Room name.
    pub room: String,
    /// Day and time range.
    pub slot: TimeSlot,
    /// Declared room capacity.
    pub capacity: u32,
    /// Expected or enrolled students. May exceed `capacity`.
    pub student_count: Option<u32>,
    /// Bumped on every update; used for lost-update detection.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether this session's slot overlaps another's.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.slot.overlaps(&other.slot)
    }

    /// Students beyond capacity (0 when within capacity or unknown).
    pub fn overflow(&self) -> u32 {
        self.student_count
            .map(|n| n.saturating_sub(self.capacity))
            .unwrap_or(0)
    }

    /// Whether the expected students exceed the declared capacity.
    #[inline]
    pub fn is_over_capacity(&self) -> bool {
        self.overflow() > 0
    }

    /// Whether both sessions book the same slot, room, lecturer and
    /// department.
    ///
    /// Title, type and enrolment are descriptive, so a copy titled
    /// "X (Copy)" is still the same booking.
    pub fn same_booking(&self, other: &Self) -> bool {
        self.slot == other.slot
            && self.lecturer_id == other.lecturer_id
            && self.room == other.room
            && self.department_id == other.department_id
    }

    /// Draft for a copy of this session, titled "<title> (Copy)".
    pub fn copy_draft(&self) -> SessionDraft {
        let mut draft = SessionDraft::from(self);
        draft.title = format!("{} (Copy)", self.title);
        draft
    }

    /// Applies a patch, producing the validated post-image.
    ///
    /// The identity and creation time are kept and `version` is bumped.
    pub fn patched(&self, patch: &SessionPatch) -> Result<Session, Vec<ValidationError>> {
        let draft = patch.apply_to(SessionDraft::from(self));
        let mut next = draft.build(self.id, self.created_at)?;
        next.version = self.version + 1;
        Ok(next)
    }
}

/// Fields for creating a session.
///
/// Day and times are kept raw so validation can report malformed input
/// instead of the type system rejecting it silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub title: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub department_id: String,
    pub lecturer_id: String,
    pub room: String,
    /// Day of week, 1 (Monday) to 5 (Friday).
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    /// Explicit end time. Takes precedence over `duration_minutes`.
    pub end_time: Option<NaiveTime>,
    /// Length in minutes, used when `end_time` is absent.
    pub duration_minutes: Option<u32>,
    pub capacity: u32,
    pub student_count: Option<u32>,
}

impl SessionDraft {
    /// Creates a draft with the given title and type.
    ///
    /// Defaults to Monday 09:00 with no end, which fails validation
    /// until an end time or a duration is set.
    pub fn new(title: impl Into<String>, session_type: SessionType) -> Self {
        Self {
            title: title.into(),
            session_type,
            department_id: String::new(),
            lecturer_id: String::new(),
            room: String::new(),
            day_of_week: Weekday::Monday.number(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end_time: None,
            duration_minutes: None,
            capacity: 0,
            student_count: None,
        }
    }

    /// Sets the owning department.
    pub fn with_department(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = department_id.into();
        self
    }

    /// Sets the lecturer.
    pub fn with_lecturer(mut self, lecturer_id: impl Into<String>) -> Self {
        self.lecturer_id = lecturer_id.into();
        self
    }

    /// Sets the room.
    pub fn in_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    /// Sets the day of week (1..=5).
    pub fn on_day(mut self, day_of_week: u8) -> Self {
        self.day_of_week = day_of_week;
        self
    }

    /// Sets start and end time.
    pub fn between(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.start_time = start;
        self.end_time = Some(end);
        self
    }

    /// Sets the start time.
    pub fn starting_at(mut self, start: NaiveTime) -> Self {
        self.start_time = start;
        self
    }

    /// Sets a duration; the end time is derived from it.
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self.end_time = None;
        self
    }

    /// Sets the declared room capacity.
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the expected student count.
    pub fn with_students(mut self, count: u32) -> Self {
        self.student_count = Some(count);
        self
    }

    /// End time: explicit, or start + duration.
    ///
    /// Returns `None` when neither is set or the duration runs past midnight.
    pub fn resolved_end(&self) -> Option<NaiveTime> {
        match (self.end_time, self.duration_minutes) {
            (Some(end), _) => Some(end),
            (None, Some(minutes)) => time_from_minute(minute_of_day(self.start_time) + minutes),
            (None, None) => None,
        }
    }

    /// Validates the draft structurally and builds the session.
    pub fn build(
        self,
        id: SessionId,
        created_at: DateTime<Utc>,
    ) -> Result<Session, Vec<ValidationError>> {
        validation::validate_draft(&self)?;

        // validate_draft guarantees both conversions succeed.
        let (Some(day), Some(end)) = (Weekday::from_number(self.day_of_week), self.resolved_end())
        else {
            return Err(vec![ValidationError::invalid_time_range(&self.title)]);
        };

        Ok(Session {
            id,
            title: self.title,
            session_type: self.session_type,
            department_id: self.department_id,
            lecturer_id: self.lecturer_id,
            room: self.room,
            slot: TimeSlot::new(day, self.start_time, end),
            capacity: self.capacity,
            student_count: self.student_count,
            version: 0,
            created_at,
        })
    }
}

impl From<&Session> for SessionDraft {
    fn from(s: &Session) -> Self {
        Self {
            title: s.title.clone(),
            session_type: s.session_type,
            department_id: s.department_id.clone(),
            lecturer_id: s.lecturer_id.clone(),
            room: s.room.clone(),
            day_of_week: s.slot.day.number(),
            start_time: s.slot.start,
            end_time: Some(s.slot.end),
            duration_minutes: None,
            capacity: s.capacity,
            student_count: s.student_count,
        }
    }
}

/// Partial update of a session. `None` fields are left unchanged.
///
/// A move (day/time/room change) is a patch like any other edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPatch {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub session_type: Option<SessionType>,
    pub department_id: Option<String>,
    pub lecturer_id: Option<String>,
    pub room: Option<String>,
    pub day_of_week: Option<u8>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub capacity: Option<u32>,
    /// `Some(None)` clears the student count.
    pub student_count: Option<Option<u32>>,
}

impl SessionPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the session to another day and time range.
    pub fn move_to(mut self, day_of_week: u8, start: NaiveTime, end: NaiveTime) -> Self {
        self.day_of_week = Some(day_of_week);
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Changes the room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Changes the lecturer.
    pub fn with_lecturer(mut self, lecturer_id: impl Into<String>) -> Self {
        self.lecturer_id = Some(lecturer_id.into());
        self
    }

    /// Changes the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Changes the declared capacity.
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Changes the student count.
    pub fn with_students(mut self, count: u32) -> Self {
        self.student_count = Some(Some(count));
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlays this patch onto a draft.
    pub fn apply_to(&self, mut draft: SessionDraft) -> SessionDraft {
        if let Some(title) = &self.title {
            draft.title = title.clone();
        }
        if let Some(session_type) = self.session_type {
            draft.session_type = session_type;
        }
        if let Some(department_id) = &self.department_id {
            draft.department_id = department_id.clone();
        }
        if let Some(lecturer_id) = &self.lecturer_id {
            draft.lecturer_id = lecturer_id.clone();
        }
        if let Some(room) = &self.room {
            draft.room = room.clone();
        }
        if let Some(day) = self.day_of_week {
            draft.day_of_week = day;
        }
        if let Some(start) = self.start_time {
            draft.start_time = start;
        }
        if let Some(end) = self.end_time {
            draft.end_time = Some(end);
            draft.duration_minutes = None;
        }
        if let Some(capacity) = self.capacity {
            draft.capacity = capacity;
        }
        if let Some(count) = self.student_count {
            draft.student_count = count;
        }
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample_draft() -> SessionDraft {
        SessionDraft::new("Data Structures", SessionType::Lecture)
            .with_department("CS")
            .with_lecturer("L1")
            .in_room("CS-101")
            .on_day(1)
            .between(t(9, 0), t(11, 0))
            .with_capacity(100)
            .with_students(85)
    }

    #[test]
    fn test_draft_builder() {
        let s = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(s.title, "Data Structures");
        assert_eq!(s.session_type, SessionType::Lecture);
        assert_eq!(s.slot.day, Weekday::Monday);
        assert_eq!(s.slot.duration_minutes(), 120);
        assert_eq!(s.version, 0);
        assert!(!s.is_over_capacity());
    }

    #[test]
    fn test_draft_with_duration() {
        let draft = SessionDraft::new("Lab", SessionType::Lab)
            .with_lecturer("L1")
            .in_room("LAB-1")
            .with_department("CS")
            .starting_at(t(14, 0))
            .with_duration(90);
        assert_eq!(draft.resolved_end(), Some(t(15, 30)));
    }

    #[test]
    fn test_duration_past_midnight_rejected() {
        let draft = sample_draft().starting_at(t(23, 0)).with_duration(120);
        assert_eq!(draft.resolved_end(), None);
        assert!(draft.build(Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn test_overflow() {
        let s = sample_draft()
            .with_capacity(30)
            .with_students(40)
            .build(Uuid::new_v4(), Utc::now())
            .unwrap();
        assert_eq!(s.overflow(), 10);
        assert!(s.is_over_capacity());

        let mut unknown = s.clone();
        unknown.student_count = None;
        assert!(!unknown.is_over_capacity());
    }

    #[test]
    fn test_patch_moves_and_bumps_version() {
        let s = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        let patch = SessionPatch::new()
            .move_to(2, t(13, 0), t(14, 0))
            .with_room("CS-102");
        let moved = s.patched(&patch).unwrap();
        assert_eq!(moved.id, s.id);
        assert_eq!(moved.created_at, s.created_at);
        assert_eq!(moved.version, 1);
        assert_eq!(moved.slot.day, Weekday::Tuesday);
        assert_eq!(moved.room, "CS-102");
        assert_eq!(moved.lecturer_id, "L1");
    }

    #[test]
    fn test_patch_rejects_inverted_range() {
        let s = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        let patch = SessionPatch {
            end_time: Some(t(8, 0)),
            ..SessionPatch::default()
        };
        assert!(s.patched(&patch).is_err());
    }

    #[test]
    fn test_patch_clears_student_count() {
        let s = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        let patch = SessionPatch {
            student_count: Some(None),
            ..SessionPatch::default()
        };
        assert_eq!(s.patched(&patch).unwrap().student_count, None);
        assert!(SessionPatch::new().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_same_booking_ignores_identity() {
        let a = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        let b = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        assert!(a.same_booking(&b));
        let c = a.patched(&SessionPatch::new().with_room("X")).unwrap();
        assert!(!a.same_booking(&c));
    }

    #[test]
    fn test_same_booking_ignores_title_and_enrolment() {
        let a = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        let copy = a.copy_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(copy.title, "Data Structures (Copy)");
        assert!(a.same_booking(&copy));

        let bigger = sample_draft()
            .with_capacity(150)
            .with_students(140)
            .build(Uuid::new_v4(), Utc::now())
            .unwrap();
        assert!(a.same_booking(&bigger));
    }
}
