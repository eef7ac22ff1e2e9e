//! Input validation for sessions.
//!
//! Checks a session before it reaches the detector. Detects:
//! - Empty titles
//! - Day of week outside Monday..Friday (1..=5)
//! - Missing or inverted time ranges (end must be strictly after start)
//! - References to unknown departments, lecturers or rooms
//! - Duplicate session IDs in a fetched set
//!
//! Validation failures never produce conflict records: a malformed session
//! is rejected, not flagged.

use std::collections::HashSet;

use crate::models::{minute_of_day, Directory, Session, SessionDraft, SessionId, Weekday};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Title is blank.
    EmptyTitle,
    /// Day of week is not in 1..=5.
    DayOutOfRange,
    /// End time missing, or not strictly after the start time.
    InvalidTimeRange,
    /// Department is blank or not in the directory.
    UnknownDepartment,
    /// Lecturer is blank or not in the directory.
    UnknownLecturer,
    /// Room is blank or not in the directory.
    UnknownRoom,
    /// Two sessions share the same ID.
    DuplicateId,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn duplicate_id(id: SessionId) -> Self {
        Self::new(
            ValidationErrorKind::DuplicateId,
            format!("Duplicate session ID: {id}"),
        )
    }

    pub(crate) fn invalid_time_range(title: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidTimeRange,
            format!("Session '{title}' must end after it starts"),
        )
    }
}

/// Validates the structure of a draft.
///
/// Checks:
/// 1. Title is not blank
/// 2. Day of week is in 1..=5
/// 3. An end time is known (explicit or via duration) and is after the start
/// 4. Department, lecturer and room are not blank
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_draft(draft: &SessionDraft) -> ValidationResult {
    let mut errors = Vec::new();

    if draft.title.trim().is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyTitle,
            "Session title must not be empty",
        ));
    }

    if Weekday::from_number(draft.day_of_week).is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::DayOutOfRange,
            format!(
                "Session '{}' has day of week {}; expected 1 (Monday) to 5 (Friday)",
                draft.title, draft.day_of_week
            ),
        ));
    }

    // Zero-length sessions are rejected here rather than treated as
    // never overlapping anything.
    match draft.resolved_end() {
        Some(end) if minute_of_day(end) > minute_of_day(draft.start_time) => {}
        _ => errors.push(ValidationError::invalid_time_range(&draft.title)),
    }

    if draft.department_id.trim().is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownDepartment,
            format!("Session '{}' has no department", draft.title),
        ));
    }
    if draft.lecturer_id.trim().is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownLecturer,
            format!("Session '{}' has no lecturer", draft.title),
        ));
    }
    if draft.room.trim().is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownRoom,
            format!("Session '{}' has no room", draft.title),
        ));
    }

    finish(errors)
}

/// Checks that every reference in a draft exists in the directory.
pub fn validate_references(draft: &SessionDraft, directory: &Directory) -> ValidationResult {
    let mut errors = Vec::new();

    if directory.department(&draft.department_id).is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownDepartment,
            format!(
                "Session '{}' references unknown department '{}'",
                draft.title, draft.department_id
            ),
        ));
    }
    if directory.lecturer(&draft.lecturer_id).is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownLecturer,
            format!(
                "Session '{}' references unknown lecturer '{}'",
                draft.title, draft.lecturer_id
            ),
        ));
    }
    if directory.room(&draft.room).is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownRoom,
            format!(
                "Session '{}' references unknown room '{}'",
                draft.title, draft.room
            ),
        ));
    }

    finish(errors)
}

/// Full check of a draft: structure, then directory references if given.
///
/// Reference errors are only reported once the structure is valid.
pub fn validate_with_directory(
    draft: &SessionDraft,
    directory: Option<&Directory>,
) -> ValidationResult {
    validate_draft(draft)?;
    match directory {
        Some(directory) => validate_references(draft, directory),
        None => Ok(()),
    }
}

/// Validates a session set fetched from storage.
///
/// Checks for duplicate IDs and malformed slots. Sessions built through
/// [`SessionDraft::build`] are always well formed, but rows edited outside
/// the engine might not be.
pub fn validate_sessions(sessions: &[Session]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for s in sessions {
        if !ids.insert(s.id) {
            errors.push(ValidationError::duplicate_id(s.id));
        }
        if !s.slot.is_well_formed() {
            errors.push(ValidationError::invalid_time_range(&s.title));
        }
    }

    finish(errors)
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Department, Lecturer, Room, SessionType};
    use chrono::{NaiveTime, Utc};
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample_draft() -> SessionDraft {
        SessionDraft::new("Database Systems", SessionType::Lecture)
            .with_department("CS")
            .with_lecturer("L1")
            .in_room("CS-101")
            .on_day(3)
            .between(t(14, 0), t(16, 0))
            .with_capacity(120)
    }

    fn sample_directory() -> Directory {
        Directory::new()
            .with_department(Department::new("CS", "Computer Science"))
            .with_lecturer(Lecturer::new("L1", "Dr. Mike Brown", "CS"))
            .with_room(Room::new("CS-101", 120))
    }

    #[test]
    fn test_valid_draft() {
        assert!(validate_draft(&sample_draft()).is_ok());
        assert!(validate_with_directory(&sample_draft(), Some(&sample_directory())).is_ok());
    }

    #[test]
    fn test_end_equal_to_start() {
        let draft = sample_draft().between(t(10, 0), t(10, 0));
        let errors = validate_draft(&draft).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidTimeRange));
    }

    #[test]
    fn test_end_before_start() {
        let draft = sample_draft().between(t(11, 0), t(9, 0));
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn test_missing_end() {
        let mut draft = sample_draft();
        draft.end_time = None;
        let errors = validate_draft(&draft).unwrap_err();
        assert_eq!(errors[0].kind, ValidationErrorKind::InvalidTimeRange);
    }

    #[test]
    fn test_day_out_of_range() {
        for day in [0, 6, 7] {
            let errors = validate_draft(&sample_draft().on_day(day)).unwrap_err();
            assert!(errors
                .iter()
                .any(|e| e.kind == ValidationErrorKind::DayOutOfRange));
        }
    }

    #[test]
    fn test_unknown_references() {
        let draft = sample_draft().with_lecturer("L99").in_room("Z-1");
        let errors = validate_references(&draft, &sample_directory()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::UnknownLecturer));
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::UnknownRoom));
    }

    #[test]
    fn test_without_directory_skips_reference_check() {
        let draft = sample_draft().with_lecturer("anyone");
        assert!(validate_with_directory(&draft, None).is_ok());
    }

    #[test]
    fn test_multiple_errors() {
        let draft = SessionDraft::new("  ", SessionType::Exam).on_day(9);
        let errors = validate_draft(&draft).unwrap_err();
        // blank title, bad day, no end, no department, no lecturer, no room
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_duplicate_session_ids() {
        let s = sample_draft().build(Uuid::new_v4(), Utc::now()).unwrap();
        let errors = validate_sessions(&[s.clone(), s]).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_error_display() {
        let errors = validate_draft(&sample_draft().on_day(0)).unwrap_err();
        assert!(errors[0].to_string().contains("day of week 0"));
    }
}
