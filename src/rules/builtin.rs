//! Built-in conflict rules.
//!
//! # Categories
//!
//! - **Pairwise**: DUPLICATE, LECTURER, ROOM, OVERLAP
//! - **Single session**: CAPACITY
//!
//! # Severity
//! - Duplicate bookings are always `Critical`.
//! - Lecturer and room clashes are graded by how much of the shorter
//!   session is overlapped (see [`SeverityPolicy::clash_severity`]).
//! - Department overlaps are always `Low`.
//! - Capacity overruns are graded by overflow ratio.

use super::{PairContext, PairRule, SessionRule, SeverityPolicy};
use crate::models::{ConflictCandidate, ConflictKey, ConflictType, Session, Severity};

// ======================== Pairwise rules ========================

/// Exact duplicate booking.
///
/// Two sessions with the same slot, room, lecturer and department.
/// Reported as a critical room conflict: the same booking was entered twice.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateBooking;

impl PairRule for DuplicateBooking {
    fn name(&self) -> &'static str {
        "DUPLICATE"
    }

    fn evaluate(
        &self,
        a: &Session,
        b: &Session,
        _context: &PairContext,
        _policy: &SeverityPolicy,
    ) -> Option<ConflictCandidate> {
        if !a.same_booking(b) {
            return None;
        }
        Some(
            ConflictCandidate::new(
                ConflictKey::pair(a.id, b.id, ConflictType::Room),
                Severity::Critical,
                format!(
                    "'{}' is booked twice in room {} on {}",
                    a.title, a.room, a.slot
                ),
            )
            .with_overlap(a.slot.duration_minutes()),
        )
    }

    fn description(&self) -> &'static str {
        "Duplicate booking"
    }
}

/// Lecturer double-booking.
///
/// A person cannot be in two places at once.
#[derive(Debug, Clone, Copy)]
pub struct LecturerClash;

impl PairRule for LecturerClash {
    fn name(&self) -> &'static str {
        "LECTURER"
    }

    fn evaluate(
        &self,
        a: &Session,
        b: &Session,
        context: &PairContext,
        policy: &SeverityPolicy,
    ) -> Option<ConflictCandidate> {
        if a.lecturer_id != b.lecturer_id {
            return None;
        }
        Some(
            ConflictCandidate::new(
                ConflictKey::pair(a.id, b.id, ConflictType::Lecturer),
                policy.clash_severity(context.coverage()),
                format!(
                    "Lecturer {} is double-booked on {} ('{}' and '{}')",
                    a.lecturer_id, context.window, a.title, b.title
                ),
            )
            .with_overlap(context.overlap_minutes),
        )
    }

    fn description(&self) -> &'static str {
        "Lecturer double-booking"
    }
}

/// Room double-booking.
///
/// Only fires when the lecturers differ; a shared lecturer is the
/// stronger constraint and is reported by [`LecturerClash`].
#[derive(Debug, Clone, Copy)]
pub struct RoomClash;

impl PairRule for RoomClash {
    fn name(&self) -> &'static str {
        "ROOM"
    }

    fn evaluate(
        &self,
        a: &Session,
        b: &Session,
        context: &PairContext,
        policy: &SeverityPolicy,
    ) -> Option<ConflictCandidate> {
        if a.room != b.room || a.lecturer_id == b.lecturer_id {
            return None;
        }
        Some(
            ConflictCandidate::new(
                ConflictKey::pair(a.id, b.id, ConflictType::Room),
                policy.clash_severity(context.coverage()),
                format!(
                    "Room {} is double-booked on {} ('{}' and '{}')",
                    a.room, context.window, a.title, b.title
                ),
            )
            .with_overlap(context.overlap_minutes),
        )
    }

    fn description(&self) -> &'static str {
        "Room double-booking"
    }
}

/// Same-department overlap.
///
/// Sessions of one department that overlap without sharing a lecturer or
/// room. Students of that department may be expected at both.
#[derive(Debug, Clone, Copy)]
pub struct DepartmentOverlap;

impl PairRule for DepartmentOverlap {
    fn name(&self) -> &'static str {
        "OVERLAP"
    }

    fn evaluate(
        &self,
        a: &Session,
        b: &Session,
        context: &PairContext,
        _policy: &SeverityPolicy,
    ) -> Option<ConflictCandidate> {
        if a.department_id != b.department_id
            || a.lecturer_id == b.lecturer_id
            || a.room == b.room
        {
            return None;
        }
        Some(
            ConflictCandidate::new(
                ConflictKey::pair(a.id, b.id, ConflictType::Overlap),
                Severity::Low,
                format!(
                    "'{}' and '{}' of department {} overlap on {}",
                    a.title, b.title, a.department_id, context.window
                ),
            )
            .with_overlap(context.overlap_minutes),
        )
    }

    fn description(&self) -> &'static str {
        "Same-department overlap"
    }
}

// ======================== Single-session rules ========================

/// Capacity overrun.
///
/// Expected students exceed the declared room capacity. Not an overlap
/// condition: evaluated with no regard to other sessions.
#[derive(Debug, Clone, Copy)]
pub struct CapacityOverrun;

impl SessionRule for CapacityOverrun {
    fn name(&self) -> &'static str {
        "CAPACITY"
    }

    fn evaluate(&self, session: &Session, policy: &SeverityPolicy) -> Option<ConflictCandidate> {
        let students = session.student_count?;
        if students <= session.capacity {
            return None;
        }
        Some(ConflictCandidate::new(
            ConflictKey::single(session.id, ConflictType::Capacity),
            policy.capacity_severity(students, session.capacity),
            format!(
                "'{}' expects {} students but room {} seats {}",
                session.title, students, session.room, session.capacity
            ),
        ))
    }

    fn description(&self) -> &'static str {
        "Room capacity exceeded"
    }
}
