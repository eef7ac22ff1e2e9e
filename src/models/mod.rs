//! Timetable domain models.
//!
//! Plain data types shared by the rule set, the detector, the
//! reconciliation step and the mutation pipeline.
//!
//! # Domain Mappings
//!
//! | Model | Timetable | Stored as |
//! |-------|-----------|-----------|
//! | `Session` | Lecture / lab / tutorial / exam | `schedules` row |
//! | `TimeSlot` | Day + `[start, end)` | `day_of_week`, `start_time`, `end_time` |
//! | `Conflict` | Clash warning | `schedule_conflicts` row |
//! | `Directory` | Departments, lecturers, rooms | reference tables |

mod conflict;
mod directory;
mod session;
mod slot;

pub use conflict::{
    Conflict, ConflictCandidate, ConflictId, ConflictKey, ConflictType, Severity,
};
pub use directory::{Department, Directory, Lecturer, Room};
pub use session::{Session, SessionDraft, SessionId, SessionPatch, SessionType};
pub use slot::{minute_of_day, overlaps, time_from_minute, Minute, TimeSlot, Weekday};
