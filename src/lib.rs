//! Conflict engine for university timetables.
//!
//! Detects lecturer double-bookings, room double-bookings, capacity
//! overruns and same-department overlaps in a weekly session timetable,
//! and keeps a stored conflict list consistent with the timetable as
//! sessions are created, moved, edited and deleted.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Session`, `TimeSlot`, `Conflict`,
//!   `ConflictKey`, `Directory`
//! - **`validation`**: Input checks (time ranges, weekdays, references)
//! - **`rules`**: Pair and single-session rules, severity policy, `RuleSet`
//! - **`detector`**: Full and incremental detection (pure)
//! - **`reconcile`**: Diff of candidates against stored conflicts
//! - **`repository`**: Async storage traits and in-memory backends
//! - **`pipeline`**: Serialized single and batch mutations with conflict upkeep
//! - **`report`**, **`suggest`**: Summaries and resolution suggestions
//! - **`config`**, **`retry`**, **`error`**: Configuration, backoff, errors
//!
//! # Architecture
//!
//! Detection is a pure function of the session set. The pipeline owns all
//! side effects: it persists a session change, runs incremental detection
//! for the changed session, and reconciles the conflict store so that the
//! unresolved conflicts always mirror the current timetable.
//!
//! ```
//! use chrono::NaiveTime;
//! use timetable_conflicts::detector::detect_full;
//! use timetable_conflicts::models::{ConflictType, SessionDraft, SessionType};
//! use uuid::Uuid;
//!
//! let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
//! let lecture = |title: &str, room: &str, start, end| {
//!     SessionDraft::new(title, SessionType::Lecture)
//!         .with_department("CS")
//!         .with_lecturer("L1")
//!         .in_room(room)
//!         .on_day(1)
//!         .between(t(start), t(end))
//!         .with_capacity(100)
//!         .build(Uuid::new_v4(), chrono::Utc::now())
//!         .unwrap()
//! };
//!
//! let found = detect_full(&[lecture("A", "R1", 9, 11), lecture("B", "R2", 10, 12)]);
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].conflict_type(), ConflictType::Lecturer);
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod repository;
pub mod retry;
pub mod rules;
pub mod suggest;
pub mod validation;

pub use config::EngineConfig;
pub use detector::{detect_full, detect_incremental, ConflictDetector};
pub use error::{EngineError, EngineResult};
pub use pipeline::{BatchOutcome, MutationOutcome, MutationPipeline};
pub use reconcile::{reconcile, ReconcilePlan};
