//! Weekly time slots.
//!
//! A slot is a teaching day plus a half-open wall-clock range
//! `[start, end)`. Times are campus-local; there is no timezone handling.
//!
//! # Time Model
//! All comparisons happen at minute granularity after normalizing to
//! minutes since midnight. Seconds are truncated.
//!
//! # Overlap
//! Two slots overlap iff they share a day and
//! `a.start < b.end && b.start < a.end`. Slots that merely touch
//! (one ends at 10:00, the other starts at 10:00) do not overlap.

use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Minutes since midnight.
pub type Minute = u32;

/// Normalizes a time of day to minutes since midnight.
#[inline]
pub fn minute_of_day(time: NaiveTime) -> Minute {
    time.num_seconds_from_midnight() / 60
}

/// Builds a time of day from minutes since midnight.
///
/// Returns `None` at or past 24:00.
pub fn time_from_minute(minute: Minute) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0)
}

/// A teaching day. Serialized as the integer 1..=5 (Monday = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
}

impl Weekday {
    /// All teaching days, Monday first.
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    /// Converts from the 1..=5 wire number.
    pub fn from_number(day: u8) -> Option<Self> {
        match day {
            1 => Some(Self::Monday),
            2 => Some(Self::Tuesday),
            3 => Some(Self::Wednesday),
            4 => Some(Self::Thursday),
            5 => Some(Self::Friday),
            _ => None,
        }
    }

    /// The 1..=5 wire number.
    #[inline]
    pub fn number(self) -> u8 {
        self as u8
    }

    /// English day name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
        }
    }

    /// The following teaching day, wrapping Friday to Monday.
    pub fn next(self) -> Self {
        match self {
            Self::Monday => Self::Tuesday,
            Self::Tuesday => Self::Wednesday,
            Self::Wednesday => Self::Thursday,
            Self::Thursday => Self::Friday,
            Self::Friday => Self::Monday,
        }
    }
}

impl TryFrom<u8> for Weekday {
    type Error = String;

    fn try_from(day: u8) -> Result<Self, Self::Error> {
        Self::from_number(day).ok_or_else(|| format!("day of week {day} is outside 1..=5"))
    }
}

impl From<Weekday> for u8 {
    fn from(day: Weekday) -> Self {
        day.number()
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A weekly slot: day plus half-open time range `[start, end)`.
///
/// `end > start` is an input invariant enforced by validation; the
/// methods here assume it and never treat an empty slot specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Teaching day.
    pub day: Weekday,
    /// Start time (inclusive).
    pub start: NaiveTime,
    /// End time (exclusive).
    pub end: NaiveTime,
}

impl TimeSlot {
    /// Creates a new slot.
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self { day, start, end }
    }

    /// Creates a slot from minute offsets.
    ///
    /// Returns `None` if either offset is at or past midnight.
    pub fn from_minutes(day: Weekday, start: Minute, end: Minute) -> Option<Self> {
        Some(Self::new(day, time_from_minute(start)?, time_from_minute(end)?))
    }

    /// Start as minutes since midnight.
    #[inline]
    pub fn start_minute(&self) -> Minute {
        minute_of_day(self.start)
    }

    /// End as minutes since midnight.
    #[inline]
    pub fn end_minute(&self) -> Minute {
        minute_of_day(self.end)
    }

    /// Duration in minutes (zero if the slot is malformed).
    #[inline]
    pub fn duration_minutes(&self) -> Minute {
        self.end_minute().saturating_sub(self.start_minute())
    }

    /// Whether `end > start` at minute granularity.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.end_minute() > self.start_minute()
    }

    /// Whether a minute of the given day falls within this slot.
    #[inline]
    pub fn contains(&self, day: Weekday, minute: Minute) -> bool {
        self.day == day && minute >= self.start_minute() && minute < self.end_minute()
    }

    /// Whether two slots overlap (same day, half-open ranges intersect).
    pub fn overlaps(&self, other: &Self) -> bool {
        overlaps(self, other)
    }

    /// Overlapping minutes with another slot (0 when disjoint).
    pub fn overlap_minutes(&self, other: &Self) -> Minute {
        if self.day != other.day {
            return 0;
        }
        let start = self.start_minute().max(other.start_minute());
        let end = self.end_minute().min(other.end_minute());
        end.saturating_sub(start)
    }

    /// Same slot shifted to another day.
    pub fn on_day(&self, day: Weekday) -> Self {
        Self { day, ..*self }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.day,
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Half-open overlap test: `a.day == b.day && a.start < b.end && b.start < a.end`.
pub fn overlaps(a: &TimeSlot, b: &TimeSlot) -> bool {
    a.day == b.day
        && a.start_minute() < b.end_minute()
        && b.start_minute() < a.end_minute()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_slot_duration_and_contains() {
        let s = TimeSlot::new(Weekday::Monday, t(9, 0), t(11, 0));
        assert_eq!(s.duration_minutes(), 120);
        assert!(s.contains(Weekday::Monday, 9 * 60));
        assert!(s.contains(Weekday::Monday, 11 * 60 - 1));
        assert!(!s.contains(Weekday::Monday, 11 * 60)); // exclusive end
        assert!(!s.contains(Weekday::Tuesday, 10 * 60));
    }

    #[test]
    fn test_slot_overlap() {
        let a = TimeSlot::new(Weekday::Monday, t(9, 0), t(11, 0));
        let b = TimeSlot::new(Weekday::Monday, t(10, 0), t(12, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert_eq!(a.overlap_minutes(&b), 60);
    }

    #[test]
    fn test_touching_slots_do_not_overlap() {
        let a = TimeSlot::new(Weekday::Monday, t(9, 0), t(10, 0));
        let b = TimeSlot::new(Weekday::Monday, t(10, 0), t(11, 0));
        assert!(!overlaps(&a, &b));
        assert_eq!(a.overlap_minutes(&b), 0);
    }

    #[test]
    fn test_different_days_never_overlap() {
        let a = TimeSlot::new(Weekday::Monday, t(9, 0), t(11, 0));
        let b = a.on_day(Weekday::Tuesday);
        assert!(!a.overlaps(&b));
        assert_eq!(a.overlap_minutes(&b), 0);
    }

    #[test]
    fn test_seconds_are_truncated() {
        let a = TimeSlot::new(
            Weekday::Friday,
            t(9, 0),
            NaiveTime::from_hms_opt(10, 0, 30).unwrap(),
        );
        let b = TimeSlot::new(Weekday::Friday, t(10, 0), t(11, 0));
        assert_eq!(a.end_minute(), 600);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_weekday_conversion() {
        assert_eq!(Weekday::from_number(1), Some(Weekday::Monday));
        assert_eq!(Weekday::from_number(5), Some(Weekday::Friday));
        assert_eq!(Weekday::from_number(0), None);
        assert_eq!(Weekday::from_number(6), None);
        assert_eq!(Weekday::Wednesday.number(), 3);
        assert_eq!(Weekday::Friday.next(), Weekday::Monday);
        assert!(Weekday::try_from(7).is_err());
    }

    #[test]
    fn test_display() {
        let s = TimeSlot::new(Weekday::Tuesday, t(14, 0), t(15, 30));
        assert_eq!(s.to_string(), "Tuesday 14:00-15:30");
    }

    #[test]
    fn test_from_minutes() {
        let s = TimeSlot::from_minutes(Weekday::Monday, 540, 600).unwrap();
        assert_eq!(s.start, t(9, 0));
        assert_eq!(s.end, t(10, 0));
        assert!(TimeSlot::from_minutes(Weekday::Monday, 540, 24 * 60).is_none());
    }
}
