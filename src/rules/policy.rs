//! Severity thresholds.

use serde::{Deserialize, Serialize};

use crate::models::Severity;

/// Thresholds used by the built-in rules to grade conflicts.
///
/// The overlap thresholds apply to lecturer and room clashes and compare
/// against the fraction of the *shorter* session that is overlapped.
/// Capacity thresholds compare `overflow / capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityPolicy {
    /// Coverage at or above which a clash is `High` (default 0.5).
    pub high_overlap_ratio: f64,
    /// Coverage at or above which a clash is `Critical`. `None` disables it.
    pub critical_overlap_ratio: Option<f64>,
    /// Overflow ratio at or above which a capacity conflict is `High`.
    pub capacity_high_ratio: f64,
    /// Overflow ratio at or above which a capacity conflict is `Critical`.
    pub capacity_critical_ratio: f64,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            high_overlap_ratio: 0.5,
            critical_overlap_ratio: None,
            capacity_high_ratio: 0.2,
            capacity_critical_ratio: 0.5,
        }
    }
}

impl SeverityPolicy {
    /// Sets the high-overlap threshold.
    pub fn with_high_overlap_ratio(mut self, ratio: f64) -> Self {
        self.high_overlap_ratio = ratio;
        self
    }

    /// Enables critical grading for clashes covering at least `ratio`.
    pub fn with_critical_overlap_ratio(mut self, ratio: f64) -> Self {
        self.critical_overlap_ratio = Some(ratio);
        self
    }

    /// Sets the capacity thresholds.
    pub fn with_capacity_ratios(mut self, high: f64, critical: f64) -> Self {
        self.capacity_high_ratio = high;
        self.capacity_critical_ratio = critical;
        self
    }

    /// Grades a lecturer or room clash by coverage of the shorter session.
    pub fn clash_severity(&self, coverage: f64) -> Severity {
        match self.critical_overlap_ratio {
            Some(critical) if coverage >= critical => Severity::Critical,
            _ if coverage >= self.high_overlap_ratio => Severity::High,
            _ => Severity::Medium,
        }
    }

    /// Grades a capacity overrun.
    ///
    /// A session with zero declared capacity and any students is critical.
    pub fn capacity_severity(&self, students: u32, capacity: u32) -> Severity {
        if capacity == 0 {
            return Severity::Critical;
        }
        let overflow = f64::from(students.saturating_sub(capacity)) / f64::from(capacity);
        if overflow >= self.capacity_critical_ratio {
            Severity::Critical
        } else if overflow >= self.capacity_high_ratio {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Checks that all thresholds are usable.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.high_overlap_ratio > 0.0 && self.high_overlap_ratio <= 1.0) {
            return Err(format!(
                "high_overlap_ratio must be in (0, 1], got {}",
                self.high_overlap_ratio
            ));
        }
        if let Some(critical) = self.critical_overlap_ratio {
            if !(self.high_overlap_ratio..=1.0).contains(&critical) {
                return Err(format!(
                    "critical_overlap_ratio must be in [high_overlap_ratio, 1], got {critical}"
                ));
            }
        }
        if !(self.capacity_high_ratio > 0.0
            && self.capacity_critical_ratio >= self.capacity_high_ratio)
        {
            return Err(format!(
                "capacity ratios must satisfy 0 < high <= critical, got {} and {}",
                self.capacity_high_ratio, self.capacity_critical_ratio
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clash_severity_default() {
        let p = SeverityPolicy::default();
        assert_eq!(p.clash_severity(0.5), Severity::High);
        assert_eq!(p.clash_severity(1.0), Severity::High);
        assert_eq!(p.clash_severity(0.49), Severity::Medium);
    }

    #[test]
    fn test_clash_severity_with_critical() {
        let p = SeverityPolicy::default().with_critical_overlap_ratio(1.0);
        assert_eq!(p.clash_severity(1.0), Severity::Critical);
        assert_eq!(p.clash_severity(0.75), Severity::High);
    }

    #[test]
    fn test_capacity_severity() {
        let p = SeverityPolicy::default();
        assert_eq!(p.capacity_severity(31, 30), Severity::Medium); // 3%
        assert_eq!(p.capacity_severity(40, 30), Severity::High); // 33%
        assert_eq!(p.capacity_severity(45, 30), Severity::Critical); // 50%
        assert_eq!(p.capacity_severity(5, 0), Severity::Critical);
    }

    #[test]
    fn test_validate() {
        assert!(SeverityPolicy::default().validate().is_ok());
        assert!(SeverityPolicy::default()
            .with_high_overlap_ratio(0.0)
            .validate()
            .is_err());
        assert!(SeverityPolicy::default()
            .with_critical_overlap_ratio(0.3)
            .validate()
            .is_err());
        assert!(SeverityPolicy::default()
            .with_capacity_ratios(0.5, 0.2)
            .validate()
            .is_err());
    }
}
