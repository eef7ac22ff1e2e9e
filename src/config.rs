//! Engine configuration file support.
//!
//! Reads [`EngineConfig`] from TOML. Every section and key is optional;
//! missing values take their defaults.
//!
//! ```toml
//! [severity]
//! high_overlap_ratio = 0.5
//! critical_overlap_ratio = 1.0
//!
//! [rules]
//! department_overlap = false
//!
//! [retry]
//! max_retries = 5
//!
//! [suggest]
//! day_start = "08:00:00"
//! day_end = "20:00:00"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::retry::RetryPolicy;
use crate::rules::{RuleSet, RuleToggles, SeverityPolicy};
use crate::suggest::SuggestConfig;

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub severity: SeverityPolicy,
    pub rules: RuleToggles,
    pub retry: RetryPolicy,
    pub suggest: SuggestConfig,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks every section.
    pub fn validate(&self) -> EngineResult<()> {
        self.severity
            .validate()
            .map_err(|e| EngineError::Config(format!("[severity] {e}")))?;
        self.retry
            .validate()
            .map_err(|e| EngineError::Config(format!("[retry] {e}")))?;
        self.suggest
            .validate()
            .map_err(|e| EngineError::Config(format!("[suggest] {e}")))?;
        Ok(())
    }

    /// Rule set described by the `[rules]` and `[severity]` sections.
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::from_toggles(&self.rules, self.severity.clone())
    }

    /// Minutes in the configured teaching week.
    pub fn week_minutes(&self) -> u32 {
        self.suggest.day_minutes() * 5
    }
}
