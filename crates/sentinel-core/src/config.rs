//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::advisory::AdvisoryConfig;
use crate::ban_vote::DEFAULT_VOTE_WINDOW_SECS;
use crate::classifier::OffenseTable;
use crate::error::{Error, Result};
use crate::escalation::EscalationConfig;
use crate::intake::DEFAULT_INTAKE_TIMEOUT_SECS;
use crate::ledger::DEFAULT_RETENTION_DAYS;
use crate::orchestrator::DEFAULT_MAX_MANUAL_POINTS;

/// Discipline settings, the `[discipline]` section of the app config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineConfig {
    /// Days a grant counts towards the total
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Ban vote window in seconds
    #[serde(default = "default_vote_window_secs")]
    pub vote_window_secs: u64,
    /// Seconds a reporter has to give a reason
    #[serde(default = "default_intake_timeout_secs")]
    pub intake_timeout_secs: u64,
    /// Upper bound for hand-assigned points
    #[serde(default = "default_max_manual_points")]
    pub max_manual_points: i64,
    /// Thresholds and base durations
    #[serde(default)]
    pub escalation: EscalationConfig,
    /// Advisory track
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    /// Keyword table
    #[serde(default)]
    pub offenses: OffenseTable,
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_vote_window_secs() -> u64 {
    DEFAULT_VOTE_WINDOW_SECS
}

fn default_intake_timeout_secs() -> u64 {
    DEFAULT_INTAKE_TIMEOUT_SECS
}

fn default_max_manual_points() -> i64 {
    DEFAULT_MAX_MANUAL_POINTS
}

impl Default for DisciplineConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            vote_window_secs: default_vote_window_secs(),
            intake_timeout_secs: default_intake_timeout_secs(),
            max_manual_points: default_max_manual_points(),
            escalation: EscalationConfig::default(),
            advisory: AdvisoryConfig::default(),
            offenses: OffenseTable::default(),
        }
    }
}

impl DisciplineConfig {
    /// Check scalar settings; tables are checked when their components are built
    pub fn validate(&self) -> Result<()> {
        if self.retention_days <= 0 {
            return Err(Error::Configuration(format!(
                "retention_days must be positive, got {}",
                self.retention_days
            )));
        }
        if self.vote_window_secs == 0 {
            return Err(Error::Configuration(
                "vote_window_secs must be positive".to_string(),
            ));
        }
        if self.intake_timeout_secs == 0 {
            return Err(Error::Configuration(
                "intake_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_manual_points < 0 {
            return Err(Error::Configuration(
                "max_manual_points must not be negative".to_string(),
            ));
        }
        self.advisory.validate()
    }

    /// Retention window
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    /// Ban vote window
    #[must_use]
    pub fn vote_window(&self) -> Duration {
        Duration::from_secs(self.vote_window_secs)
    }

    /// Reason intake timeout
    #[must_use]
    pub fn intake_timeout(&self) -> Duration {
        Duration::from_secs(self.intake_timeout_secs)
    }
}
