//! Advisory warning track
//!
//! Advisory reports do not grant points directly. The first warning is
//! recorded only, the second mutes briefly, and the third converts the record
//! into a one-point grant and starts the cycle again:
//!
//! ```text
//! Clean ──warn──▶ FirstWarning ──warn──▶ SecondWarning ──warn──▶ Converted ─▶ Clean
//!                  (no action)            (short mute)            (+1 point)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ledger::{ActorKey, AdvisoryWarning, Ledger, PointGrant};

/// Reserved reason that routes a report onto the advisory track
pub const ADVISORY_REASON: &str = "advisory";

/// Advisory track settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Warning count that triggers the short mute
    #[serde(default = "default_mute_at")]
    pub mute_at: u32,
    /// Warning count that converts the record into points
    #[serde(default = "default_convert_at")]
    pub convert_at: u32,
    /// Length of the short mute, in minutes
    #[serde(default = "default_mute_minutes")]
    pub mute_minutes: u64,
    /// Points granted on conversion
    #[serde(default = "default_conversion_points")]
    pub conversion_points: i64,
}

fn default_mute_at() -> u32 {
    2
}

fn default_convert_at() -> u32 {
    3
}

fn default_mute_minutes() -> u64 {
    5
}

fn default_conversion_points() -> i64 {
    1
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            mute_at: default_mute_at(),
            convert_at: default_convert_at(),
            mute_minutes: default_mute_minutes(),
            conversion_points: default_conversion_points(),
        }
    }
}

impl AdvisoryConfig {
    /// Check the counts are ordered and non-zero
    pub fn validate(&self) -> Result<()> {
        if self.mute_at == 0 || self.convert_at <= self.mute_at {
            return Err(Error::Configuration(format!(
                "advisory counts must satisfy 0 < mute_at < convert_at, got {} and {}",
                self.mute_at, self.convert_at
            )));
        }
        if self.conversion_points < 0 {
            return Err(Error::Configuration(
                "advisory conversion points must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Length of the short mute
    #[must_use]
    pub fn mute_duration(&self) -> Duration {
        Duration::from_secs(self.mute_minutes * 60)
    }
}

/// Where an actor stands on the advisory track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryState {
    /// No outstanding warnings
    Clean,
    /// One warning on record
    FirstWarning,
    /// Two or more warnings on record; the next one converts
    SecondWarning,
}

impl AdvisoryState {
    /// State for an outstanding warning count
    #[must_use]
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => Self::Clean,
            1 => Self::FirstWarning,
            _ => Self::SecondWarning,
        }
    }
}

/// Result of one advisory warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryStep {
    /// Warning recorded, nothing to enforce
    Warned {
        /// Warnings on record
        count: u32,
    },
    /// Warning recorded and a short mute is due
    Muted {
        /// Warnings on record
        count: u32,
        /// Mute length
        duration: Duration,
    },
    /// The record was converted into points and cleared
    Converted {
        /// Count that triggered the conversion
        count: u32,
        /// The grant written by the conversion
        grant: PointGrant,
    },
}

impl AdvisoryStep {
    /// Warning count observed by this step
    #[must_use]
    pub fn count(&self) -> u32 {
        match self {
            Self::Warned { count } | Self::Muted { count, .. } | Self::Converted { count, .. } => {
                *count
            }
        }
    }
}

/// Drives the advisory track on top of the ledger
pub struct AdvisoryTracker {
    ledger: Arc<Ledger>,
    config: AdvisoryConfig,
}

impl AdvisoryTracker {
    /// Create a tracker
    pub fn new(ledger: Arc<Ledger>, config: AdvisoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { ledger, config })
    }

    /// Track settings
    #[must_use]
    pub fn config(&self) -> &AdvisoryConfig {
        &self.config
    }

    /// Record one warning and report what it triggers
    pub async fn warn(
        &self,
        key: ActorKey,
        moderator_id: Option<u64>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AdvisoryStep> {
        let mut warning = AdvisoryWarning::new(now, moderator_id);
        if let Some(note) = note {
            warning = warning.with_note(note);
        }

        let tally = self
            .ledger
            .record_warning(
                key,
                &warning,
                self.config.convert_at,
                self.config.conversion_points,
            )
            .await?;

        Ok(match tally.conversion {
            Some(grant) => AdvisoryStep::Converted {
                count: tally.count,
                grant,
            },
            None if tally.count >= self.config.mute_at => AdvisoryStep::Muted {
                count: tally.count,
                duration: self.config.mute_duration(),
            },
            None => AdvisoryStep::Warned { count: tally.count },
        })
    }

    /// Current state, without recording anything
    pub async fn peek(&self, key: ActorKey) -> Result<AdvisoryState> {
        let count = self.ledger.warning_count(key).await?;
        Ok(AdvisoryState::from_count(count))
    }

    /// Outstanding warning count
    pub async fn count(&self, key: ActorKey) -> Result<u32> {
        self.ledger.warning_count(key).await
    }

    /// Drop the record; returns whether one existed
    pub async fn reset(&self, key: ActorKey) -> Result<bool> {
        self.ledger.reset_warnings(key).await
    }
}

/// Whether a reason selects the advisory track
#[must_use]
pub fn is_advisory(reason: &str) -> bool {
    reason.trim().eq_ignore_ascii_case(ADVISORY_REASON)
}
