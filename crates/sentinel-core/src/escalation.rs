//! Escalation policy
//!
//! Turns a decayed point total (and the points just granted) into a
//! consequence. Threshold mutes apply once a total crosses a threshold; below
//! the first threshold the duration depends on the size of the latest grant.
//! Reaching the terminal threshold always opens a ban vote.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// What the engine should do about an actor's standing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "duration", rename_all = "snake_case")]
pub enum Action {
    /// Nothing to enforce
    NoAction,
    /// Timeout for the given duration
    Mute(Duration),
    /// Put a ban to a community vote
    BanVote,
}

/// A threshold or base duration entry, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRule {
    /// Total (thresholds) or granted points (base table)
    pub points: i64,
    /// Mute length in minutes
    pub minutes: u64,
}

impl DurationRule {
    /// Create a rule
    #[must_use]
    pub const fn new(points: i64, minutes: u64) -> Self {
        Self { points, minutes }
    }

    /// Mute length
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.minutes * 60)
    }
}

const HOUR: u64 = 60;
const DAY: u64 = 24 * HOUR;

/// Escalation tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Total at which a ban vote opens
    #[serde(default = "default_terminal_threshold")]
    pub terminal_threshold: i64,
    /// Total-based mutes; highest threshold not above the total applies
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<DurationRule>,
    /// Mutes keyed by the points just granted
    #[serde(default = "default_base_durations")]
    pub base_durations: Vec<DurationRule>,
}

fn default_terminal_threshold() -> i64 {
    15
}

fn default_thresholds() -> Vec<DurationRule> {
    vec![
        DurationRule::new(5, DAY),
        DurationRule::new(8, 3 * DAY),
        DurationRule::new(10, 7 * DAY),
    ]
}

fn default_base_durations() -> Vec<DurationRule> {
    vec![
        DurationRule::new(0, 5),
        DurationRule::new(1, 15),
        DurationRule::new(2, 40),
        DurationRule::new(3, 2 * HOUR),
        DurationRule::new(4, 6 * HOUR),
        DurationRule::new(5, 24 * HOUR),
        DurationRule::new(6, DAY),
        DurationRule::new(7, 2 * DAY),
        DurationRule::new(8, 3 * DAY),
        DurationRule::new(9, 5 * DAY),
    ]
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            terminal_threshold: default_terminal_threshold(),
            thresholds: default_thresholds(),
            base_durations: default_base_durations(),
        }
    }
}

/// Validated escalation policy
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    terminal_threshold: i64,
    thresholds: Vec<DurationRule>,
    base_durations: Vec<DurationRule>,
}

impl EscalationPolicy {
    /// Validate and sort the tables
    pub fn new(config: EscalationConfig) -> Result<Self> {
        if config.terminal_threshold <= 0 {
            return Err(Error::Configuration(format!(
                "terminal threshold must be positive, got {}",
                config.terminal_threshold
            )));
        }

        let mut thresholds = config.thresholds;
        let mut base_durations = config.base_durations;
        thresholds.sort_by_key(|r| r.points);
        base_durations.sort_by_key(|r| r.points);

        for table in [&thresholds, &base_durations] {
            if table.windows(2).any(|w| w[0].points == w[1].points) {
                return Err(Error::Configuration(
                    "escalation table contains duplicate entries".to_string(),
                ));
            }
        }
        if let Some(rule) = thresholds
            .iter()
            .find(|r| r.points <= 0 || r.points >= config.terminal_threshold)
        {
            return Err(Error::Configuration(format!(
                "threshold {} must lie between 1 and the terminal threshold {}",
                rule.points, config.terminal_threshold
            )));
        }

        Ok(Self {
            terminal_threshold: config.terminal_threshold,
            thresholds,
            base_durations,
        })
    }

    /// Total at which a ban vote opens
    #[must_use]
    pub fn terminal_threshold(&self) -> i64 {
        self.terminal_threshold
    }

    /// Ascending thresholds
    #[must_use]
    pub fn thresholds(&self) -> &[DurationRule] {
        &self.thresholds
    }

    /// Consequence for `total` after a grant of `granted` points
    #[must_use]
    pub fn resolve(&self, total: i64, granted: i64) -> Action {
        if total >= self.terminal_threshold {
            return Action::BanVote;
        }

        if let Some(rule) = self.thresholds.iter().rev().find(|r| r.points <= total) {
            return Action::Mute(rule.duration());
        }

        self.base_duration(granted)
            .map_or(Action::NoAction, Action::Mute)
    }

    /// Base mute for a grant size, clamped to the largest entry
    #[must_use]
    pub fn base_duration(&self, granted: i64) -> Option<Duration> {
        if let Some(rule) = self.base_durations.iter().find(|r| r.points == granted) {
            return Some(rule.duration());
        }
        match self.base_durations.last() {
            Some(largest) if granted > largest.points => Some(largest.duration()),
            _ => None,
        }
    }

    /// Next step above `total`: the threshold value and what it triggers
    #[must_use]
    pub fn next_threshold(&self, total: i64) -> Option<(i64, Action)> {
        if let Some(rule) = self.thresholds.iter().find(|r| r.points > total) {
            return Some((rule.points, Action::Mute(rule.duration())));
        }
        if total < self.terminal_threshold {
            return Some((self.terminal_threshold, Action::BanVote));
        }
        None
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        let config = EscalationConfig::default();
        Self {
            terminal_threshold: config.terminal_threshold,
            thresholds: config.thresholds,
            base_durations: config.base_durations,
        }
    }
}
