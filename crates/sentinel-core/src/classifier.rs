//! Offense classification
//!
//! Maps a free-text report reason to a point value. Matching is plain
//! case-insensitive substring search over an ordered [`OffenseTable`]: levels
//! are scanned from the most severe downward and the first level owning a
//! keyword contained in the reason wins. No match yields the table's default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Points assigned when no keyword matches
pub const DEFAULT_SEVERITY: i64 = 2;

/// One severity level of the offense table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenseLevel {
    /// Points granted for this level
    pub points: i64,
    /// Short label shown to moderators
    pub label: String,
    /// What kind of behavior belongs here
    #[serde(default)]
    pub description: String,
    /// Case-insensitive substring triggers
    pub keywords: Vec<String>,
}

impl OffenseLevel {
    fn new(points: i64, label: &str, description: &str, keywords: &[&str]) -> Self {
        Self {
            points,
            label: label.to_string(),
            description: description.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Versioned keyword table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenseTable {
    /// Table revision, surfaced in logs and help output
    #[serde(default = "default_version")]
    pub version: u32,
    /// Points for reasons matching no keyword
    #[serde(default = "default_points")]
    pub default_points: i64,
    /// Severity levels, in any order
    pub levels: Vec<OffenseLevel>,
}

fn default_version() -> u32 {
    1
}

fn default_points() -> i64 {
    DEFAULT_SEVERITY
}

impl Default for OffenseTable {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_points: DEFAULT_SEVERITY,
            levels: vec![
                OffenseLevel::new(
                    1,
                    "notice",
                    "Minor spam or unnecessary messages",
                    &["notice", "spam", "unnecessary", "flooding", "low effort", "caps"],
                ),
                OffenseLevel::new(
                    2,
                    "warning",
                    "Light toxicity, passive-aggressive behavior, mild baiting",
                    &[
                        "warning",
                        "toxic",
                        "passive aggressive",
                        "rude",
                        "baiting",
                        "sarcastic",
                        "condescending",
                    ],
                ),
                OffenseLevel::new(
                    3,
                    "penalty",
                    "Repeated rule-breaking, drama baiting, filter bypass",
                    &[
                        "penalty",
                        "repeated",
                        "filter bypass",
                        "drama",
                        "rule breaking",
                        "ignoring rules",
                        "circumvent",
                    ],
                ),
                OffenseLevel::new(
                    4,
                    "suspension",
                    "Harassment, personal attacks, targeted disrespect",
                    &[
                        "suspension",
                        "harassment",
                        "personal attack",
                        "disrespect",
                        "targeting",
                        "bullying",
                        "being mean",
                        "cruel",
                    ],
                ),
                OffenseLevel::new(
                    5,
                    "expulsion",
                    "Hate speech, slurs, NSFW content in public areas",
                    &[
                        "expulsion",
                        "hate speech",
                        "slur",
                        "nsfw",
                        "inappropriate content",
                        "offensive",
                        "sexual",
                        "explicit",
                    ],
                ),
                OffenseLevel::new(
                    6,
                    "disruption",
                    "Aggressive trolling, major disruptions",
                    &["trolling", "disruption", "chaos", "intentional", "provoking fights"],
                ),
                OffenseLevel::new(
                    7,
                    "staff abuse",
                    "Extreme disrespect, targeting staff, ignoring warnings",
                    &["extreme", "staff", "ignoring warnings", "mod abuse", "authority"],
                ),
                OffenseLevel::new(
                    8,
                    "habitual",
                    "Multiple past offenses plus a serious new violation",
                    &[
                        "multiple offenses",
                        "serious violation",
                        "escalated",
                        "pattern",
                        "habitual",
                    ],
                ),
                OffenseLevel::new(
                    9,
                    "final",
                    "Final major offense before ban territory",
                    &["final warning", "major offense", "last chance", "extreme violation"],
                ),
                OffenseLevel::new(
                    10,
                    "ban worthy",
                    "Raiding, doxxing, threats, impersonation",
                    &[
                        "raiding",
                        "server raid",
                        "doxx",
                        "threat",
                        "impersonat",
                        "ban worthy",
                        "violence",
                        "illegal",
                        "criminal",
                    ],
                ),
            ],
        }
    }
}

/// Detailed classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Points for the reason
    pub points: i64,
    /// Label of the matched level, `None` when the default applied
    pub label: Option<String>,
    /// Keyword that decided the match
    pub matched_keyword: Option<String>,
}

/// Keyword classifier over a validated [`OffenseTable`]
#[derive(Debug, Clone)]
pub struct Classifier {
    table: OffenseTable,
}

impl Classifier {
    /// Validate and normalize a table
    pub fn new(mut table: OffenseTable) -> Result<Self> {
        if table.levels.is_empty() {
            return Err(Error::Configuration("offense table has no levels".to_string()));
        }
        if table.default_points < 0 {
            return Err(Error::Configuration(format!(
                "default points must not be negative, got {}",
                table.default_points
            )));
        }

        let mut seen = HashSet::new();
        for level in &mut table.levels {
            if level.points < 0 {
                return Err(Error::Configuration(format!(
                    "level '{}' has negative points",
                    level.label
                )));
            }
            if !seen.insert(level.points) {
                return Err(Error::Configuration(format!(
                    "duplicate offense level {}",
                    level.points
                )));
            }

            level.keywords = level
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            if level.keywords.is_empty() {
                return Err(Error::Configuration(format!(
                    "level '{}' has no keywords",
                    level.label
                )));
            }
        }

        // most severe first, so the scan can stop at the first hit
        table.levels.sort_by(|a, b| b.points.cmp(&a.points));
        Ok(Self { table })
    }

    /// Table revision
    #[must_use]
    pub fn version(&self) -> u32 {
        self.table.version
    }

    /// Points for a reason
    #[must_use]
    pub fn classify(&self, reason: &str) -> i64 {
        self.classify_detailed(reason).points
    }

    /// Points for a reason, with the level and keyword that decided it
    #[must_use]
    pub fn classify_detailed(&self, reason: &str) -> Classification {
        let normalized = reason.trim().to_lowercase();

        for level in &self.table.levels {
            if let Some(keyword) = level.keywords.iter().find(|k| normalized.contains(k.as_str())) {
                return Classification {
                    points: level.points,
                    label: Some(level.label.clone()),
                    matched_keyword: Some(keyword.clone()),
                };
            }
        }

        Classification {
            points: self.table.default_points,
            label: None,
            matched_keyword: None,
        }
    }

    /// Level definition for a point value
    #[must_use]
    pub fn describe(&self, points: i64) -> Option<&OffenseLevel> {
        self.table.levels.iter().find(|l| l.points == points)
    }

    /// First `limit` keywords of a level
    #[must_use]
    pub fn suggest_keywords(&self, points: i64, limit: usize) -> Vec<&str> {
        self.describe(points)
            .map(|l| l.keywords.iter().take(limit).map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Levels from least to most severe
    pub fn levels(&self) -> impl Iterator<Item = &OffenseLevel> {
        self.table.levels.iter().rev()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        let mut table = OffenseTable::default();
        table.levels.sort_by(|a, b| b.points.cmp(&a.points));
        Self { table }
    }
}
