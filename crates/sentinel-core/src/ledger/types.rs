use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason tag recorded on grants produced by advisory conversion
pub const ADVISORY_CONVERSION_REASON: &str = "advisory_conversion";

/// Identifies one disciplined actor inside one community
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorKey {
    /// Community (guild) ID
    pub community_id: u64,
    /// Actor (member) ID
    pub actor_id: u64,
}

impl ActorKey {
    /// Create a new key
    #[must_use]
    pub fn new(community_id: u64, actor_id: u64) -> Self {
        Self {
            community_id,
            actor_id,
        }
    }
}

impl std::fmt::Display for ActorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.community_id, self.actor_id)
    }
}

/// One punishment event on an actor's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointGrant {
    /// Unique grant ID
    pub id: Uuid,
    /// Community the grant belongs to
    pub community_id: u64,
    /// Disciplined actor
    pub actor_id: u64,
    /// Severity weight (never negative)
    pub points: i64,
    /// Free-text reason the points were derived from
    pub reason: String,
    /// Creation timestamp
    pub granted_at: DateTime<Utc>,
    /// Moderator or reporter who issued the grant
    pub moderator_id: Option<u64>,
}

impl PointGrant {
    /// Create a new grant
    #[must_use]
    pub fn new(
        key: ActorKey,
        points: i64,
        reason: impl Into<String>,
        granted_at: DateTime<Utc>,
        moderator_id: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            community_id: key.community_id,
            actor_id: key.actor_id,
            points,
            reason: reason.into(),
            granted_at,
            moderator_id,
        }
    }

    /// Key this grant is recorded under
    #[must_use]
    pub fn key(&self) -> ActorKey {
        ActorKey::new(self.community_id, self.actor_id)
    }
}

/// One advisory warning on an actor's record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryWarning {
    /// When the warning was issued
    pub issued_at: DateTime<Utc>,
    /// Who issued it
    pub moderator_id: Option<u64>,
    /// Optional note attached by the moderator
    pub note: Option<String>,
}

impl AdvisoryWarning {
    /// Create a new warning
    #[must_use]
    pub fn new(issued_at: DateTime<Utc>, moderator_id: Option<u64>) -> Self {
        Self {
            issued_at,
            moderator_id,
            note: None,
        }
    }

    /// Attach a note
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Selects grants for physical deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantFilter {
    /// Every grant of the key
    All,
    /// Grants created at or before the cutoff
    GrantedAtOrBefore(DateTime<Utc>),
    /// Specific grants
    Ids(Vec<Uuid>),
}

impl GrantFilter {
    /// Check whether a grant is selected by this filter
    #[must_use]
    pub fn matches(&self, grant: &PointGrant) -> bool {
        match self {
            Self::All => true,
            Self::GrantedAtOrBefore(cutoff) => grant.granted_at <= *cutoff,
            Self::Ids(ids) => ids.contains(&grant.id),
        }
    }
}

/// New point value for a grant touched by a deduction (zero removes it)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantAdjustment {
    /// Grant being adjusted
    pub id: Uuid,
    /// Remaining points after the deduction
    pub points: i64,
}

/// Result of an atomic advisory increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningTally {
    /// Warning count observed by this increment (before any reset)
    pub count: u32,
    /// Grant produced when this increment completed a cycle
    pub conversion: Option<PointGrant>,
}
