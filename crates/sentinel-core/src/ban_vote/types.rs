use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::ledger::ActorKey;

/// A voter's choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ballot {
    /// Ban the actor
    Yes,
    /// Spare the actor
    No,
}

impl Ballot {
    /// Stable storage tag
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    /// Parse a storage tag
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// Terminal result of a ban vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    /// Strict majority voted yes
    Banned,
    /// Yes did not exceed no (ties included)
    Reprieved,
}

impl VoteOutcome {
    /// Stable storage tag
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banned => "banned",
            Self::Reprieved => "reprieved",
        }
    }
}

/// Lifecycle state of a ban vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "lowercase")]
pub enum VoteStatus {
    /// Accepting ballots until the window closes
    Open,
    /// Closed with a terminal outcome
    Resolved(VoteOutcome),
}

impl VoteStatus {
    /// Stable storage tag
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved(outcome) => outcome.as_str(),
        }
    }

    /// Parse a storage tag
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "banned" => Some(Self::Resolved(VoteOutcome::Banned)),
            "reprieved" => Some(Self::Resolved(VoteOutcome::Reprieved)),
            _ => None,
        }
    }
}

/// Ballot counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Yes ballots
    pub yes: usize,
    /// No ballots
    pub no: usize,
}

impl Tally {
    /// Majority rule: ban only when yes strictly exceeds no
    #[must_use]
    pub fn outcome(&self) -> VoteOutcome {
        if self.yes > self.no {
            VoteOutcome::Banned
        } else {
            VoteOutcome::Reprieved
        }
    }
}

/// A timed community vote on banning one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanVote {
    /// Unique vote ID
    pub id: Uuid,
    /// Community the vote runs in
    pub community_id: u64,
    /// Actor the vote is about
    pub actor_id: u64,
    /// When the vote opened
    pub opened_at: DateTime<Utc>,
    /// Window length in seconds
    pub window_secs: i64,
    /// Ballots keyed by voter ID
    pub ballots: HashMap<u64, Ballot>,
    /// Current status
    pub status: VoteStatus,
    /// When the vote was resolved
    pub closed_at: Option<DateTime<Utc>>,
}

impl BanVote {
    /// Open a new vote
    #[must_use]
    pub fn new(key: ActorKey, opened_at: DateTime<Utc>, window_secs: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            community_id: key.community_id,
            actor_id: key.actor_id,
            opened_at,
            window_secs,
            ballots: HashMap::new(),
            status: VoteStatus::Open,
            closed_at: None,
        }
    }

    /// Key of the actor under vote
    #[must_use]
    pub fn key(&self) -> ActorKey {
        ActorKey::new(self.community_id, self.actor_id)
    }

    /// Instant the window elapses
    #[must_use]
    pub fn closes_at(&self) -> DateTime<Utc> {
        self.opened_at + Duration::seconds(self.window_secs)
    }

    /// Whether ballots are still accepted at `now`
    #[must_use]
    pub fn accepts_ballots_at(&self, now: DateTime<Utc>) -> bool {
        self.status == VoteStatus::Open && now < self.closes_at()
    }

    /// Whether the vote has been resolved
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, VoteStatus::Resolved(_))
    }

    /// Count the ballots cast so far
    #[must_use]
    pub fn tally(&self) -> Tally {
        self.ballots
            .values()
            .fold(Tally::default(), |mut tally, ballot| {
                match ballot {
                    Ballot::Yes => tally.yes += 1,
                    Ballot::No => tally.no += 1,
                }
                tally
            })
    }
}

/// Someone casting a ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voter {
    /// Voter ID
    pub id: u64,
    /// Bots and automated identities never count
    pub is_bot: bool,
}

impl Voter {
    /// A human voter
    #[must_use]
    pub fn member(id: u64) -> Self {
        Self { id, is_bot: false }
    }

    /// An automated voter
    #[must_use]
    pub fn bot(id: u64) -> Self {
        Self { id, is_bot: true }
    }
}

/// What happened to a submitted ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotReceipt {
    /// First ballot from this voter
    Counted(Tally),
    /// Replaced this voter's earlier ballot
    Replaced(Tally),
    /// Voter is not eligible (bot, or the actor under vote)
    Excluded,
}

/// Result of resolving a vote
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The vote in its final state
    pub vote: BanVote,
    /// Terminal outcome
    pub outcome: VoteOutcome,
    /// Final counts
    pub tally: Tally,
    /// False when the vote had already been resolved earlier
    pub newly_resolved: bool,
    /// Why the ban could not be enforced, if it could not
    pub enforcement_error: Option<String>,
}
