//! Persistence seams for the discipline engine
//!
//! The engine talks to storage only through [`LedgerStore`] and [`VoteStore`].
//! Two backends ship with the crate:
//!
//! - [`SqliteStore`]: durable storage, used by the bot
//! - [`MemoryStore`]: process-local storage for tests and dry runs
//!
//! Stores are not responsible for per-actor serialization; the
//! [`Ledger`](crate::ledger::Ledger) holds a lock per key around every
//! read-modify-write sequence. Multi-row changes must still be atomic within a
//! single call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ban_vote::{Ballot, BanVote, VoteOutcome};
use crate::error::Result;
use crate::ledger::{ActorKey, AdvisoryWarning, GrantAdjustment, GrantFilter, PointGrant};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Durable record of point grants and advisory warnings
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append a grant
    async fn insert_grant(&self, grant: &PointGrant) -> Result<Uuid>;

    /// All stored grants of a key, oldest first
    async fn query_grants(&self, key: ActorKey) -> Result<Vec<PointGrant>>;

    /// Physically delete grants selected by `filter`; returns the number removed
    async fn delete_grants(&self, key: ActorKey, filter: GrantFilter) -> Result<u64>;

    /// Apply a deduction in one transaction; zero-point adjustments delete the grant
    async fn apply_adjustments(&self, key: ActorKey, adjustments: &[GrantAdjustment])
        -> Result<()>;

    /// Append a warning and return the resulting warning count
    async fn push_warning(&self, key: ActorKey, warning: &AdvisoryWarning) -> Result<u32>;

    /// Current warnings, oldest first
    async fn warnings(&self, key: ActorKey) -> Result<Vec<AdvisoryWarning>>;

    /// Remove all warnings; returns whether any existed
    async fn clear_warnings(&self, key: ActorKey) -> Result<bool>;
}

/// Durable record of ban votes, so open windows survive restarts
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Persist a newly opened vote
    async fn save_vote(&self, vote: &BanVote) -> Result<()>;

    /// Insert or overwrite a voter's ballot
    async fn record_ballot(&self, vote_id: Uuid, voter_id: u64, ballot: Ballot) -> Result<()>;

    /// Mark an open vote resolved.
    ///
    /// Returns `false` when the vote was already closed, in which case the
    /// stored outcome is left untouched.
    async fn close_vote(
        &self,
        vote_id: Uuid,
        outcome: VoteOutcome,
        closed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Every vote still open, with its ballots
    async fn load_open_votes(&self) -> Result<Vec<BanVote>>;
}

#[cfg(test)]
mod tests;
