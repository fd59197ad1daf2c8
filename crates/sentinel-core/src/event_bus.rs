//! EventBus - broadcast-based event system for discipline events.
//!
//! The engine publishes an event for every state change it makes so that
//! chat adapters can render vote embeds and moderator logs without being
//! called back directly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ban_vote::VoteOutcome;
use crate::ledger::ActorKey;

/// Events emitted by the discipline engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisciplineEvent {
    /// Points were written to an actor's ledger
    GrantRecorded {
        /// Disciplined actor
        key: ActorKey,
        /// Grant identifier
        grant_id: Uuid,
        /// Points granted
        points: i64,
        /// Decayed total after the grant
        total: i64,
        /// Reason the grant was recorded for
        reason: String,
    },
    /// An advisory warning was recorded
    AdvisoryIssued {
        /// Warned actor
        key: ActorKey,
        /// Warnings on record after this one
        count: u32,
        /// Whether the record converted into points
        converted: bool,
    },
    /// A ban vote opened
    VoteOpened {
        /// Vote identifier
        vote_id: Uuid,
        /// Actor under vote
        key: ActorKey,
        /// When ballots stop being accepted
        closes_at: DateTime<Utc>,
    },
    /// A ballot was counted or replaced
    BallotCast {
        /// Vote identifier
        vote_id: Uuid,
        /// Actor under vote
        key: ActorKey,
        /// Yes ballots so far
        yes: usize,
        /// No ballots so far
        no: usize,
    },
    /// A ban vote reached its outcome
    VoteResolved {
        /// Vote identifier
        vote_id: Uuid,
        /// Actor under vote
        key: ActorKey,
        /// Outcome
        outcome: VoteOutcome,
        /// Final yes count
        yes: usize,
        /// Final no count
        no: usize,
    },
    /// An enforcement action could not be applied
    EnforcementFailed {
        /// Target actor
        key: ActorKey,
        /// Which action failed (mute, ban, ...)
        action: String,
        /// Error description
        error: String,
    },
    /// Points were forgiven
    PointsDeducted {
        /// Actor
        key: ActorKey,
        /// Points requested
        amount: i64,
        /// Total afterwards
        total: i64,
    },
    /// The ledger of an actor was wiped
    LedgerCleared {
        /// Actor
        key: ActorKey,
        /// Grants removed
        removed: u64,
    },
}

impl DisciplineEvent {
    /// Actor the event concerns
    #[must_use]
    pub fn key(&self) -> ActorKey {
        match self {
            Self::GrantRecorded { key, .. }
            | Self::AdvisoryIssued { key, .. }
            | Self::VoteOpened { key, .. }
            | Self::BallotCast { key, .. }
            | Self::VoteResolved { key, .. }
            | Self::EnforcementFailed { key, .. }
            | Self::PointsDeducted { key, .. }
            | Self::LedgerCleared { key, .. } => *key,
        }
    }
}

/// Broadcast-based event bus.
///
/// Slow subscribers miss events (lagged) rather than blocking the engine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DisciplineEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DisciplineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all active subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: DisciplineEvent) -> usize {
        // send() returns Err if there are no receivers, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests;
