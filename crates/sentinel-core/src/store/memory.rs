//! In-memory store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LedgerStore, VoteStore};
use crate::ban_vote::{Ballot, BanVote, VoteOutcome, VoteStatus};
use crate::error::{Error, Result};
use crate::ledger::{ActorKey, AdvisoryWarning, GrantAdjustment, GrantFilter, PointGrant};

/// Process-local store; contents vanish with the process
#[derive(Default)]
pub struct MemoryStore {
    grants: RwLock<HashMap<ActorKey, Vec<PointGrant>>>,
    warnings: RwLock<HashMap<ActorKey, Vec<AdvisoryWarning>>>,
    votes: RwLock<HashMap<Uuid, BanVote>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_grant(&self, grant: &PointGrant) -> Result<Uuid> {
        let mut grants = self.grants.write().await;
        grants.entry(grant.key()).or_default().push(grant.clone());
        Ok(grant.id)
    }

    async fn query_grants(&self, key: ActorKey) -> Result<Vec<PointGrant>> {
        let grants = self.grants.read().await;
        let mut list = grants.get(&key).cloned().unwrap_or_default();
        // stable: equal timestamps keep insertion order
        list.sort_by_key(|g| g.granted_at);
        Ok(list)
    }

    async fn delete_grants(&self, key: ActorKey, filter: GrantFilter) -> Result<u64> {
        let mut grants = self.grants.write().await;
        let Some(list) = grants.get_mut(&key) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|g| !filter.matches(g));
        Ok((before - list.len()) as u64)
    }

    async fn apply_adjustments(
        &self,
        key: ActorKey,
        adjustments: &[GrantAdjustment],
    ) -> Result<()> {
        let mut grants = self.grants.write().await;
        let list = grants.entry(key).or_default();

        // validate everything before touching anything
        for adj in adjustments {
            if !list.iter().any(|g| g.id == adj.id) {
                return Err(Error::NotFound(format!("grant {}", adj.id)));
            }
        }

        let mut consumed = Vec::new();
        for adj in adjustments {
            if adj.points <= 0 {
                consumed.push(adj.id);
            } else if let Some(grant) = list.iter_mut().find(|g| g.id == adj.id) {
                grant.points = adj.points;
            }
        }
        list.retain(|g| !consumed.contains(&g.id));
        Ok(())
    }

    async fn push_warning(&self, key: ActorKey, warning: &AdvisoryWarning) -> Result<u32> {
        let mut warnings = self.warnings.write().await;
        let list = warnings.entry(key).or_default();
        list.push(warning.clone());
        Ok(list.len() as u32)
    }

    async fn warnings(&self, key: ActorKey) -> Result<Vec<AdvisoryWarning>> {
        let warnings = self.warnings.read().await;
        Ok(warnings.get(&key).cloned().unwrap_or_default())
    }

    async fn clear_warnings(&self, key: ActorKey) -> Result<bool> {
        let mut warnings = self.warnings.write().await;
        Ok(warnings.remove(&key).is_some_and(|w| !w.is_empty()))
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn save_vote(&self, vote: &BanVote) -> Result<()> {
        let mut votes = self.votes.write().await;
        votes.insert(vote.id, vote.clone());
        Ok(())
    }

    async fn record_ballot(&self, vote_id: Uuid, voter_id: u64, ballot: Ballot) -> Result<()> {
        let mut votes = self.votes.write().await;
        let vote = votes
            .get_mut(&vote_id)
            .ok_or_else(|| Error::NotFound(format!("ban vote {}", vote_id)))?;
        vote.ballots.insert(voter_id, ballot);
        Ok(())
    }

    async fn close_vote(
        &self,
        vote_id: Uuid,
        outcome: VoteOutcome,
        closed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut votes = self.votes.write().await;
        let vote = votes
            .get_mut(&vote_id)
            .ok_or_else(|| Error::NotFound(format!("ban vote {}", vote_id)))?;
        if vote.status != VoteStatus::Open {
            return Ok(false);
        }
        vote.status = VoteStatus::Resolved(outcome);
        vote.closed_at = Some(closed_at);
        Ok(true)
    }

    async fn load_open_votes(&self) -> Result<Vec<BanVote>> {
        let votes = self.votes.read().await;
        let mut open: Vec<BanVote> = votes
            .values()
            .filter(|v| v.status == VoteStatus::Open)
            .cloned()
            .collect();
        open.sort_by_key(|v| v.opened_at);
        Ok(open)
    }
}
