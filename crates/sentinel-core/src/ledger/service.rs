use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::types::{
    ActorKey, AdvisoryWarning, GrantAdjustment, GrantFilter, PointGrant, WarningTally,
    ADVISORY_CONVERSION_REASON,
};
use crate::error::{Error, Result};
use crate::store::LedgerStore;

/// Default retention window for point grants
pub const DEFAULT_RETENTION_DAYS: i64 = 20;

/// A recorded grant together with the standing it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantReceipt {
    /// The grant that was written
    pub grant: PointGrant,
    /// Decayed total after the write
    pub total: i64,
    /// Expired grants physically removed before the write
    pub pruned: u64,
}

/// Per-actor lock that removes its map entry once nobody else holds or awaits it
struct KeyGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<ActorKey, Arc<Mutex<()>>>,
    key: ActorKey,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // the map's own reference is the last one left when the key is idle
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Ledger service over a [`LedgerStore`]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    retention: Duration,
    locks: DashMap<ActorKey, Arc<Mutex<()>>>,
}

impl Ledger {
    /// Create a ledger with the given retention window
    pub fn new(store: Arc<dyn LedgerStore>, retention: Duration) -> Self {
        Self {
            store,
            retention,
            locks: DashMap::new(),
        }
    }

    /// Retention window applied by decay
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    async fn lock(&self, key: ActorKey) -> KeyGuard<'_> {
        // clone the Arc out so the shard lock is released before awaiting
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        KeyGuard {
            guard: Some(mutex.lock_owned().await),
            locks: &self.locks,
            key,
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    fn is_live(&self, grant: &PointGrant, as_of: DateTime<Utc>) -> bool {
        as_of - grant.granted_at < self.retention
    }

    async fn live_grants_unlocked(
        &self,
        key: ActorKey,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<PointGrant>> {
        let grants = self.store.query_grants(key).await?;
        Ok(grants
            .into_iter()
            .filter(|g| self.is_live(g, as_of))
            .collect())
    }

    async fn total_unlocked(&self, key: ActorKey, as_of: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .live_grants_unlocked(key, as_of)
            .await?
            .iter()
            .map(|g| g.points)
            .sum())
    }

    async fn prune_unlocked(&self, key: ActorKey, as_of: DateTime<Utc>) -> Result<u64> {
        let cutoff = as_of - self.retention;
        let removed = self
            .store
            .delete_grants(key, GrantFilter::GrantedAtOrBefore(cutoff))
            .await?;
        if removed > 0 {
            debug!(key = %key, removed, "Pruned expired grants");
        }
        Ok(removed)
    }

    /// Append a grant for `key`
    pub async fn record_grant(
        &self,
        key: ActorKey,
        reason: &str,
        points: i64,
        moderator_id: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<PointGrant> {
        if points < 0 {
            return Err(Error::InvalidInput(format!(
                "points must not be negative, got {}",
                points
            )));
        }

        let _guard = self.lock(key).await;
        let grant = PointGrant::new(key, points, reason, now, moderator_id);
        self.store.insert_grant(&grant).await?;
        info!(key = %key, points, reason = %reason, "Recorded point grant");
        Ok(grant)
    }

    /// Prune, append and recompute in one serialized step
    pub async fn apply_grant(
        &self,
        key: ActorKey,
        reason: &str,
        points: i64,
        moderator_id: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<GrantReceipt> {
        if points < 0 {
            return Err(Error::InvalidInput(format!(
                "points must not be negative, got {}",
                points
            )));
        }

        let _guard = self.lock(key).await;
        let pruned = self.prune_unlocked(key, now).await?;
        let grant = PointGrant::new(key, points, reason, now, moderator_id);
        self.store.insert_grant(&grant).await?;
        let total = self.total_unlocked(key, now).await?;

        info!(key = %key, points, total, reason = %reason, "Applied point grant");
        Ok(GrantReceipt {
            grant,
            total,
            pruned,
        })
    }

    /// Sum of live grants at `as_of`
    pub async fn current_total(&self, key: ActorKey, as_of: DateTime<Utc>) -> Result<i64> {
        self.total_unlocked(key, as_of).await
    }

    /// Live grants at `as_of`, oldest first
    pub async fn live_grants(&self, key: ActorKey, as_of: DateTime<Utc>) -> Result<Vec<PointGrant>> {
        self.live_grants_unlocked(key, as_of).await
    }

    /// Most recent live grants, newest first
    pub async fn history(
        &self,
        key: ActorKey,
        as_of: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PointGrant>> {
        let mut grants = self.live_grants_unlocked(key, as_of).await?;
        grants.reverse();
        grants.truncate(limit);
        Ok(grants)
    }

    /// Physically remove expired grants and return the recomputed total
    pub async fn prune_expired(&self, key: ActorKey, as_of: DateTime<Utc>) -> Result<i64> {
        let _guard = self.lock(key).await;
        self.prune_unlocked(key, as_of).await?;
        self.total_unlocked(key, as_of).await
    }

    /// Forgive `amount` points, most recent grants first.
    ///
    /// Returns the new total, clamped at zero.
    pub async fn deduct(&self, key: ActorKey, amount: i64, as_of: DateTime<Utc>) -> Result<i64> {
        if amount < 0 {
            return Err(Error::InvalidInput(format!(
                "deduction must not be negative, got {}",
                amount
            )));
        }

        let _guard = self.lock(key).await;
        let live = self.live_grants_unlocked(key, as_of).await?;
        let total: i64 = live.iter().map(|g| g.points).sum();

        let mut remaining = amount;
        let mut adjustments = Vec::new();
        // stored order is oldest first; walk it backwards
        for grant in live.iter().rev() {
            if remaining == 0 {
                break;
            }
            let taken = grant.points.min(remaining);
            if taken == 0 {
                continue;
            }
            adjustments.push(GrantAdjustment {
                id: grant.id,
                points: grant.points - taken,
            });
            remaining -= taken;
        }

        if !adjustments.is_empty() {
            self.store.apply_adjustments(key, &adjustments).await?;
        }

        let new_total = total - (amount - remaining);
        info!(key = %key, amount, new_total, "Deducted points");
        Ok(new_total)
    }

    /// Remove every grant and the advisory record; returns the grants removed
    pub async fn clear_all(&self, key: ActorKey) -> Result<u64> {
        let _guard = self.lock(key).await;
        let removed = self.store.delete_grants(key, GrantFilter::All).await?;
        self.store.clear_warnings(key).await?;
        info!(key = %key, removed, "Cleared ledger");
        Ok(removed)
    }

    /// Append an advisory warning and convert the record when it reaches `convert_at`.
    ///
    /// The increment and the conversion run under the key's lock, so two
    /// concurrent warnings can never both observe the converting count.
    pub async fn record_warning(
        &self,
        key: ActorKey,
        warning: &AdvisoryWarning,
        convert_at: u32,
        conversion_points: i64,
    ) -> Result<WarningTally> {
        let _guard = self.lock(key).await;
        let count = self.store.push_warning(key, warning).await?;

        if count < convert_at {
            debug!(key = %key, count, "Advisory warning recorded");
            return Ok(WarningTally {
                count,
                conversion: None,
            });
        }

        let grant = PointGrant::new(
            key,
            conversion_points,
            ADVISORY_CONVERSION_REASON,
            warning.issued_at,
            warning.moderator_id,
        );
        self.store.insert_grant(&grant).await?;
        self.store.clear_warnings(key).await?;
        info!(key = %key, count, points = conversion_points, "Advisory record converted");

        Ok(WarningTally {
            count,
            conversion: Some(grant),
        })
    }

    /// Current advisory warning count
    pub async fn warning_count(&self, key: ActorKey) -> Result<u32> {
        Ok(self.store.warnings(key).await?.len() as u32)
    }

    /// Drop the advisory record; returns whether one existed
    pub async fn reset_warnings(&self, key: ActorKey) -> Result<bool> {
        let _guard = self.lock(key).await;
        self.store.clear_warnings(key).await
    }
}
