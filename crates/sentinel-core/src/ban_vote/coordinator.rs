use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::types::{Ballot, BallotReceipt, BanVote, Resolution, Voter, VoteOutcome, VoteStatus};
use crate::clock::{Clock, ScheduledHandle, Scheduler};
use crate::enforcement::{Enforcer, Notifier};
use crate::error::{Error, Result};
use crate::event_bus::{DisciplineEvent, EventBus};
use crate::humanize;
use crate::ledger::ActorKey;
use crate::store::VoteStore;

/// Default ballot window
pub const DEFAULT_VOTE_WINDOW_SECS: u64 = 120;

const BAN_REASON: &str = "Reached the ban threshold - voted ban";

/// First retry delay after a failed scheduled resolution
const RETRY_BASE: Duration = Duration::from_secs(5);

/// Ceiling for the retry backoff
const RETRY_MAX: Duration = Duration::from_secs(300);

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE
        .saturating_mul(1u32 << attempt.min(8))
        .min(RETRY_MAX)
}

/// Runs ban votes from opening to enforcement
pub struct BanVoteCoordinator {
    store: Arc<dyn VoteStore>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    enforcer: Arc<dyn Enforcer>,
    notifier: Arc<dyn Notifier>,
    events: EventBus,
    window: Duration,
    votes: RwLock<HashMap<Uuid, BanVote>>,
    timers: DashMap<Uuid, ScheduledHandle>,
}

impl BanVoteCoordinator {
    /// Create a coordinator
    pub fn new(
        store: Arc<dyn VoteStore>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        enforcer: Arc<dyn Enforcer>,
        notifier: Arc<dyn Notifier>,
        events: EventBus,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            scheduler,
            enforcer,
            notifier,
            events,
            window,
            votes: RwLock::new(HashMap::new()),
            timers: DashMap::new(),
        }
    }

    /// Ballot window
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Open a vote on `key`.
    ///
    /// Fails with [`Error::Conflict`] while another vote on the same actor is open.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn open_vote(self: &Arc<Self>, key: ActorKey) -> Result<BanVote> {
        let vote = {
            let mut votes = self.votes.write().await;
            if let Some(open) = votes
                .values()
                .find(|v| v.key() == key && v.status == VoteStatus::Open)
            {
                return Err(Error::Conflict(format!(
                    "a ban vote ({}) is already open for this member",
                    open.id
                )));
            }

            let window_secs = i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX);
            let vote = BanVote::new(key, self.clock.now(), window_secs);
            self.store.save_vote(&vote).await?;
            votes.insert(vote.id, vote.clone());
            vote
        };

        self.schedule_resolution(&vote);
        info!(vote_id = %vote.id, closes_at = %vote.closes_at(), "Ban vote opened");
        self.events.publish(DisciplineEvent::VoteOpened {
            vote_id: vote.id,
            key,
            closes_at: vote.closes_at(),
        });

        Ok(vote)
    }

    /// Record a ballot while the window is open
    pub async fn cast_ballot(
        &self,
        vote_id: Uuid,
        voter: Voter,
        ballot: Ballot,
    ) -> Result<BallotReceipt> {
        let now = self.clock.now();
        let mut votes = self.votes.write().await;
        let vote = votes
            .get_mut(&vote_id)
            .ok_or_else(|| Error::NotFound(format!("ban vote {}", vote_id)))?;

        if !vote.accepts_ballots_at(now) {
            return Err(Error::Conflict("voting on this ban has closed".to_string()));
        }
        if voter.is_bot || voter.id == vote.actor_id {
            return Ok(BallotReceipt::Excluded);
        }

        self.store.record_ballot(vote_id, voter.id, ballot).await?;
        let previous = vote.ballots.insert(voter.id, ballot);
        let tally = vote.tally();

        self.events.publish(DisciplineEvent::BallotCast {
            vote_id,
            key: vote.key(),
            yes: tally.yes,
            no: tally.no,
        });

        Ok(match previous {
            Some(_) => BallotReceipt::Replaced(tally),
            None => BallotReceipt::Counted(tally),
        })
    }

    /// Close the vote and enforce its outcome.
    ///
    /// Resolving an already resolved vote returns the stored outcome and
    /// applies nothing. The same holds when the store reports the vote was
    /// closed by another path. Resolving before the window elapses is a
    /// conflict.
    ///
    /// Resolved votes stay readable for one more window, then are dropped.
    #[instrument(skip(self))]
    pub async fn resolve(&self, vote_id: Uuid) -> Result<Resolution> {
        let now = self.clock.now();
        let (vote, closed) = {
            let mut votes = self.votes.write().await;
            let vote = votes
                .get_mut(&vote_id)
                .ok_or_else(|| Error::NotFound(format!("ban vote {}", vote_id)))?;

            if let VoteStatus::Resolved(outcome) = vote.status {
                return Ok(Resolution {
                    vote: vote.clone(),
                    outcome,
                    tally: vote.tally(),
                    newly_resolved: false,
                    enforcement_error: None,
                });
            }
            if now < vote.closes_at() {
                return Err(Error::Conflict(format!(
                    "ban vote {} is still open until {}",
                    vote_id,
                    vote.closes_at()
                )));
            }

            let outcome = vote.tally().outcome();
            let closed = self.store.close_vote(vote_id, outcome, now).await?;
            vote.status = VoteStatus::Resolved(outcome);
            vote.closed_at = Some(now);
            (vote.clone(), closed)
        };

        if let Some((_, timer)) = self.timers.remove(&vote_id) {
            timer.cancel();
        }
        self.forget_resolved_before(now).await;

        if !closed {
            warn!(vote_id = %vote_id, "Ban vote was already closed in the store, nothing enforced");
            return Ok(Resolution {
                outcome: vote.tally().outcome(),
                tally: vote.tally(),
                vote,
                newly_resolved: false,
                enforcement_error: None,
            });
        }

        let key = vote.key();
        let tally = vote.tally();
        let outcome = tally.outcome();
        info!(key = %key, yes = tally.yes, no = tally.no, outcome = outcome.as_str(), "Ban vote resolved");

        let mut enforcement_error = None;
        if outcome == VoteOutcome::Banned {
            if let Err(e) = self.enforcer.apply_ban(key, BAN_REASON).await {
                warn!(key = %key, error = %e, "Ban could not be enforced");
                self.events.publish(DisciplineEvent::EnforcementFailed {
                    key,
                    action: "ban".to_string(),
                    error: e.to_string(),
                });
                enforcement_error = Some(e.to_string());
            }
        }

        let message = humanize::vote_result(key, outcome, tally, enforcement_error.as_deref());
        if let Err(e) = self.notifier.notify_moderators(key.community_id, &message).await {
            warn!(key = %key, error = %e, "Could not announce vote result");
        }

        self.events.publish(DisciplineEvent::VoteResolved {
            vote_id,
            key,
            outcome,
            yes: tally.yes,
            no: tally.no,
        });

        Ok(Resolution {
            vote,
            outcome,
            tally,
            newly_resolved: true,
            enforcement_error,
        })
    }

    /// Reload open votes after a restart and reschedule their resolution.
    ///
    /// Votes already tracked in memory are left as they are, so calling this
    /// again never discards ballots or resolutions. Returns how many votes
    /// were newly loaded. Votes whose window already elapsed resolve on the
    /// next scheduler tick.
    pub async fn recover(self: &Arc<Self>) -> Result<usize> {
        let open = self.store.load_open_votes().await?;

        let mut loaded = Vec::new();
        {
            let mut votes = self.votes.write().await;
            for vote in open {
                if let Entry::Vacant(slot) = votes.entry(vote.id) {
                    slot.insert(vote.clone());
                    loaded.push(vote);
                }
            }
        }
        for vote in &loaded {
            self.schedule_resolution(vote);
        }

        let count = loaded.len();

        if count > 0 {
            info!(count, "Recovered open ban votes");
        }
        Ok(count)
    }

    /// Current state of a vote
    pub async fn get(&self, vote_id: Uuid) -> Option<BanVote> {
        self.votes.read().await.get(&vote_id).cloned()
    }

    /// Open vote on `key`, if any
    pub async fn open_vote_for(&self, key: ActorKey) -> Option<Uuid> {
        self.votes
            .read()
            .await
            .values()
            .find(|v| v.key() == key && v.status == VoteStatus::Open)
            .map(|v| v.id)
    }

    /// Forget resolved votes closed before `cutoff`; returns how many were dropped
    pub async fn cleanup_resolved(&self, cutoff: DateTime<Utc>) -> usize {
        let mut votes = self.votes.write().await;
        let before = votes.len();
        votes.retain(|_, v| !(v.is_resolved() && v.closed_at.is_some_and(|at| at < cutoff)));
        before - votes.len()
    }

    async fn forget_resolved_before(&self, now: DateTime<Utc>) {
        let grace = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::zero());
        let dropped = self.cleanup_resolved(now - grace).await;
        if dropped > 0 {
            debug!(dropped, "Dropped resolved ban votes");
        }
    }

    fn remaining(&self, vote: &BanVote) -> Duration {
        (vote.closes_at() - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    fn schedule_resolution(self: &Arc<Self>, vote: &BanVote) {
        self.arm_timer(vote.id, self.remaining(vote), 0);
    }

    /// Resolve `vote_id` after `delay`.
    ///
    /// A timer that fires early re-arms for the rest of the window; any other
    /// failure retries with exponential backoff until the vote resolves.
    fn arm_timer(self: &Arc<Self>, vote_id: Uuid, delay: Duration, attempt: u32) {
        let coordinator: Weak<Self> = Arc::downgrade(self);

        let handle = self.scheduler.after(
            delay,
            Box::pin(async move {
                let Some(coordinator) = coordinator.upgrade() else {
                    return;
                };
                match coordinator.resolve(vote_id).await {
                    Ok(_) | Err(Error::NotFound(_)) => {}
                    Err(Error::Conflict(reason)) => {
                        let Some(vote) = coordinator.get(vote_id).await else {
                            return;
                        };
                        let delay = coordinator.remaining(&vote).max(Duration::from_secs(1));
                        debug!(vote_id = %vote_id, reason = %reason, ?delay, "Vote not due yet, re-arming");
                        coordinator.arm_timer(vote_id, delay, attempt);
                    }
                    Err(e) => {
                        let delay = retry_delay(attempt);
                        warn!(
                            vote_id = %vote_id,
                            error = %e,
                            attempt,
                            ?delay,
                            "Scheduled vote resolution failed, retrying"
                        );
                        coordinator.arm_timer(vote_id, delay, attempt.saturating_add(1));
                    }
                }
            }),
        );

        if let Some(previous) = self.timers.insert(vote_id, handle) {
            previous.cancel();
        }
    }
}
