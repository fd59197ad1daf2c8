//! Punishment orchestrator
//!
//! Sequences one report through classification, the ledger, escalation and
//! (when the total is terminal) the ban-vote coordinator, and returns a
//! structured [`Outcome`]. Enforcement is a separate step; see
//! [`EnforcementDispatcher`](crate::enforcement::EnforcementDispatcher).

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::advisory::{self, AdvisoryState, AdvisoryStep, AdvisoryTracker};
use crate::ban_vote::BanVoteCoordinator;
use crate::classifier::{Classification, Classifier};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::escalation::{Action, EscalationPolicy};
use crate::event_bus::{DisciplineEvent, EventBus};
use crate::ledger::{ActorKey, Ledger, PointGrant};

/// Highest point value a moderator may assign by hand
pub const DEFAULT_MAX_MANUAL_POINTS: i64 = 10;

/// The chat message a report was filed against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    /// Channel the message was posted in
    pub channel_id: u64,
    /// Leading part of the message text
    pub excerpt: String,
    /// Link that opens the message in the client
    pub jump_link: String,
}

/// A request to discipline one actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Who is being disciplined
    pub key: ActorKey,
    /// Moderator or member filing the report
    pub reporter_id: u64,
    /// Free-text reason, or the reserved advisory tag
    pub reason: String,
    /// Explicit point value, bypassing the classifier
    pub points_override: Option<i64>,
    /// Reported message, when the report came from one
    pub context: Option<MessageContext>,
}

impl Report {
    /// Create a report
    #[must_use]
    pub fn new(key: ActorKey, reporter_id: u64, reason: impl Into<String>) -> Self {
        Self {
            key,
            reporter_id,
            reason: reason.into(),
            points_override: None,
            context: None,
        }
    }

    /// Assign points directly
    #[must_use]
    pub fn with_points(mut self, points: i64) -> Self {
        self.points_override = Some(points);
        self
    }

    /// Attach the reported message
    #[must_use]
    pub fn with_context(mut self, context: MessageContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Consequence decided for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeAction {
    /// Nothing to enforce
    NoAction,
    /// Mute for the given duration
    Muted(Duration),
    /// A ban vote was opened
    PendingBanVote {
        /// The new vote
        vote_id: Uuid,
    },
    /// A ban vote was due but one is already running
    VoteAlreadyPending {
        /// The running vote, when known
        vote_id: Option<Uuid>,
    },
}

/// Advisory progress attached to advisory outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvisoryProgress {
    /// Which warning this was (1-based)
    pub warning_number: u32,
    /// Warnings still on record afterwards
    pub outstanding: u32,
    /// Whether the record converted into points
    pub converted: bool,
}

/// Result of processing a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Disciplined actor
    pub key: ActorKey,
    /// What should be enforced
    pub action: OutcomeAction,
    /// Points added by this report
    pub points_delta: i64,
    /// Decayed total afterwards
    pub total: i64,
    /// Present for advisory reports
    pub advisory: Option<AdvisoryProgress>,
    /// Present when the classifier decided the points
    pub classification: Option<Classification>,
    /// Grant written by this report
    pub grant_id: Option<Uuid>,
}

/// Snapshot of an actor's standing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Actor
    pub key: ActorKey,
    /// Decayed total
    pub total: i64,
    /// Most recent live grants, newest first
    pub recent: Vec<PointGrant>,
    /// Advisory track position
    pub advisory: AdvisoryState,
    /// Outstanding advisory warnings
    pub warnings: u32,
    /// Next threshold above the total and its consequence
    pub next_threshold: Option<(i64, Action)>,
    /// Running ban vote, if any
    pub open_vote: Option<Uuid>,
}

/// Processes reports into outcomes
pub struct PunishmentOrchestrator {
    classifier: Arc<Classifier>,
    ledger: Arc<Ledger>,
    advisory: AdvisoryTracker,
    escalation: EscalationPolicy,
    votes: Arc<BanVoteCoordinator>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    max_manual_points: i64,
}

impl PunishmentOrchestrator {
    /// Create an orchestrator
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Arc<Classifier>,
        ledger: Arc<Ledger>,
        advisory: AdvisoryTracker,
        escalation: EscalationPolicy,
        votes: Arc<BanVoteCoordinator>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        max_manual_points: i64,
    ) -> Self {
        Self {
            classifier,
            ledger,
            advisory,
            escalation,
            votes,
            clock,
            events,
            max_manual_points,
        }
    }

    /// Classifier in use
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Escalation policy in use
    #[must_use]
    pub fn escalation(&self) -> &EscalationPolicy {
        &self.escalation
    }

    /// Ban-vote coordinator
    #[must_use]
    pub fn votes(&self) -> &Arc<BanVoteCoordinator> {
        &self.votes
    }

    /// Process one report.
    ///
    /// Invalid reports are rejected before anything is written. Store failures
    /// abort the report; nothing is enforced for it.
    #[instrument(skip(self, report), fields(key = %report.key, reporter = report.reporter_id))]
    pub async fn process(&self, report: Report) -> Result<Outcome> {
        if report.reporter_id == report.key.actor_id {
            return Err(Error::InvalidTarget(
                "you cannot discipline yourself".to_string(),
            ));
        }
        let reason = report.reason.trim();
        if reason.is_empty() {
            return Err(Error::InvalidInput("a reason is required".to_string()));
        }

        if advisory::is_advisory(reason) {
            return self.process_advisory(&report).await;
        }

        let (points, classification) = match report.points_override {
            Some(points) if (0..=self.max_manual_points).contains(&points) => (points, None),
            Some(points) => {
                return Err(Error::InvalidInput(format!(
                    "points must be between 0 and {}, got {}",
                    self.max_manual_points, points
                )))
            }
            None => {
                let classification = self.classifier.classify_detailed(reason);
                (classification.points, Some(classification))
            }
        };

        let now = self.clock.now();
        let receipt = self
            .ledger
            .apply_grant(report.key, reason, points, Some(report.reporter_id), now)
            .await?;

        self.events.publish(DisciplineEvent::GrantRecorded {
            key: report.key,
            grant_id: receipt.grant.id,
            points,
            total: receipt.total,
            reason: reason.to_string(),
        });

        let action = self.escalation.resolve(receipt.total, points);
        let action = self.finish(report.key, action).await?;

        info!(points, total = receipt.total, action = ?action, "Report processed");
        Ok(Outcome {
            key: report.key,
            action,
            points_delta: points,
            total: receipt.total,
            advisory: None,
            classification,
            grant_id: Some(receipt.grant.id),
        })
    }

    async fn process_advisory(&self, report: &Report) -> Result<Outcome> {
        let key = report.key;
        let now = self.clock.now();
        self.ledger.prune_expired(key, now).await?;

        let step = self
            .advisory
            .warn(key, Some(report.reporter_id), None, now)
            .await?;
        let warning_number = step.count();

        let outcome = match step {
            AdvisoryStep::Warned { .. } => Outcome {
                key,
                action: OutcomeAction::NoAction,
                points_delta: 0,
                total: self.ledger.current_total(key, now).await?,
                advisory: Some(AdvisoryProgress {
                    warning_number,
                    outstanding: warning_number,
                    converted: false,
                }),
                classification: None,
                grant_id: None,
            },
            AdvisoryStep::Muted { duration, .. } => Outcome {
                key,
                action: OutcomeAction::Muted(duration),
                points_delta: 0,
                total: self.ledger.current_total(key, now).await?,
                advisory: Some(AdvisoryProgress {
                    warning_number,
                    outstanding: warning_number,
                    converted: false,
                }),
                classification: None,
                grant_id: None,
            },
            AdvisoryStep::Converted { grant, .. } => {
                let total = self.ledger.current_total(key, now).await?;
                self.events.publish(DisciplineEvent::GrantRecorded {
                    key,
                    grant_id: grant.id,
                    points: grant.points,
                    total,
                    reason: grant.reason.clone(),
                });

                let action = self.escalation.resolve(total, grant.points);
                Outcome {
                    key,
                    action: self.finish(key, action).await?,
                    points_delta: grant.points,
                    total,
                    advisory: Some(AdvisoryProgress {
                        warning_number,
                        outstanding: 0,
                        converted: true,
                    }),
                    classification: None,
                    grant_id: Some(grant.id),
                }
            }
        };

        self.events.publish(DisciplineEvent::AdvisoryIssued {
            key,
            count: warning_number,
            converted: outcome.advisory.is_some_and(|a| a.converted),
        });
        info!(warning_number, action = ?outcome.action, "Advisory warning processed");
        Ok(outcome)
    }

    async fn finish(&self, key: ActorKey, action: Action) -> Result<OutcomeAction> {
        match action {
            Action::NoAction => Ok(OutcomeAction::NoAction),
            Action::Mute(duration) => Ok(OutcomeAction::Muted(duration)),
            Action::BanVote => match self.votes.open_vote(key).await {
                Ok(vote) => Ok(OutcomeAction::PendingBanVote { vote_id: vote.id }),
                Err(Error::Conflict(_)) => Ok(OutcomeAction::VoteAlreadyPending {
                    vote_id: self.votes.open_vote_for(key).await,
                }),
                Err(e) => Err(e),
            },
        }
    }

    /// Forgive points, most recent first; returns the new total
    pub async fn deduct(&self, key: ActorKey, amount: i64) -> Result<i64> {
        let total = self.ledger.deduct(key, amount, self.clock.now()).await?;
        self.events.publish(DisciplineEvent::PointsDeducted { key, amount, total });
        Ok(total)
    }

    /// Wipe an actor's grants and advisory record; returns the grants removed
    pub async fn clear(&self, key: ActorKey) -> Result<u64> {
        let removed = self.ledger.clear_all(key).await?;
        self.events.publish(DisciplineEvent::LedgerCleared { key, removed });
        Ok(removed)
    }

    /// Current standing of an actor
    pub async fn standing(&self, key: ActorKey, history_limit: usize) -> Result<Standing> {
        let now = self.clock.now();
        let total = self.ledger.current_total(key, now).await?;
        let recent = self.ledger.history(key, now, history_limit).await?;
        let warnings = self.advisory.count(key).await?;

        Ok(Standing {
            key,
            total,
            recent,
            advisory: AdvisoryState::from_count(warnings),
            warnings,
            next_threshold: self.escalation.next_threshold(total),
            open_vote: self.votes.open_vote_for(key).await,
        })
    }

    /// What a reason would earn on its own, without touching any ledger
    #[must_use]
    pub fn preview(&self, reason: &str) -> (Classification, Action) {
        let classification = self.classifier.classify_detailed(reason);
        let action = self
            .escalation
            .resolve(classification.points, classification.points);
        (classification, action)
    }
}

#[cfg(test)]
mod tests;
