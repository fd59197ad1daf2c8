//! Enforcement seams and dispatcher
//!
//! The engine never talks to a chat platform. It decides; an [`Enforcer`]
//! applies mutes and bans and a [`Notifier`] delivers messages. Enforcement
//! failures are reported back, never retried, and never undo ledger writes.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{ScheduledHandle, Scheduler};
use crate::error::{Error, Result};
use crate::event_bus::{DisciplineEvent, EventBus};
use crate::humanize;
use crate::ledger::ActorKey;
use crate::orchestrator::{Outcome, OutcomeAction, Report};

/// Delivers messages to actors and moderators
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Direct message to the disciplined actor
    async fn notify_actor(&self, key: ActorKey, message: &str) -> Result<()>;

    /// Message to the community's moderators
    async fn notify_moderators(&self, community_id: u64, message: &str) -> Result<()>;
}

/// Applies platform-level sanctions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enforcer: Send + Sync {
    /// Time the actor out
    async fn apply_mute(&self, key: ActorKey, duration: Duration, reason: &str) -> Result<()>;

    /// Lift a mute early or clean up after it expired
    async fn remove_mute(&self, key: ActorKey) -> Result<()>;

    /// Ban the actor from the community
    async fn apply_ban(&self, key: ActorKey, reason: &str) -> Result<()>;
}

/// What enforcement managed to do for one outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforcementReport {
    /// The mute was applied
    pub muted: bool,
    /// The enforcer lacked permission
    pub permission_denied: bool,
    /// Other failures, in order
    pub failures: Vec<String>,
    /// The actor received their notice
    pub actor_notified: bool,
}

impl EnforcementReport {
    /// Whether every step succeeded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.permission_denied && self.failures.is_empty()
    }
}

/// Applies orchestrator outcomes through the [`Enforcer`] and [`Notifier`]
pub struct EnforcementDispatcher {
    enforcer: Arc<dyn Enforcer>,
    notifier: Arc<dyn Notifier>,
    scheduler: Arc<dyn Scheduler>,
    events: EventBus,
    pending_releases: Arc<DashMap<ActorKey, (Uuid, ScheduledHandle)>>,
}

impl EnforcementDispatcher {
    /// Create a dispatcher
    pub fn new(
        enforcer: Arc<dyn Enforcer>,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<dyn Scheduler>,
        events: EventBus,
    ) -> Self {
        Self {
            enforcer,
            notifier,
            scheduler,
            events,
            pending_releases: Arc::new(DashMap::new()),
        }
    }

    /// Enforce an outcome and notify the actor and moderators
    pub async fn execute(&self, report: &Report, outcome: &Outcome) -> EnforcementReport {
        let mut result = EnforcementReport::default();
        let key = outcome.key;

        if let OutcomeAction::Muted(duration) = outcome.action {
            match self.enforcer.apply_mute(key, duration, &report.reason).await {
                Ok(()) => {
                    result.muted = true;
                    self.schedule_release(key, duration);
                }
                Err(e) => self.record_failure(&mut result, key, "mute", e),
            }
        }

        let notice = humanize::actor_notice(&report.reason, outcome);
        match self.notifier.notify_actor(key, &notice).await {
            Ok(()) => result.actor_notified = true,
            Err(e) => warn!(key = %key, error = %e, "Could not notify actor"),
        }

        let log = humanize::moderator_log(report, outcome);
        if let Err(e) = self.notifier.notify_moderators(key.community_id, &log).await {
            warn!(key = %key, error = %e, "Could not notify moderators");
        }

        if !result.is_clean() {
            let alert = humanize::enforcement_alert(key, &result);
            if let Err(e) = self.notifier.notify_moderators(key.community_id, &alert).await {
                warn!(key = %key, error = %e, "Could not report enforcement failure");
            }
        }

        result
    }

    /// Lift a mute early and drop its pending cleanup
    pub async fn release(&self, key: ActorKey) -> Result<()> {
        if let Some((_, (_, handle))) = self.pending_releases.remove(&key) {
            handle.cancel();
        }

        self.enforcer.remove_mute(key).await?;
        info!(key = %key, "Mute released");

        if let Err(e) = self
            .notifier
            .notify_actor(key, "You have been unmuted by a moderator.")
            .await
        {
            warn!(key = %key, error = %e, "Could not notify actor");
        }
        Ok(())
    }

    /// Number of mutes waiting for their cleanup
    #[must_use]
    pub fn pending_release_count(&self) -> usize {
        self.pending_releases.len()
    }

    fn schedule_release(&self, key: ActorKey, after: Duration) {
        let id = Uuid::new_v4();
        let enforcer = self.enforcer.clone();
        let pending = self.pending_releases.clone();

        let handle = self.scheduler.after(
            after,
            Box::pin(async move {
                pending.remove_if(&key, |_, (pending_id, _)| *pending_id == id);
                match enforcer.remove_mute(key).await {
                    Ok(()) => debug!(key = %key, "Expired mute cleaned up"),
                    Err(e) => warn!(key = %key, error = %e, "Mute cleanup failed"),
                }
            }),
        );

        // a newer mute replaces the older cleanup
        if let Some((_, previous)) = self.pending_releases.insert(key, (id, handle)) {
            previous.cancel();
        }
    }

    fn record_failure(&self, report: &mut EnforcementReport, key: ActorKey, action: &str, e: Error) {
        warn!(key = %key, action, error = %e, "Enforcement failed");
        if e.is_permission_denied() {
            report.permission_denied = true;
        } else {
            report.failures.push(e.to_string());
        }
        self.events.publish(DisciplineEvent::EnforcementFailed {
            key,
            action: action.to_string(),
            error: e.to_string(),
        });
    }
}
