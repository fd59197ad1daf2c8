//! Engine wiring
//!
//! [`DisciplineEngine`] owns every component and is what adapters hold on to.
//! Build it with [`DisciplineEngineBuilder`]:
//!
//! ```ignore
//! let engine = DisciplineEngineBuilder::new()
//!     .store(Arc::new(SqliteStore::from_path(&db_path).await?))
//!     .enforcer(enforcer)
//!     .notifier(notifier)
//!     .config(config.discipline)
//!     .build()?;
//! engine.recover().await?;
//! ```

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::advisory::AdvisoryTracker;
use crate::ban_vote::{Ballot, BallotReceipt, BanVoteCoordinator, Voter};
use crate::classifier::Classifier;
use crate::clock::{Clock, Scheduler, SystemClock, TokioScheduler};
use crate::config::DisciplineConfig;
use crate::enforcement::{EnforcementDispatcher, EnforcementReport, Enforcer, Notifier};
use crate::error::{Error, Result};
use crate::escalation::EscalationPolicy;
use crate::event_bus::EventBus;
use crate::ledger::{ActorKey, Ledger};
use crate::orchestrator::{Outcome, PunishmentOrchestrator, Report};
use crate::store::{LedgerStore, VoteStore};

/// Fully wired discipline engine
pub struct DisciplineEngine {
    orchestrator: PunishmentOrchestrator,
    dispatcher: EnforcementDispatcher,
    votes: Arc<BanVoteCoordinator>,
    events: EventBus,
    config: DisciplineConfig,
}

impl DisciplineEngine {
    /// Process a report and enforce its outcome
    pub async fn report(&self, report: Report) -> Result<(Outcome, EnforcementReport)> {
        let outcome = self.orchestrator.process(report.clone()).await?;
        let enforcement = self.dispatcher.execute(&report, &outcome).await;
        Ok((outcome, enforcement))
    }

    /// Lift a mute early
    pub async fn release(&self, key: ActorKey) -> Result<()> {
        self.dispatcher.release(key).await
    }

    /// Cast a ballot on an open vote
    pub async fn cast_ballot(
        &self,
        vote_id: Uuid,
        voter: Voter,
        ballot: Ballot,
    ) -> Result<BallotReceipt> {
        self.votes.cast_ballot(vote_id, voter, ballot).await
    }

    /// Reschedule votes left open by a previous run
    pub async fn recover(&self) -> Result<usize> {
        self.votes.recover().await
    }

    /// Orchestrator, for standing queries and ledger maintenance
    #[must_use]
    pub fn orchestrator(&self) -> &PunishmentOrchestrator {
        &self.orchestrator
    }

    /// Ban-vote coordinator
    #[must_use]
    pub fn votes(&self) -> &Arc<BanVoteCoordinator> {
        &self.votes
    }

    /// Event bus
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &DisciplineConfig {
        &self.config
    }
}

/// Builder for [`DisciplineEngine`]
pub struct DisciplineEngineBuilder {
    ledger_store: Option<Arc<dyn LedgerStore>>,
    vote_store: Option<Arc<dyn VoteStore>>,
    enforcer: Option<Arc<dyn Enforcer>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    events: Option<EventBus>,
    config: DisciplineConfig,
}

impl DisciplineEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            ledger_store: None,
            vote_store: None,
            enforcer: None,
            notifier: None,
            clock: None,
            scheduler: None,
            events: None,
            config: DisciplineConfig::default(),
        }
    }

    /// Use one backend for grants and votes
    pub fn store<S>(mut self, store: Arc<S>) -> Self
    where
        S: LedgerStore + VoteStore + 'static,
    {
        self.ledger_store = Some(store.clone());
        self.vote_store = Some(store);
        self
    }

    /// Set the enforcer
    pub fn enforcer(mut self, enforcer: Arc<dyn Enforcer>) -> Self {
        self.enforcer = Some(enforcer);
        self
    }

    /// Set the notifier
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the clock (defaults to the wall clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Override the scheduler (defaults to tokio timers)
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Share an existing event bus
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the configuration
    pub fn config(mut self, config: DisciplineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<DisciplineEngine> {
        let config = self.config;
        config.validate()?;

        let ledger_store = self
            .ledger_store
            .ok_or_else(|| Error::Configuration("Store is required".to_string()))?;
        let vote_store = self
            .vote_store
            .ok_or_else(|| Error::Configuration("Store is required".to_string()))?;
        let enforcer = self
            .enforcer
            .ok_or_else(|| Error::Configuration("Enforcer is required".to_string()))?;
        let notifier = self
            .notifier
            .ok_or_else(|| Error::Configuration("Notifier is required".to_string()))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::default()));
        let events = self.events.unwrap_or_default();

        let classifier = Arc::new(Classifier::new(config.offenses.clone())?);
        let escalation = EscalationPolicy::new(config.escalation.clone())?;
        let ledger = Arc::new(Ledger::new(ledger_store, config.retention()));
        let advisory = AdvisoryTracker::new(ledger.clone(), config.advisory.clone())?;

        let votes = Arc::new(BanVoteCoordinator::new(
            vote_store,
            clock.clone(),
            scheduler.clone(),
            enforcer.clone(),
            notifier.clone(),
            events.clone(),
            config.vote_window(),
        ));

        let orchestrator = PunishmentOrchestrator::new(
            classifier,
            ledger,
            advisory,
            escalation,
            votes.clone(),
            clock,
            events.clone(),
            config.max_manual_points,
        );
        let dispatcher = EnforcementDispatcher::new(enforcer, notifier, scheduler, events.clone());

        info!(
            offense_table = config.offenses.version,
            retention_days = config.retention_days,
            terminal_threshold = config.escalation.terminal_threshold,
            "Discipline engine ready"
        );

        Ok(DisciplineEngine {
            orchestrator,
            dispatcher,
            votes,
            events,
            config,
        })
    }
}

impl Default for DisciplineEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
