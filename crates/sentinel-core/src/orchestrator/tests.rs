use super::*;
use crate::advisory::AdvisoryConfig;
use crate::ban_vote::DEFAULT_VOTE_WINDOW_SECS;
use crate::clock::{ManualClock, ManualScheduler};
use crate::enforcement::{MockEnforcer, MockNotifier};
use crate::escalation::EscalationConfig;
use crate::ledger::DEFAULT_RETENTION_DAYS;
use crate::store::MemoryStore;
use chrono::TimeZone;

const MINUTE: u64 = 60;
const DAY: u64 = 24 * 60 * MINUTE;

struct Harness {
    orchestrator: PunishmentOrchestrator,
    clock: Arc<ManualClock>,
    events: EventBus,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
    ));
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let store = Arc::new(MemoryStore::new());
    let events = EventBus::new(64);

    let mut notifier = MockNotifier::new();
    notifier.expect_notify_moderators().returning(|_, _| Ok(()));
    notifier.expect_notify_actor().returning(|_, _| Ok(()));

    let ledger = Arc::new(Ledger::new(
        store.clone(),
        chrono::Duration::days(DEFAULT_RETENTION_DAYS),
    ));
    let votes = Arc::new(BanVoteCoordinator::new(
        store,
        clock.clone(),
        scheduler,
        Arc::new(MockEnforcer::new()),
        Arc::new(notifier),
        events.clone(),
        Duration::from_secs(DEFAULT_VOTE_WINDOW_SECS),
    ));

    let orchestrator = PunishmentOrchestrator::new(
        Arc::new(Classifier::default()),
        ledger.clone(),
        AdvisoryTracker::new(ledger, AdvisoryConfig::default()).unwrap(),
        EscalationPolicy::new(EscalationConfig::default()).unwrap(),
        votes,
        clock.clone(),
        events.clone(),
        DEFAULT_MAX_MANUAL_POINTS,
    );

    Harness {
        orchestrator,
        clock,
        events,
    }
}

fn actor() -> ActorKey {
    ActorKey::new(77, 1001)
}

const MODERATOR: u64 = 5;

fn report(reason: &str) -> Report {
    Report::new(actor(), MODERATOR, reason)
}

fn minutes(n: u64) -> OutcomeAction {
    OutcomeAction::Muted(Duration::from_secs(n * MINUTE))
}

#[tokio::test]
async fn test_self_target_is_rejected_without_side_effects() {
    let h = harness();

    let result = h
        .orchestrator
        .process(Report::new(actor(), actor().actor_id, "spam"))
        .await;
    assert!(matches!(result, Err(Error::InvalidTarget(_))));

    let standing = h.orchestrator.standing(actor(), 5).await.unwrap();
    assert_eq!(standing.total, 0);
}

#[tokio::test]
async fn test_blank_reason_is_rejected() {
    let h = harness();
    let result = h.orchestrator.process(report("   ")).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_manual_points_are_bounded() {
    let h = harness();

    let result = h.orchestrator.process(report("custom").with_points(11)).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    let result = h.orchestrator.process(report("custom").with_points(-1)).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    let outcome = h
        .orchestrator
        .process(report("custom").with_points(0))
        .await
        .unwrap();
    assert_eq!(outcome.action, minutes(5));
    assert_eq!(outcome.total, 0);
    assert!(outcome.classification.is_none());
}

#[tokio::test]
async fn test_classified_report_is_recorded_and_muted() {
    let h = harness();
    let mut rx = h.events.subscribe();

    let outcome = h.orchestrator.process(report("spamming links")).await.unwrap();
    assert_eq!(outcome.points_delta, 1);
    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.action, minutes(15));
    assert_eq!(
        outcome.classification.unwrap().matched_keyword.as_deref(),
        Some("spam")
    );

    match rx.recv().await.unwrap() {
        DisciplineEvent::GrantRecorded { points, total, .. } => {
            assert_eq!((points, total), (1, 1));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_escalation_through_thresholds_to_ban_vote() {
    let h = harness();

    // 4 points: below the first threshold, base duration for a 4-point grant
    let outcome = h
        .orchestrator
        .process(report("manual").with_points(4))
        .await
        .unwrap();
    assert_eq!(outcome.total, 4);
    assert_eq!(outcome.action, OutcomeAction::Muted(Duration::from_secs(6 * 60 * MINUTE)));

    // 7 points: first threshold
    let outcome = h
        .orchestrator
        .process(report("manual").with_points(3))
        .await
        .unwrap();
    assert_eq!(outcome.total, 7);
    assert_eq!(outcome.action, OutcomeAction::Muted(Duration::from_secs(DAY)));

    // 16 points: ban vote
    let outcome = h
        .orchestrator
        .process(report("manual").with_points(9))
        .await
        .unwrap();
    assert_eq!(outcome.total, 16);
    let vote_id = match outcome.action {
        OutcomeAction::PendingBanVote { vote_id } => vote_id,
        other => panic!("expected ban vote, got {:?}", other),
    };

    // a further report while the vote runs does not open another
    let outcome = h.orchestrator.process(report("spam")).await.unwrap();
    assert_eq!(
        outcome.action,
        OutcomeAction::VoteAlreadyPending {
            vote_id: Some(vote_id)
        }
    );
    assert_eq!(outcome.total, 17);
}

#[tokio::test]
async fn test_advisory_sequence() {
    let h = harness();

    let first = h.orchestrator.process(report("advisory")).await.unwrap();
    assert_eq!(first.action, OutcomeAction::NoAction);
    assert_eq!(first.points_delta, 0);
    assert_eq!(first.advisory.unwrap().warning_number, 1);

    let second = h.orchestrator.process(report("Advisory")).await.unwrap();
    assert_eq!(second.action, minutes(5));
    assert_eq!(second.advisory.unwrap().outstanding, 2);

    let third = h.orchestrator.process(report("advisory")).await.unwrap();
    assert_eq!(third.action, minutes(15));
    assert_eq!(third.points_delta, 1);
    assert_eq!(third.total, 1);
    let progress = third.advisory.unwrap();
    assert!(progress.converted);
    assert_eq!(progress.warning_number, 3);
    assert_eq!(progress.outstanding, 0);

    let standing = h.orchestrator.standing(actor(), 5).await.unwrap();
    assert_eq!(standing.warnings, 0);
    assert_eq!(standing.advisory, AdvisoryState::Clean);
}

#[tokio::test]
async fn test_advisory_conversion_can_trigger_ban_vote() {
    let h = harness();

    h.orchestrator
        .process(report("manual").with_points(10))
        .await
        .unwrap();
    h.orchestrator
        .process(report("manual").with_points(4))
        .await
        .unwrap();

    h.orchestrator.process(report("advisory")).await.unwrap();
    h.orchestrator.process(report("advisory")).await.unwrap();
    let third = h.orchestrator.process(report("advisory")).await.unwrap();

    assert_eq!(third.total, 15);
    assert!(matches!(third.action, OutcomeAction::PendingBanVote { .. }));
}

#[tokio::test]
async fn test_expired_grants_do_not_count() {
    let h = harness();

    h.orchestrator
        .process(report("manual").with_points(6))
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::days(21));

    let outcome = h.orchestrator.process(report("rude remark")).await.unwrap();
    assert_eq!(outcome.total, 2);
    assert_eq!(outcome.action, minutes(40));
}

#[tokio::test]
async fn test_deduct_clear_and_standing() {
    let h = harness();

    h.orchestrator
        .process(report("manual").with_points(2))
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::minutes(1));
    h.orchestrator
        .process(report("manual").with_points(4))
        .await
        .unwrap();

    assert_eq!(h.orchestrator.deduct(actor(), 5).await.unwrap(), 1);

    let standing = h.orchestrator.standing(actor(), 10).await.unwrap();
    assert_eq!(standing.total, 1);
    assert_eq!(standing.recent.len(), 1);
    assert_eq!(
        standing.next_threshold,
        Some((5, Action::Mute(Duration::from_secs(DAY))))
    );
    assert!(standing.open_vote.is_none());

    assert_eq!(h.orchestrator.clear(actor()).await.unwrap(), 1);
    assert_eq!(h.orchestrator.standing(actor(), 10).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_preview_does_not_write() {
    let h = harness();

    let (classification, action) = h.orchestrator.preview("doxxing");
    assert_eq!(classification.points, 10);
    assert_eq!(action, Action::Mute(Duration::from_secs(7 * DAY)));

    assert_eq!(h.orchestrator.standing(actor(), 5).await.unwrap().total, 0);
}

/// Backend that is down for every call
struct DownStore;

fn down<T>() -> Result<T> {
    Err(Error::StoreUnavailable("database is locked".to_string()))
}

#[async_trait::async_trait]
impl crate::store::LedgerStore for DownStore {
    async fn insert_grant(&self, _: &PointGrant) -> Result<Uuid> {
        down()
    }
    async fn query_grants(&self, _: ActorKey) -> Result<Vec<PointGrant>> {
        down()
    }
    async fn delete_grants(&self, _: ActorKey, _: crate::ledger::GrantFilter) -> Result<u64> {
        down()
    }
    async fn apply_adjustments(
        &self,
        _: ActorKey,
        _: &[crate::ledger::GrantAdjustment],
    ) -> Result<()> {
        down()
    }
    async fn push_warning(&self, _: ActorKey, _: &crate::ledger::AdvisoryWarning) -> Result<u32> {
        down()
    }
    async fn warnings(&self, _: ActorKey) -> Result<Vec<crate::ledger::AdvisoryWarning>> {
        down()
    }
    async fn clear_warnings(&self, _: ActorKey) -> Result<bool> {
        down()
    }
}

#[async_trait::async_trait]
impl crate::store::VoteStore for DownStore {
    async fn save_vote(&self, _: &crate::ban_vote::BanVote) -> Result<()> {
        down()
    }
    async fn record_ballot(&self, _: Uuid, _: u64, _: crate::ban_vote::Ballot) -> Result<()> {
        down()
    }
    async fn close_vote(
        &self,
        _: Uuid,
        _: crate::ban_vote::VoteOutcome,
        _: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool> {
        down()
    }
    async fn load_open_votes(&self) -> Result<Vec<crate::ban_vote::BanVote>> {
        down()
    }
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let mut enforcer = MockEnforcer::new();
    enforcer.expect_apply_mute().never();
    enforcer.expect_apply_ban().never();
    let mut notifier = MockNotifier::new();
    notifier.expect_notify_actor().never();
    notifier.expect_notify_moderators().never();

    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
    ));
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let engine = crate::engine::DisciplineEngineBuilder::new()
        .store(Arc::new(DownStore))
        .enforcer(Arc::new(enforcer))
        .notifier(Arc::new(notifier))
        .clock(clock)
        .scheduler(scheduler.clone())
        .events(events)
        .build()
        .unwrap();

    for report in [
        report("spamming links"),
        report("custom").with_points(DEFAULT_MAX_MANUAL_POINTS),
        report(crate::advisory::ADVISORY_REASON),
    ] {
        let result = engine.report(report).await;
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    }

    assert!(matches!(
        engine.orchestrator().standing(actor(), 5).await,
        Err(Error::StoreUnavailable(_))
    ));
    assert_eq!(engine.votes().open_vote_for(actor()).await, None);
    assert_eq!(scheduler.pending_count(), 0);
    assert!(rx.try_recv().is_err());
}
