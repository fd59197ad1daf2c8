//! Integration tests for Sentinel
//!
//! These tests drive the fully wired engine the way the Discord adapter does:
//! - sentinel-core: reports, escalation, mutes and their cleanup
//! - sentinel-core: ban votes, ballots, resolution and restart recovery
//! - sentinel-channels: reply formatting over real outcomes

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentinel_channels::format::{punish_reply, threshold_status};
use sentinel_core::{
    collect_reason, ActorKey, Ballot, BallotReceipt, DisciplineConfig, DisciplineEngine,
    DisciplineEngineBuilder, DisciplineEvent, Enforcer, Error, IntakeResult, ManualClock,
    ManualScheduler, MemoryStore, Notifier, OutcomeAction, ReasonSource, Report, SqliteStore,
    VoteOutcome, Voter,
};

const GUILD: u64 = 100;
const MODERATOR: u64 = 7;

// ============================================================================
// Test platform
// ============================================================================

/// Records every enforcement and notification call
#[derive(Default)]
struct RecordingPlatform {
    calls: Mutex<Vec<String>>,
}

impl RecordingPlatform {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Enforcer for RecordingPlatform {
    async fn apply_mute(
        &self,
        key: ActorKey,
        duration: Duration,
        _reason: &str,
    ) -> sentinel_core::Result<()> {
        self.push(format!("mute {} {}", key.actor_id, duration.as_secs()));
        Ok(())
    }

    async fn remove_mute(&self, key: ActorKey) -> sentinel_core::Result<()> {
        self.push(format!("unmute {}", key.actor_id));
        Ok(())
    }

    async fn apply_ban(&self, key: ActorKey, _reason: &str) -> sentinel_core::Result<()> {
        self.push(format!("ban {}", key.actor_id));
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingPlatform {
    async fn notify_actor(&self, key: ActorKey, message: &str) -> sentinel_core::Result<()> {
        self.push(format!("dm {} {}", key.actor_id, message));
        Ok(())
    }

    async fn notify_moderators(&self, community_id: u64, message: &str) -> sentinel_core::Result<()> {
        self.push(format!("log {} {}", community_id, message));
        Ok(())
    }
}

/// Replies once with a fixed reason
struct ScriptedReporter {
    reply: Option<String>,
}

#[async_trait]
impl ReasonSource for ScriptedReporter {
    async fn prompt(&self, _reporter_id: u64) -> sentinel_core::Result<()> {
        Ok(())
    }

    async fn next_reply(&self, _reporter_id: u64) -> sentinel_core::Result<Option<String>> {
        match &self.reply {
            Some(reply) => Ok(Some(reply.clone())),
            None => std::future::pending().await,
        }
    }
}

struct Harness {
    engine: DisciplineEngine,
    clock: Arc<ManualClock>,
    scheduler: Arc<ManualScheduler>,
    platform: Arc<RecordingPlatform>,
}

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
}

fn harness_with<S>(store: Arc<S>, clock: Arc<ManualClock>) -> Harness
where
    S: sentinel_core::LedgerStore + sentinel_core::VoteStore + 'static,
{
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let platform = Arc::new(RecordingPlatform::default());
    let engine = DisciplineEngineBuilder::new()
        .store(store)
        .enforcer(platform.clone())
        .notifier(platform.clone())
        .clock(clock.clone())
        .scheduler(scheduler.clone())
        .config(DisciplineConfig::default())
        .build()
        .unwrap();

    Harness {
        engine,
        clock,
        scheduler,
        platform,
    }
}

fn harness() -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(start())),
    )
}

// ============================================================================
// Report pipeline
// ============================================================================

#[tokio::test]
async fn test_report_mutes_and_releases_after_duration() {
    let h = harness();
    let key = ActorKey::new(GUILD, 42);

    let (outcome, enforcement) = h
        .engine
        .report(Report::new(key, MODERATOR, "spamming links"))
        .await
        .unwrap();

    assert_eq!(outcome.action, OutcomeAction::Muted(Duration::from_secs(15 * 60)));
    assert_eq!(outcome.total, 1);
    assert!(enforcement.muted);
    assert!(enforcement.actor_notified);
    assert_eq!(h.platform.count("mute 42 900"), 1);
    assert_eq!(h.platform.count("log 100"), 1);

    // Not yet due
    h.clock.advance(chrono::Duration::minutes(10));
    assert_eq!(h.scheduler.run_due().await, 0);
    assert_eq!(h.platform.count("unmute"), 0);

    h.clock.advance(chrono::Duration::minutes(6));
    assert_eq!(h.scheduler.run_due().await, 1);
    assert_eq!(h.platform.count("unmute 42"), 1);
}

#[tokio::test]
async fn test_early_release_cancels_cleanup() {
    let h = harness();
    let key = ActorKey::new(GUILD, 42);

    h.engine
        .report(Report::new(key, MODERATOR, "rude remark"))
        .await
        .unwrap();
    h.engine.release(key).await.unwrap();
    assert_eq!(h.platform.count("unmute 42"), 1);

    h.clock.advance(chrono::Duration::hours(1));
    assert_eq!(h.scheduler.run_due().await, 0);
    assert_eq!(h.platform.count("unmute 42"), 1);
}

#[tokio::test]
async fn test_self_report_rejected_without_side_effects() {
    let h = harness();
    let key = ActorKey::new(GUILD, MODERATOR);

    let err = h
        .engine
        .report(Report::new(key, MODERATOR, "spam"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidTarget(_)));
    assert!(h.platform.calls().is_empty());
}

#[tokio::test]
async fn test_member_report_through_intake() {
    let h = harness();
    let key = ActorKey::new(GUILD, 42);
    let reporter = ScriptedReporter {
        reply: Some("  harassment in general chat ".to_string()),
    };

    let reason = match collect_reason(&reporter, 9, Duration::from_secs(60)).await.unwrap() {
        IntakeResult::Provided(reason) => reason,
        other => panic!("unexpected intake result: {:?}", other),
    };
    assert_eq!(reason, "harassment in general chat");

    let (outcome, _) = h.engine.report(Report::new(key, 9, reason)).await.unwrap();
    assert_eq!(outcome.points_delta, 4);
    assert_eq!(outcome.action, OutcomeAction::Muted(Duration::from_secs(6 * 3600)));
}

#[tokio::test(start_paused = true)]
async fn test_silent_reporter_times_out() {
    let reporter = ScriptedReporter { reply: None };

    let result = collect_reason(&reporter, 9, Duration::from_secs(60)).await.unwrap();
    assert_eq!(result, IntakeResult::TimedOut);
}

#[tokio::test]
async fn test_points_expire_after_retention() {
    let h = harness();
    let key = ActorKey::new(GUILD, 42);

    h.engine
        .report(Report::new(key, MODERATOR, "").with_points(8))
        .await
        .unwrap_err();
    h.engine
        .report(Report::new(key, MODERATOR, "manual assignment").with_points(8))
        .await
        .unwrap();

    let standing = h.engine.orchestrator().standing(key, 5).await.unwrap();
    assert_eq!(standing.total, 8);
    assert!(threshold_status(standing.total, h.engine.orchestrator().escalation())
        .contains("Next threshold: **10 MP**"));

    h.clock.advance(chrono::Duration::days(21));
    let standing = h.engine.orchestrator().standing(key, 5).await.unwrap();
    assert_eq!(standing.total, 0);
    assert!(standing.recent.is_empty());
}

#[tokio::test]
async fn test_advisory_track_converts_on_third_warning() {
    let h = harness();
    let key = ActorKey::new(GUILD, 42);

    let (first, _) = h
        .engine
        .report(Report::new(key, MODERATOR, "advisory"))
        .await
        .unwrap();
    assert_eq!(first.action, OutcomeAction::NoAction);
    assert_eq!(first.total, 0);

    let (second, _) = h
        .engine
        .report(Report::new(key, MODERATOR, "advisory"))
        .await
        .unwrap();
    assert_eq!(second.action, OutcomeAction::Muted(Duration::from_secs(5 * 60)));

    let (third, _) = h
        .engine
        .report(Report::new(key, MODERATOR, "advisory"))
        .await
        .unwrap();
    let advisory = third.advisory.unwrap();
    assert!(advisory.converted);
    assert_eq!(advisory.outstanding, 0);
    assert_eq!(third.points_delta, 1);
    assert_eq!(third.total, 1);
}

// ============================================================================
// Ban votes
// ============================================================================

async fn push_to_ban_vote(h: &Harness, key: ActorKey) -> uuid::Uuid {
    h.engine
        .report(Report::new(key, MODERATOR, "manual assignment").with_points(10))
        .await
        .unwrap();
    let (outcome, _) = h
        .engine
        .report(Report::new(key, MODERATOR, "manual assignment").with_points(5))
        .await
        .unwrap();

    match outcome.action {
        OutcomeAction::PendingBanVote { vote_id } => vote_id,
        other => panic!("expected a ban vote, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ban_vote_majority_bans() {
    let h = harness();
    let key = ActorKey::new(GUILD, 42);
    let mut events = h.engine.events().subscribe();

    let vote_id = push_to_ban_vote(&h, key).await;

    let terminal = h.engine.orchestrator().escalation().terminal_threshold();
    let (outcome, enforcement) = h
        .engine
        .report(Report::new(key, MODERATOR, "spam"))
        .await
        .unwrap();
    assert_eq!(
        outcome.action,
        OutcomeAction::VoteAlreadyPending {
            vote_id: Some(vote_id)
        }
    );
    assert!(punish_reply(&outcome, &enforcement, terminal).contains("<@42>"));

    let yes = h
        .engine
        .cast_ballot(vote_id, Voter::member(1), Ballot::Yes)
        .await
        .unwrap();
    assert!(matches!(yes, BallotReceipt::Counted(t) if t.yes == 1));

    // Bots and the accused do not count
    assert_eq!(
        h.engine
            .cast_ballot(vote_id, Voter::bot(2), Ballot::No)
            .await
            .unwrap(),
        BallotReceipt::Excluded
    );
    assert_eq!(
        h.engine
            .cast_ballot(vote_id, Voter::member(42), Ballot::No)
            .await
            .unwrap(),
        BallotReceipt::Excluded
    );

    h.clock.advance(chrono::Duration::seconds(121));
    h.scheduler.run_due().await;

    assert_eq!(h.platform.count("ban 42"), 1);
    let vote = h.engine.votes().get(vote_id).await.unwrap();
    assert!(vote.is_resolved());

    let mut saw_open = false;
    let mut saw_resolved = false;
    while let Ok(event) = events.try_recv() {
        match event {
            DisciplineEvent::VoteOpened { vote_id: id, .. } => saw_open |= id == vote_id,
            DisciplineEvent::VoteResolved { outcome, .. } => {
                saw_resolved = outcome == VoteOutcome::Banned;
            }
            _ => {}
        }
    }
    assert!(saw_open);
    assert!(saw_resolved);
}

#[tokio::test]
async fn test_ban_vote_tie_spares() {
    let h = harness();
    let key = ActorKey::new(GUILD, 42);
    let vote_id = push_to_ban_vote(&h, key).await;

    h.engine
        .cast_ballot(vote_id, Voter::member(1), Ballot::Yes)
        .await
        .unwrap();
    h.engine
        .cast_ballot(vote_id, Voter::member(2), Ballot::No)
        .await
        .unwrap();

    h.clock.advance(chrono::Duration::seconds(121));
    h.scheduler.run_due().await;

    assert_eq!(h.platform.count("ban"), 0);
    let err = h
        .engine
        .cast_ballot(vote_id, Voter::member(3), Ballot::Yes)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_open_vote_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sentinel.db");
    let clock = Arc::new(ManualClock::new(start()));
    let key = ActorKey::new(GUILD, 42);

    let vote_id = {
        let store = Arc::new(SqliteStore::from_path(&db_path).await.unwrap());
        let h = harness_with(store, clock.clone());
        let vote_id = push_to_ban_vote(&h, key).await;
        h.engine
            .cast_ballot(vote_id, Voter::member(1), Ballot::Yes)
            .await
            .unwrap();
        h.engine
            .cast_ballot(vote_id, Voter::member(2), Ballot::Yes)
            .await
            .unwrap();
        vote_id
    };

    let store = Arc::new(SqliteStore::from_path(&db_path).await.unwrap());
    let h = harness_with(store, clock.clone());
    assert_eq!(h.engine.recover().await.unwrap(), 1);

    let vote = h.engine.votes().get(vote_id).await.unwrap();
    assert_eq!(vote.tally().yes, 2);

    let standing = h.engine.orchestrator().standing(key, 5).await.unwrap();
    assert_eq!(standing.total, 15);
    assert_eq!(standing.open_vote, Some(vote_id));

    h.clock.advance(chrono::Duration::minutes(3));
    h.scheduler.run_due().await;
    assert_eq!(h.platform.count("ban 42"), 1);

    // Nothing left to recover once resolved
    let store = Arc::new(SqliteStore::from_path(&db_path).await.unwrap());
    let h = harness_with(store, clock);
    assert_eq!(h.engine.recover().await.unwrap(), 0);
}
