use super::*;
use crate::ban_vote::{Ballot, BanVote, VoteOutcome};
use crate::error::Error;
use crate::ledger::{ActorKey, AdvisoryWarning, GrantAdjustment, GrantFilter, PointGrant};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

struct TestContext {
    store: Arc<SqliteStore>,
    _dir: TempDir,
}

async fn create_test_context() -> TestContext {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("discipline.db");
    let store = Arc::new(SqliteStore::from_path(&path).await.unwrap());
    TestContext { store, _dir: dir }
}

fn key() -> ActorKey {
    ActorKey::new(100, 7)
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn test_sqlite_grants_roundtrip_in_time_order() {
    let ctx = create_test_context().await;

    let later = PointGrant::new(key(), 4, "spamming", t0() + Duration::hours(1), Some(1));
    let earlier = PointGrant::new(key(), 2, "being mean", t0(), None);
    ctx.store.insert_grant(&later).await.unwrap();
    ctx.store.insert_grant(&earlier).await.unwrap();
    ctx.store
        .insert_grant(&PointGrant::new(ActorKey::new(100, 8), 1, "other", t0(), None))
        .await
        .unwrap();

    let grants = ctx.store.query_grants(key()).await.unwrap();
    assert_eq!(grants, vec![earlier, later]);
}

#[tokio::test]
async fn test_sqlite_delete_by_cutoff() {
    let ctx = create_test_context().await;

    for hours in [0, 1, 2] {
        let grant = PointGrant::new(key(), 1, "x", t0() + Duration::hours(hours), None);
        ctx.store.insert_grant(&grant).await.unwrap();
    }

    let removed = ctx
        .store
        .delete_grants(key(), GrantFilter::GrantedAtOrBefore(t0() + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(ctx.store.query_grants(key()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sqlite_adjustments_are_atomic() {
    let ctx = create_test_context().await;

    let a = PointGrant::new(key(), 2, "a", t0(), None);
    let b = PointGrant::new(key(), 4, "b", t0() + Duration::minutes(1), None);
    ctx.store.insert_grant(&a).await.unwrap();
    ctx.store.insert_grant(&b).await.unwrap();

    let missing = GrantAdjustment {
        id: uuid::Uuid::new_v4(),
        points: 0,
    };
    let result = ctx
        .store
        .apply_adjustments(key(), &[GrantAdjustment { id: b.id, points: 0 }, missing])
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(ctx.store.query_grants(key()).await.unwrap().len(), 2);

    ctx.store
        .apply_adjustments(
            key(),
            &[
                GrantAdjustment { id: b.id, points: 0 },
                GrantAdjustment { id: a.id, points: 1 },
            ],
        )
        .await
        .unwrap();
    let grants = ctx.store.query_grants(key()).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].id, a.id);
    assert_eq!(grants[0].points, 1);
}

#[tokio::test]
async fn test_sqlite_warning_counter() {
    let ctx = create_test_context().await;

    let first = AdvisoryWarning::new(t0(), Some(3)).with_note("tone it down");
    assert_eq!(ctx.store.push_warning(key(), &first).await.unwrap(), 1);
    assert_eq!(
        ctx.store
            .push_warning(key(), &AdvisoryWarning::new(t0(), None))
            .await
            .unwrap(),
        2
    );

    let warnings = ctx.store.warnings(key()).await.unwrap();
    assert_eq!(warnings[0], first);

    assert!(ctx.store.clear_warnings(key()).await.unwrap());
    assert!(!ctx.store.clear_warnings(key()).await.unwrap());
    assert!(ctx.store.warnings(key()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sqlite_open_votes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("votes.db");

    let vote = BanVote::new(key(), t0(), 120);
    {
        let store = SqliteStore::from_path(&path).await.unwrap();
        store.save_vote(&vote).await.unwrap();
        store.record_ballot(vote.id, 11, Ballot::Yes).await.unwrap();
        store.record_ballot(vote.id, 12, Ballot::Yes).await.unwrap();
        store.record_ballot(vote.id, 11, Ballot::No).await.unwrap();
    }

    let store = SqliteStore::from_path(&path).await.unwrap();
    let open = store.load_open_votes().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, vote.id);
    assert_eq!(open[0].ballots.get(&11), Some(&Ballot::No));
    assert_eq!(open[0].tally().yes, 1);

    store
        .close_vote(vote.id, VoteOutcome::Reprieved, t0() + Duration::seconds(120))
        .await
        .unwrap();
    assert!(store.load_open_votes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sqlite_close_vote_only_closes_open_votes() {
    let ctx = create_test_context().await;

    let vote = BanVote::new(key(), t0(), 120);
    ctx.store.save_vote(&vote).await.unwrap();

    let closed_at = t0() + Duration::seconds(120);
    assert!(ctx
        .store
        .close_vote(vote.id, VoteOutcome::Banned, closed_at)
        .await
        .unwrap());
    assert!(!ctx
        .store
        .close_vote(vote.id, VoteOutcome::Reprieved, closed_at)
        .await
        .unwrap());

    let status: (String,) = sqlx::query_as("SELECT status FROM ban_votes WHERE id = ?")
        .bind(vote.id.to_string())
        .fetch_one(ctx.store.pool())
        .await
        .unwrap();
    assert_eq!(status.0, VoteOutcome::Banned.as_str());

    assert!(matches!(
        ctx.store
            .close_vote(uuid::Uuid::new_v4(), VoteOutcome::Banned, closed_at)
            .await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_sqlite_rejects_second_open_vote_for_same_actor() {
    let ctx = create_test_context().await;

    ctx.store.save_vote(&BanVote::new(key(), t0(), 120)).await.unwrap();
    let second = ctx.store.save_vote(&BanVote::new(key(), t0(), 120)).await;
    assert!(matches!(second, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_memory_store_matches_sqlite_semantics() {
    let store = MemoryStore::new();

    let a = PointGrant::new(key(), 3, "a", t0(), None);
    let zero = PointGrant::new(key(), 0, "advisory", t0(), None);
    store.insert_grant(&a).await.unwrap();
    store.insert_grant(&zero).await.unwrap();

    store
        .apply_adjustments(key(), &[GrantAdjustment { id: a.id, points: 0 }])
        .await
        .unwrap();
    // untouched zero-point grants survive
    assert_eq!(store.query_grants(key()).await.unwrap(), vec![zero]);

    let vote = BanVote::new(key(), t0(), 60);
    store.save_vote(&vote).await.unwrap();
    assert!(store
        .close_vote(vote.id, VoteOutcome::Banned, t0())
        .await
        .unwrap());
    assert!(!store
        .close_vote(vote.id, VoteOutcome::Reprieved, t0())
        .await
        .unwrap());
    assert!(store.load_open_votes().await.unwrap().is_empty());
    assert!(matches!(
        store.record_ballot(uuid::Uuid::new_v4(), 1, Ballot::Yes).await,
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_memory_store_warnings_are_per_key() {
    let store = MemoryStore::new();
    let other = ActorKey::new(100, 8);

    tokio_test::block_on(async {
        assert_eq!(store.push_warning(key(), &AdvisoryWarning::new(t0(), Some(1))).await.unwrap(), 1);
        assert_eq!(store.push_warning(key(), &AdvisoryWarning::new(t0(), None)).await.unwrap(), 2);
        assert!(store.warnings(other).await.unwrap().is_empty());
        assert!(store.clear_warnings(key()).await.unwrap());
        assert!(!store.clear_warnings(key()).await.unwrap());
    });
}
