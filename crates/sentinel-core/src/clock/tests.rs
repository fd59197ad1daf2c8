use super::*;
use chrono::TimeZone;
use std::sync::atomic::{AtomicUsize, Ordering};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_manual_clock_advance() {
    let clock = ManualClock::new(start());
    clock.advance(chrono::Duration::seconds(90));
    assert_eq!(clock.now(), start() + chrono::Duration::seconds(90));

    clock.set(start());
    assert_eq!(clock.now(), start());
}

#[tokio::test]
async fn test_manual_scheduler_runs_only_due_tasks() {
    let clock = Arc::new(ManualClock::new(start()));
    let scheduler = ManualScheduler::new(clock.clone());
    let hits = Arc::new(AtomicUsize::new(0));

    let h = hits.clone();
    scheduler.after(
        Duration::from_secs(120),
        Box::pin(async move {
            h.fetch_add(1, Ordering::SeqCst);
        }),
    );

    clock.advance(chrono::Duration::seconds(119));
    assert_eq!(scheduler.run_due().await, 0);
    assert_eq!(scheduler.pending_count(), 1);

    clock.advance(chrono::Duration::seconds(1));
    assert_eq!(scheduler.run_due().await, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.pending_count(), 0);
}

#[tokio::test]
async fn test_manual_scheduler_skips_cancelled() {
    let clock = Arc::new(ManualClock::new(start()));
    let scheduler = ManualScheduler::new(clock.clone());
    let hits = Arc::new(AtomicUsize::new(0));

    let h = hits.clone();
    let handle = scheduler.after(
        Duration::from_secs(5),
        Box::pin(async move {
            h.fetch_add(1, Ordering::SeqCst);
        }),
    );
    handle.cancel();
    assert!(handle.is_cancelled());

    clock.advance(chrono::Duration::seconds(10));
    assert_eq!(scheduler.run_due().await, 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_fires_after_delay() {
    let scheduler = TokioScheduler::new(CancellationToken::new());
    let (tx, rx) = tokio::sync::oneshot::channel();

    scheduler.after(
        Duration::from_secs(300),
        Box::pin(async move {
            let _ = tx.send(());
        }),
    );

    tokio::time::timeout(Duration::from_secs(301), rx)
        .await
        .expect("task should fire before the timeout")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_shutdown_cancels_pending() {
    let shutdown = CancellationToken::new();
    let scheduler = TokioScheduler::new(shutdown.clone());
    let hits = Arc::new(AtomicUsize::new(0));

    let h = hits.clone();
    let handle = scheduler.after(
        Duration::from_secs(60),
        Box::pin(async move {
            h.fetch_add(1, Ordering::SeqCst);
        }),
    );

    shutdown.cancel();
    assert!(handle.is_cancelled());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
