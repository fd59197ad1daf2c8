use super::*;

#[tokio::test]
async fn test_publish_subscribe() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();

    let key = ActorKey::new(10, 20);
    bus.publish(DisciplineEvent::AdvisoryIssued {
        key,
        count: 2,
        converted: false,
    });

    let event = rx.recv().await.unwrap();
    assert_eq!(event.key(), key);
    match event {
        DisciplineEvent::AdvisoryIssued { count, .. } => assert_eq!(count, 2),
        _ => panic!("unexpected event type"),
    }
}

#[tokio::test]
async fn test_multiple_subscribers() {
    let bus = EventBus::new(16);
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    assert_eq!(bus.subscriber_count(), 2);

    let key = ActorKey::new(1, 2);
    let count = bus.publish(DisciplineEvent::LedgerCleared { key, removed: 3 });
    assert_eq!(count, 2);

    assert_eq!(rx1.recv().await.unwrap().key(), key);
    assert_eq!(rx2.recv().await.unwrap().key(), key);
}

#[test]
fn test_publish_without_subscribers_is_dropped() {
    let bus = EventBus::default();
    let delivered = bus.publish(DisciplineEvent::PointsDeducted {
        key: ActorKey::new(1, 1),
        amount: 2,
        total: 0,
    });
    assert_eq!(delivered, 0);
}

#[test]
fn test_event_serialization() {
    let event = DisciplineEvent::VoteResolved {
        vote_id: Uuid::nil(),
        key: ActorKey::new(7, 8),
        outcome: VoteOutcome::Reprieved,
        yes: 2,
        no: 2,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"vote_resolved\""));
    assert!(json.contains("\"outcome\":\"reprieved\""));
    assert!(json.contains("\"actor_id\":8"));
}
