// SPDX-License-Identifier: MIT

//! Overtake detector tests against the in-memory store.
//!
//! These seed activities and snapshots directly, then run full detection
//! passes and assert on the notifications and baselines left behind.

mod common;

use common::{local_activity, test_user};
use peloton_board::categories::CategoryConfig;
use peloton_board::db::{MemoryStore, SyncStore};
use peloton_board::models::{DistanceSnapshot, NotificationKind};
use peloton_board::services::OvertakeDetector;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn detector(store: &MemoryStore) -> OvertakeDetector<MemoryStore> {
    OvertakeDetector::with_rng(
        store.clone(),
        CategoryConfig::standard(),
        StdRng::seed_from_u64(42),
    )
}

async fn seed_snapshot(store: &MemoryStore, athlete_id: u64, category: &str, distance: f64) {
    store
        .set_snapshot(&DistanceSnapshot {
            athlete_id,
            category: category.to_string(),
            total_distance_meters: distance,
            updated_at: "2024-03-01T00:00:00Z".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_crossing_emits_one_pair() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    store.insert_user(test_user(2, "Grace", "b"));
    store.insert_activity_record(local_activity(11, 1, "Run", 16_000.0));
    store.insert_activity_record(local_activity(21, 2, "Run", 15_500.0));
    seed_snapshot(&store, 1, "Run", 12_000.0).await;
    seed_snapshot(&store, 2, "Run", 15_000.0).await;

    let emitted = detector(&store).detect().await.unwrap();

    assert_eq!(emitted.len(), 2);
    assert_eq!(store.notification_count(), 2);

    let overtook = emitted
        .iter()
        .find(|n| n.kind == NotificationKind::Overtook)
        .unwrap();
    assert_eq!(overtook.athlete_id, 1);
    assert_eq!(overtook.related_athlete_id, 2);
    assert_eq!(overtook.category, "Run");
    assert!(overtook.message.contains("Grace"));
    assert!(overtook.read_at.is_none());

    let overtaken = emitted
        .iter()
        .find(|n| n.kind == NotificationKind::Overtaken)
        .unwrap();
    assert_eq!(overtaken.athlete_id, 2);
    assert_eq!(overtaken.related_athlete_id, 1);
    assert!(overtaken.message.contains("Ada"));
}

#[tokio::test]
async fn test_tie_produces_no_events_but_updates_baselines() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    store.insert_user(test_user(2, "Grace", "b"));
    store.insert_activity_record(local_activity(11, 1, "Run", 15_000.0));
    store.insert_activity_record(local_activity(21, 2, "Run", 15_000.0));
    seed_snapshot(&store, 1, "Run", 10_000.0).await;
    seed_snapshot(&store, 2, "Run", 14_000.0).await;

    let emitted = detector(&store).detect().await.unwrap();

    assert!(emitted.is_empty());
    assert_eq!(store.notification_count(), 0);
    assert_eq!(store.previous_distance(1, "Run"), 15_000.0);
    assert_eq!(store.previous_distance(2, "Run"), 15_000.0);
}

#[tokio::test]
async fn test_below_threshold_users_never_appear_in_events() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    store.insert_user(test_user(2, "Grace", "b"));
    // Grace's raw delta would qualify, but she is under the 10 km Run floor
    store.insert_activity_record(local_activity(11, 1, "Run", 16_000.0));
    store.insert_activity_record(local_activity(21, 2, "Run", 9_000.0));
    seed_snapshot(&store, 1, "Run", 2_000.0).await;
    seed_snapshot(&store, 2, "Run", 8_000.0).await;

    let emitted = detector(&store).detect().await.unwrap();

    assert!(emitted.is_empty());
    // Her baseline still moves forward
    assert_eq!(store.previous_distance(2, "Run"), 9_000.0);
}

#[tokio::test]
async fn test_snapshot_overwritten_for_every_current_user() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    store.insert_user(test_user(2, "Grace", "b"));
    store.insert_user(test_user(3, "Edith", "c"));
    store.insert_activity_record(local_activity(11, 1, "Run", 16_000.0));
    store.insert_activity_record(local_activity(21, 2, "Run", 15_500.0));
    // Edith has activity but is far below the floor
    store.insert_activity_record(local_activity(31, 3, "Run", 1_200.0));
    seed_snapshot(&store, 1, "Run", 12_000.0).await;
    seed_snapshot(&store, 2, "Run", 15_000.0).await;

    detector(&store).detect().await.unwrap();

    assert_eq!(store.previous_distance(1, "Run"), 16_000.0);
    assert_eq!(store.previous_distance(2, "Run"), 15_500.0);
    assert_eq!(store.previous_distance(3, "Run"), 1_200.0);
}

#[tokio::test]
async fn test_user_without_activities_keeps_stale_snapshot() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    // Ada deleted all her runs; her old snapshot stays untouched because
    // she is absent from the current aggregate.
    seed_snapshot(&store, 1, "Run", 5_000.0).await;

    let emitted = detector(&store).detect().await.unwrap();

    assert!(emitted.is_empty());
    assert_eq!(store.previous_distance(1, "Run"), 5_000.0);
}

#[tokio::test]
async fn test_categories_are_isolated() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    store.insert_user(test_user(2, "Grace", "b"));
    // Crossing in Ride only; Run stays below its floor for both
    store.insert_activity_record(local_activity(11, 1, "GravelRide", 25_000.0));
    store.insert_activity_record(local_activity(21, 2, "Ride", 21_000.0));
    store.insert_activity_record(local_activity(12, 1, "Run", 3_000.0));
    store.insert_activity_record(local_activity(22, 2, "Run", 2_000.0));
    seed_snapshot(&store, 1, "Ride", 20_000.0).await;
    seed_snapshot(&store, 2, "Ride", 20_500.0).await;

    let emitted = detector(&store).detect().await.unwrap();

    assert_eq!(emitted.len(), 2);
    assert!(emitted.iter().all(|n| n.category == "Ride"));
    // Raw type grouping: the gravel ride counted toward Ride
    assert_eq!(store.previous_distance(1, "Ride"), 25_000.0);
    // Run snapshots were still written for both
    assert_eq!(store.previous_distance(1, "Run"), 3_000.0);
    assert_eq!(store.previous_distance(2, "Run"), 2_000.0);
}

#[tokio::test]
async fn test_unmapped_raw_types_do_not_count() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    store.insert_activity_record(local_activity(11, 1, "Run", 9_000.0));
    store.insert_activity_record(local_activity(12, 1, "Yoga", 5_000.0));

    detector(&store).detect().await.unwrap();

    // Yoga does not belong to any category
    assert_eq!(store.previous_distance(1, "Run"), 9_000.0);
    assert!(store.snapshot_for(1, "Yoga").is_none());
}

#[tokio::test]
async fn test_passing_three_users_in_one_cycle() {
    let store = MemoryStore::new();
    for (id, name) in [(1, "Ada"), (2, "Grace"), (3, "Edith"), (4, "Mary")] {
        store.insert_user(test_user(id, name, "t"));
    }
    store.insert_activity_record(local_activity(11, 1, "Run", 40_000.0));
    store.insert_activity_record(local_activity(21, 2, "Run", 30_000.0));
    store.insert_activity_record(local_activity(31, 3, "Run", 25_000.0));
    store.insert_activity_record(local_activity(41, 4, "Run", 20_000.0));
    seed_snapshot(&store, 1, "Run", 10_000.0).await;
    seed_snapshot(&store, 2, "Run", 29_000.0).await;
    seed_snapshot(&store, 3, "Run", 24_000.0).await;
    seed_snapshot(&store, 4, "Run", 19_000.0).await;

    let emitted = detector(&store).detect().await.unwrap();

    // Ada passed three people: three independent pairs
    assert_eq!(emitted.len(), 6);
    let ada_overtooks = store
        .notifications_for(1)
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Overtook)
        .count();
    assert_eq!(ada_overtooks, 3);
    for loser in [2, 3, 4] {
        let overtaken: Vec<_> = store
            .notifications_for(loser)
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Overtaken)
            .collect();
        assert_eq!(overtaken.len(), 1);
        assert_eq!(overtaken[0].related_athlete_id, 1);
    }
}

#[tokio::test]
async fn test_detection_is_stateless_between_passes() {
    let store = MemoryStore::new();
    store.insert_user(test_user(1, "Ada", "a"));
    store.insert_user(test_user(2, "Grace", "b"));
    store.insert_activity_record(local_activity(11, 1, "Run", 16_000.0));
    store.insert_activity_record(local_activity(21, 2, "Run", 15_500.0));
    seed_snapshot(&store, 1, "Run", 12_000.0).await;
    seed_snapshot(&store, 2, "Run", 15_000.0).await;

    let d = detector(&store);
    let first = d.detect().await.unwrap();
    // Second pass without movement: the snapshot was overwritten, so the
    // crossing is reported exactly once.
    let second = d.detect().await.unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(store.notification_count(), 2);
}
