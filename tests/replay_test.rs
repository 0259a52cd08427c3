mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use hubrelay::services::{ReplayError, ReplayRange, ReplayService};
use hubrelay::{EventQuery, EventStore};

const DEFAULT_LIMIT: u32 = 100;

async fn seeded_store(count: i64) -> Arc<dyn EventStore> {
    let store = helpers::sqlite_store().await;
    let base = Utc::now() - Duration::hours(2);
    for i in 0..count {
        let event_type = if i % 2 == 0 { "push" } else { "issues" };
        let event = helpers::event(&format!("evt-{i:03}"), event_type)
            .with_created_at(base + Duration::seconds(i));
        store.store_event(&event).await.unwrap();
    }
    store
}

fn whole_history() -> ReplayRange {
    ReplayRange::new(Utc::now() - Duration::days(1), Utc::now())
}

#[tokio::test]
async fn test_range_replay_is_capped_by_default_limit() {
    let store = seeded_store(150).await;
    let metrics = helpers::metrics();
    let replay = ReplayService::new(Arc::clone(&store), DEFAULT_LIMIT, Arc::clone(&metrics));

    let replays = replay.replay_range(&whole_history()).await.unwrap();
    assert_eq!(replays.len(), 100);
    assert_eq!(metrics.replayed_events_total.get(), 100);

    // Newest originals are taken first.
    assert_eq!(replays[0].replayed_from.as_deref(), Some("evt-149"));
    assert_eq!(replays[99].replayed_from.as_deref(), Some("evt-050"));

    assert_eq!(store.count_events(&EventQuery::new()).await.unwrap(), 250);
    assert_eq!(store.count_events(&EventQuery::pending()).await.unwrap(), 250);
}

#[tokio::test]
async fn test_range_replay_with_explicit_limit_and_type_filter() {
    let store = seeded_store(20).await;
    let replay = ReplayService::new(Arc::clone(&store), DEFAULT_LIMIT, helpers::metrics());

    let mut range = whole_history().limit(3);
    range.types = vec!["issues".to_string()];

    let replays = replay.replay_range(&range).await.unwrap();
    assert_eq!(replays.len(), 3);
    assert!(replays.iter().all(|e| e.event_type == "issues"));
    assert!(replays.iter().all(|e| e.id.contains("-replay-")));
}

#[tokio::test]
async fn test_replays_are_never_deduplicated() {
    let store = seeded_store(1).await;
    let replay = ReplayService::new(Arc::clone(&store), DEFAULT_LIMIT, helpers::metrics());

    let first = replay.replay_event("evt-000").await.unwrap();
    let second = replay.replay_event("evt-000").await.unwrap();
    assert_ne!(first.id, second.id);

    let stored = store.get_event(&second.id).await.unwrap().unwrap();
    assert_eq!(stored.replayed_from.as_deref(), Some("evt-000"));
    assert!(stored.is_pending());
    assert_eq!(store.count_events(&EventQuery::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_replay_unknown_event_is_not_found() {
    let store = seeded_store(0).await;
    let replay = ReplayService::new(store, DEFAULT_LIMIT, helpers::metrics());

    let err = replay.replay_event("missing").await.unwrap_err();
    assert!(matches!(err, ReplayError::NotFound(id) if id == "missing"));
}

#[tokio::test]
async fn test_empty_range_has_nothing_to_replay() {
    let store = seeded_store(5).await;
    let replay = ReplayService::new(store, DEFAULT_LIMIT, helpers::metrics());

    let future = ReplayRange::new(Utc::now() + Duration::hours(1), Utc::now() + Duration::hours(2));
    let err = replay.replay_range(&future).await.unwrap_err();
    assert!(matches!(err, ReplayError::NothingToReplay));
}

#[tokio::test]
async fn test_invalid_ranges_are_rejected() {
    let store = seeded_store(5).await;
    let replay = ReplayService::new(store, DEFAULT_LIMIT, helpers::metrics());

    let err = replay.replay_range(&whole_history().limit(0)).await.unwrap_err();
    assert!(matches!(err, ReplayError::InvalidLimit));

    let backwards = ReplayRange::new(Utc::now(), Utc::now() - Duration::hours(1));
    let err = replay.replay_range(&backwards).await.unwrap_err();
    assert!(matches!(err, ReplayError::InvalidRange));
}
