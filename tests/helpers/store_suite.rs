//! Behaviour every `EventStore` backend must share.
//!
//! Each check takes a fresh, empty store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use hubrelay::domain::models::{MAX_ID_LEN, MAX_NAME_LEN};
use hubrelay::{EventQuery, EventStore, StorageError, StoreOutcome};

use super::event;

pub async fn duplicate_delivery_is_stored_once(store: Arc<dyn EventStore>) {
    let first = event("dup-1", "push");
    assert_eq!(store.store_event(&first).await.unwrap(), StoreOutcome::Inserted);

    let mut second = event("dup-1", "issues");
    second.payload = b"different".to_vec();
    assert_eq!(store.store_event(&second).await.unwrap(), StoreOutcome::Duplicate);

    let stored = store.get_event("dup-1").await.unwrap().unwrap();
    assert_eq!(stored.event_type, "push");
    assert_eq!(stored.payload, first.payload);
    assert_eq!(store.count_events(&EventQuery::new()).await.unwrap(), 1);
}

pub async fn concurrent_inserts_of_one_id_yield_one_row(store: Arc<dyn EventStore>) {
    let attempts = (0..16).map(|_| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.store_event(&event("race-1", "push")).await })
    });

    let outcomes: Vec<StoreOutcome> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let inserted = outcomes.iter().filter(|o| o.is_inserted()).count();
    assert_eq!(inserted, 1);
    assert_eq!(store.count_events(&EventQuery::new()).await.unwrap(), 1);
}

pub async fn get_unknown_event_is_none(store: Arc<dyn EventStore>) {
    assert!(store.get_event("nope").await.unwrap().is_none());
}

pub async fn filters_are_conjunctive(store: Arc<dyn EventStore>) {
    let base = Utc::now() - Duration::hours(1);
    let fixtures = [
        ("f-1", "push", "octo/repo", "alice", 0),
        ("f-2", "issues", "octo/repo", "bob", 1),
        ("f-3", "push", "octo/other", "alice", 2),
        ("f-4", "pull_request", "octo/repo", "alice", 3),
    ];
    for (id, event_type, repository, sender, minutes) in fixtures {
        let e = event(id, event_type)
            .with_repository(Some(repository.to_string()))
            .with_sender(Some(sender.to_string()))
            .with_created_at(base + Duration::minutes(minutes));
        store.store_event(&e).await.unwrap();
    }

    let ids = |page: hubrelay::EventPage| -> Vec<String> {
        page.events.into_iter().map(|e| e.id).collect()
    };

    let page = store
        .list_events(&EventQuery::new().event_type("push"))
        .await
        .unwrap();
    assert_eq!(ids(page), vec!["f-3", "f-1"]);

    let page = store
        .list_events(&EventQuery::new().types(["push", "issues"]).repository("octo/repo"))
        .await
        .unwrap();
    assert_eq!(ids(page), vec!["f-2", "f-1"]);

    let page = store
        .list_events(&EventQuery::new().sender("alice").repository("octo/repo"))
        .await
        .unwrap();
    assert_eq!(ids(page), vec!["f-4", "f-1"]);

    let page = store
        .list_events(
            &EventQuery::new()
                .since(base + Duration::minutes(1))
                .until(base + Duration::minutes(2)),
        )
        .await
        .unwrap();
    assert_eq!(ids(page), vec!["f-3", "f-2"]);
}

pub async fn listing_is_newest_first_with_unpaged_total(store: Arc<dyn EventStore>) {
    let base = Utc::now() - Duration::hours(1);
    for i in 0..7 {
        let e = event(&format!("page-{i}"), "push").with_created_at(base + Duration::seconds(i));
        store.store_event(&e).await.unwrap();
    }

    let page = store
        .list_events(&EventQuery::new().limit(3))
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    let ids: Vec<_> = page.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["page-6", "page-5", "page-4"]);

    let page = store
        .list_events(&EventQuery::new().limit(3).offset(6))
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].id, "page-0");

    let page = store
        .list_events(&EventQuery::new().offset(5))
        .await
        .unwrap();
    assert_eq!(page.events.len(), 2);
}

pub async fn stats_group_by_type_and_respect_since(store: Arc<dyn EventStore>) {
    let now = Utc::now();
    store
        .store_event(&event("s-1", "push").with_created_at(now - Duration::days(2)))
        .await
        .unwrap();
    store
        .store_event(&event("s-2", "push").with_created_at(now - Duration::minutes(5)))
        .await
        .unwrap();
    store
        .store_event(&event("s-3", "issues").with_created_at(now - Duration::minutes(1)))
        .await
        .unwrap();

    let all = store.get_stats(None).await.unwrap();
    assert_eq!(all.get("push"), Some(&2));
    assert_eq!(all.get("issues"), Some(&1));

    let recent = store
        .get_stats(Some(now - Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(recent.get("push"), Some(&1));
    assert_eq!(recent.get("issues"), Some(&1));

    let none = store.get_stats(Some(now + Duration::hours(1))).await.unwrap();
    assert!(none.is_empty());
}

pub async fn forwarded_events_leave_the_pending_set(store: Arc<dyn EventStore>) {
    store.store_event(&event("p-1", "push")).await.unwrap();
    store.store_event(&event("p-2", "push")).await.unwrap();

    store.record_error("p-1", "target returned error: 500").await.unwrap();
    let failed = store.get_event("p-1").await.unwrap().unwrap();
    assert!(failed.is_pending());
    assert_eq!(failed.error.as_deref(), Some("target returned error: 500"));

    store.mark_forwarded("p-1").await.unwrap();
    let forwarded = store.get_event("p-1").await.unwrap().unwrap();
    let stamp = forwarded.forwarded_at.expect("forwarded_at must be set");
    assert!(forwarded.error.is_none());

    // A second stamp and a late error leave the row alone.
    store.mark_forwarded("p-1").await.unwrap();
    store.record_error("p-1", "late failure").await.unwrap();
    let again = store.get_event("p-1").await.unwrap().unwrap();
    assert_eq!(again.forwarded_at, Some(stamp));
    assert!(again.error.is_none());

    let pending = store.list_events(&EventQuery::pending()).await.unwrap();
    let ids: Vec<_> = pending.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["p-2"]);
}

pub async fn unknown_ids_are_not_found(store: Arc<dyn EventStore>) {
    assert!(store.mark_forwarded("ghost").await.unwrap_err().is_not_found());
    assert!(store.record_error("ghost", "boom").await.unwrap_err().is_not_found());
}

pub async fn replays_link_back_to_their_source(store: Arc<dyn EventStore>) {
    let original = event("r-1", "push");
    store.store_event(&original).await.unwrap();

    let replay = original.replay();
    assert_eq!(store.store_event(&replay).await.unwrap(), StoreOutcome::Inserted);

    let loaded = store.get_event(&replay.id).await.unwrap().unwrap();
    assert_eq!(loaded.replayed_from.as_deref(), Some("r-1"));
    assert!(loaded.original_time.is_some());
    assert_eq!(loaded.headers, original.headers);
    assert_eq!(loaded.payload, original.payload);
}

pub async fn overlong_fields_are_rejected_whole(store: Arc<dyn EventStore>) {
    let widest = event(&"i".repeat(MAX_ID_LEN), &"t".repeat(MAX_NAME_LEN))
        .with_repository(Some("r".repeat(MAX_NAME_LEN)));
    assert_eq!(store.store_event(&widest).await.unwrap(), StoreOutcome::Inserted);
    let stored = store.get_event(&widest.id).await.unwrap().unwrap();
    assert_eq!(stored.event_type.len(), MAX_NAME_LEN);
    assert_eq!(stored.repository, widest.repository);

    let long_id = "i".repeat(MAX_ID_LEN + 1);
    let err = store.store_event(&event(&long_id, "push")).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidEvent(_)), "unexpected error: {err:?}");
    // The truncated prefix must not have been stored either.
    assert!(store.get_event(&long_id[..MAX_ID_LEN]).await.unwrap().is_none());

    let long_sender = event("sender-1", "push").with_sender(Some("s".repeat(MAX_NAME_LEN + 1)));
    assert!(matches!(
        store.store_event(&long_sender).await,
        Err(StorageError::InvalidEvent(_))
    ));
    assert!(store.get_event("sender-1").await.unwrap().is_none());

    let replay_of_widest = widest.replay();
    assert!(matches!(
        store.store_event(&replay_of_widest).await,
        Err(StorageError::InvalidEvent(_))
    ));
    assert_eq!(store.count_events(&EventQuery::new()).await.unwrap(), 1);
}

pub async fn unpaged_total_matches_rows_during_writes(store: Arc<dyn EventStore>) {
    const WRITES: usize = 200;
    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..WRITES {
                store.store_event(&event(&format!("w-{i}"), "push")).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    while !writer.is_finished() {
        let page = store.list_events(&EventQuery::new()).await.unwrap();
        assert_eq!(page.events.len() as u64, page.total);
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    let page = store.list_events(&EventQuery::new()).await.unwrap();
    assert_eq!(page.total, WRITES as u64);
    assert_eq!(page.events.len(), WRITES);
}
