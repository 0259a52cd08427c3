//! Runs the shared store checks against every backend available without a server.

mod helpers;

use std::sync::Arc;

use helpers::store_suite;
use hubrelay::adapters::sqlite::{create_pool, PoolConfig, SqliteEventRepository};
use hubrelay::domain::models::DatabaseConfig;
use hubrelay::{open_store, EventQuery, EventStore};

macro_rules! store_suite_tests {
    ($backend:ident, $factory:expr) => {
        mod $backend {
            use super::*;

            #[tokio::test]
            async fn duplicate_delivery_is_stored_once() {
                store_suite::duplicate_delivery_is_stored_once($factory.await).await;
            }

            #[tokio::test]
            async fn concurrent_inserts_of_one_id_yield_one_row() {
                store_suite::concurrent_inserts_of_one_id_yield_one_row($factory.await).await;
            }

            #[tokio::test]
            async fn get_unknown_event_is_none() {
                store_suite::get_unknown_event_is_none($factory.await).await;
            }

            #[tokio::test]
            async fn filters_are_conjunctive() {
                store_suite::filters_are_conjunctive($factory.await).await;
            }

            #[tokio::test]
            async fn listing_is_newest_first_with_unpaged_total() {
                store_suite::listing_is_newest_first_with_unpaged_total($factory.await).await;
            }

            #[tokio::test]
            async fn stats_group_by_type_and_respect_since() {
                store_suite::stats_group_by_type_and_respect_since($factory.await).await;
            }

            #[tokio::test]
            async fn forwarded_events_leave_the_pending_set() {
                store_suite::forwarded_events_leave_the_pending_set($factory.await).await;
            }

            #[tokio::test]
            async fn unknown_ids_are_not_found() {
                store_suite::unknown_ids_are_not_found($factory.await).await;
            }

            #[tokio::test]
            async fn replays_link_back_to_their_source() {
                store_suite::replays_link_back_to_their_source($factory.await).await;
            }

            #[tokio::test]
            async fn overlong_fields_are_rejected_whole() {
                store_suite::overlong_fields_are_rejected_whole($factory.await).await;
            }

            #[tokio::test]
            async fn unpaged_total_matches_rows_during_writes() {
                store_suite::unpaged_total_matches_rows_during_writes($factory.await).await;
            }
        }
    };
}

async fn memory() -> Arc<dyn EventStore> {
    helpers::memory_store()
}

store_suite_tests!(memory_backend, memory());
store_suite_tests!(sqlite_backend, helpers::sqlite_store());

#[tokio::test]
async fn test_file_backed_sqlite_handles_concurrent_writers() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("relay.db").display());
    let pool = create_pool(&url, Some(PoolConfig::with_max_connections(8)))
        .await
        .unwrap();
    let store = SqliteEventRepository::new(pool);
    store.create_schema().await.unwrap();

    store_suite::concurrent_inserts_of_one_id_yield_one_row(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_backed_sqlite_listing_is_a_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("relay.db").display());
    let pool = create_pool(&url, Some(PoolConfig::with_max_connections(8)))
        .await
        .unwrap();
    let store = SqliteEventRepository::new(pool);
    store.create_schema().await.unwrap();

    store_suite::unpaged_total_matches_rows_during_writes(Arc::new(store)).await;
}

#[tokio::test]
async fn test_sqlite_events_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        uri: format!("sqlite:{}", dir.path().join("relay.db").display()),
        max_connections: 2,
    };

    let store = open_store(&config).await.unwrap();
    store.store_event(&helpers::event("keep-1", "push")).await.unwrap();
    store.mark_forwarded("keep-1").await.unwrap();
    store.close().await.unwrap();

    let reopened = open_store(&config).await.unwrap();
    let event = reopened.get_event("keep-1").await.unwrap().unwrap();
    assert!(!event.is_pending());
    assert_eq!(
        reopened.count_events(&EventQuery::pending()).await.unwrap(),
        0
    );
    reopened.close().await.unwrap();
}

#[tokio::test]
async fn test_memory_uri_opens_empty_store() {
    let config = DatabaseConfig {
        uri: "memory:".to_string(),
        max_connections: 1,
    };
    let store = open_store(&config).await.unwrap();
    assert!(store.get_stats(None).await.unwrap().is_empty());
}
