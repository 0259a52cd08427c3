//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod store_suite;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue};
use hubrelay::adapters::memory::InMemoryEventRepository;
use hubrelay::adapters::sqlite::create_migrated_test_store;
use hubrelay::domain::models::{DELIVERY_HEADER, EVENT_TYPE_HEADER, SIGNATURE_HEADER};
use hubrelay::services::signature::sign;
use hubrelay::services::RelayMetrics;
use hubrelay::{Event, EventStore};

pub const SECRET: &str = "It's a Secret to Everybody";

/// Fresh, unregistered instruments.
pub fn metrics() -> Arc<RelayMetrics> {
    Arc::new(RelayMetrics::new().expect("failed to create metrics"))
}

pub fn memory_store() -> Arc<dyn EventStore> {
    Arc::new(InMemoryEventRepository::new())
}

pub async fn sqlite_store() -> Arc<dyn EventStore> {
    Arc::new(
        create_migrated_test_store()
            .await
            .expect("failed to create sqlite test store"),
    )
}

/// A pending event carrying the headers a real delivery would have.
pub fn event(id: &str, event_type: &str) -> Event {
    let payload = format!(r#"{{"id":"{id}","repository":{{"full_name":"octo/repo"}}}}"#);
    let headers = format!(
        r#"{{"content-type":["application/json"],"x-github-event":["{event_type}"],"x-github-delivery":["{id}"]}}"#
    );
    Event::received(id, event_type, Some(headers), payload.into_bytes())
        .with_repository(Some("octo/repo".to_string()))
        .with_sender(Some("octocat".to_string()))
}

/// Headers of a correctly signed delivery.
pub fn signed_headers(event_type: &str, delivery_id: &str, body: &[u8]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert(
        EVENT_TYPE_HEADER,
        HeaderValue::from_str(event_type).expect("invalid event type"),
    );
    headers.insert(
        DELIVERY_HEADER,
        HeaderValue::from_str(delivery_id).expect("invalid delivery id"),
    );
    headers.insert(
        SIGNATURE_HEADER,
        HeaderValue::from_str(&sign(body, SECRET.as_bytes()).expect("signing failed"))
            .expect("invalid signature"),
    );
    headers
}

/// Initialize tracing output for tests that need it.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
