use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StorageResult;
use crate::domain::models::{Event, EventPage, EventQuery, StoreOutcome};

/// Repository port for event persistence.
///
/// Every backend implements the same observable behavior; callers never
/// see which one is active.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert the event unless a row with the same id exists.
    ///
    /// Concurrent inserts of one id yield exactly one `Inserted`; the rest
    /// report `Duplicate` and leave the first row untouched.
    async fn store_event(&self, event: &Event) -> StorageResult<StoreOutcome>;

    /// Get an event by id
    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>>;

    /// List matching events, newest first, with the total match count
    async fn list_events(&self, query: &EventQuery) -> StorageResult<EventPage>;

    /// Count events matching the filters (limit/offset ignored)
    async fn count_events(&self, query: &EventQuery) -> StorageResult<u64>;

    /// Per-type event counts, optionally restricted to `created_at >= since`
    async fn get_stats(&self, since: Option<DateTime<Utc>>) -> StorageResult<BTreeMap<String, u64>>;

    /// Stamp `forwarded_at` once; a second call is a no-op.
    ///
    /// Fails with `NotFound` for an unknown id.
    async fn mark_forwarded(&self, id: &str) -> StorageResult<()>;

    /// Record the last delivery error of a still-pending event
    async fn record_error(&self, id: &str, error: &str) -> StorageResult<()>;

    /// Create tables and indexes; safe to call on every startup
    async fn create_schema(&self) -> StorageResult<()>;

    /// Release the backend's resources
    async fn close(&self) -> StorageResult<()>;
}
