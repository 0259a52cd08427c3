//! SQLite event store adapter.

pub mod connection;
pub mod event_repository;

pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use event_repository::SqliteEventRepository;

use crate::domain::errors::StorageResult;
use crate::domain::ports::EventStore;

/// Create an in-memory store with the schema applied.
pub async fn create_migrated_test_store() -> StorageResult<SqliteEventRepository> {
    let pool = create_test_pool().await?;
    let store = SqliteEventRepository::new(pool);
    store.create_schema().await?;
    Ok(store)
}
