//! PostgreSQL event store adapter.

pub mod event_repository;

pub use event_repository::PostgresEventRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::domain::errors::{StorageError, StorageResult};

/// Connect to a PostgreSQL server.
pub async fn create_pool(database_url: &str, max_connections: u32) -> StorageResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))
}
