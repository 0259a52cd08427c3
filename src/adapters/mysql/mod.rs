//! MySQL event store adapter.

pub mod event_repository;

pub use event_repository::MySqlEventRepository;

use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Executor, MySqlPool};
use std::time::Duration;

use crate::domain::errors::{StorageError, StorageResult};

/// Session mode that turns silent truncation into an error.
const STRICT_MODE: &str =
    "SET SESSION sql_mode = CONCAT_WS(',', NULLIF(@@SESSION.sql_mode, ''), 'STRICT_ALL_TABLES')";

/// Connect to a MySQL server. Every connection runs in strict mode.
pub async fn create_pool(database_url: &str, max_connections: u32) -> StorageResult<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute(STRICT_MODE).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))
}
