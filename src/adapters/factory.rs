//! Opens an [`EventStore`] from a database URI.

use std::sync::Arc;

use tracing::info;

use crate::adapters::memory::InMemoryEventRepository;
use crate::adapters::mysql::{self, MySqlEventRepository};
use crate::adapters::postgres::{self, PostgresEventRepository};
use crate::adapters::sqlite::{self, PoolConfig, SqliteEventRepository};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::DatabaseConfig;
use crate::domain::ports::EventStore;

/// Backend named by a database URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
    MySql,
    Memory,
}

impl Backend {
    pub fn from_uri(uri: &str) -> StorageResult<Self> {
        let scheme = uri.split_once(':').map(|(scheme, _)| scheme);
        match scheme {
            Some("sqlite") => Ok(Self::Sqlite),
            Some("postgres" | "postgresql") => Ok(Self::Postgres),
            Some("mysql") => Ok(Self::MySql),
            Some("memory") => Ok(Self::Memory),
            _ => Err(StorageError::InvalidUri(uri.to_string())),
        }
    }
}

/// Connect to the store named by `config.uri` and make sure the schema exists.
pub async fn open_store(config: &DatabaseConfig) -> StorageResult<Arc<dyn EventStore>> {
    let backend = Backend::from_uri(&config.uri)?;
    let store: Arc<dyn EventStore> = match backend {
        Backend::Sqlite => {
            let pool = sqlite::create_pool(
                &config.uri,
                Some(PoolConfig::with_max_connections(config.max_connections)),
            )
            .await?;
            Arc::new(SqliteEventRepository::new(pool))
        }
        Backend::Postgres => {
            let pool = postgres::create_pool(&config.uri, config.max_connections).await?;
            Arc::new(PostgresEventRepository::new(pool))
        }
        Backend::MySql => {
            let pool = mysql::create_pool(&config.uri, config.max_connections).await?;
            Arc::new(MySqlEventRepository::new(pool))
        }
        Backend::Memory => Arc::new(InMemoryEventRepository::new()),
    };

    store.create_schema().await?;
    info!(backend = ?backend, "event store ready");
    Ok(store)
}
