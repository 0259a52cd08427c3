//! Hubrelay - durable webhook relay
//!
//! Hubrelay receives signed webhook deliveries, records each one exactly once,
//! forwards pending events to a downstream target and replays history on demand.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): the `Event` model, query descriptors and the `EventStore` port
//! - **Adapters** (`adapters`): SQLite, PostgreSQL, MySQL and in-memory stores; HTTP listeners
//! - **Service Layer** (`services`): ingestion, forwarding, replay, statistics, allowlist
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::factory::open_store;
pub use domain::models::{Config, Event, EventPage, EventQuery, HeaderSet, StoreOutcome};
pub use domain::ports::EventStore;
pub use domain::{StorageError, StorageResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
