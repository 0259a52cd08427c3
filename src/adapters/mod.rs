//! Adapters for external systems: one event store per backend, plus the HTTP listeners.

pub mod factory;
pub mod http;
pub mod memory;
pub mod mysql;
pub mod postgres;
pub mod sql;
pub mod sqlite;
