//! Domain layer for hubrelay
//!
//! Core models, the storage port, and storage errors.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{StorageError, StorageResult};
