//! Port trait definitions (Hexagonal Architecture)
//!
//! - EventStore: persistence of webhook deliveries, implemented once per backend

pub mod event_store;

pub use event_store::EventStore;
