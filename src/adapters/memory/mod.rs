//! In-process event store.

pub mod event_repository;

pub use event_repository::InMemoryEventRepository;
