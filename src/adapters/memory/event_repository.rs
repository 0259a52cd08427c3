//! In-memory implementation of the EventStore trait.
//!
//! Nothing survives a restart. Useful for tests and for running the relay
//! without a database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::{Event, EventPage, EventQuery, StoreOutcome};
use crate::domain::ports::EventStore;

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: RwLock<HashMap<String, Event>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, query: &EventQuery) -> Vec<Event> {
        let events = self.events.read();
        let mut found: Vec<Event> = events.values().filter(|e| query.matches(e)).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        found
    }
}

#[async_trait]
impl EventStore for InMemoryEventRepository {
    async fn store_event(&self, event: &Event) -> StorageResult<StoreOutcome> {
        event.check_storable()?;
        let mut events = self.events.write();
        if events.contains_key(&event.id) {
            return Ok(StoreOutcome::Duplicate);
        }
        events.insert(event.id.clone(), event.clone());
        Ok(StoreOutcome::Inserted)
    }

    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>> {
        Ok(self.events.read().get(id).cloned())
    }

    async fn list_events(&self, query: &EventQuery) -> StorageResult<EventPage> {
        let found = self.matching(query);
        let total = found.len() as u64;
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.page_limit().map_or(usize::MAX, |l| l as usize);

        Ok(EventPage {
            events: found.into_iter().skip(offset).take(limit).collect(),
            total,
        })
    }

    async fn count_events(&self, query: &EventQuery) -> StorageResult<u64> {
        let events = self.events.read();
        Ok(events.values().filter(|e| query.matches(e)).count() as u64)
    }

    async fn get_stats(&self, since: Option<DateTime<Utc>>) -> StorageResult<BTreeMap<String, u64>> {
        let events = self.events.read();
        let mut stats = BTreeMap::new();
        for event in events.values() {
            if since.is_some_and(|since| event.created_at < since) {
                continue;
            }
            *stats.entry(event.event_type.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn mark_forwarded(&self, id: &str) -> StorageResult<()> {
        let mut events = self.events.write();
        let event = events
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        if event.forwarded_at.is_none() {
            event.forwarded_at = Some(Utc::now());
            event.error = None;
        }
        Ok(())
    }

    async fn record_error(&self, id: &str, error: &str) -> StorageResult<()> {
        let mut events = self.events.write();
        let event = events
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        if event.forwarded_at.is_none() {
            event.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn create_schema(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
