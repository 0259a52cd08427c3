//! Filter and pagination descriptors for event queries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::event::Event;

/// Query parameters for event retrieval.
///
/// All filters are conjunctive; an empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Match any of these event types (empty = all types).
    pub types: Vec<String>,
    /// Filter by repository full name.
    pub repository: Option<String>,
    /// Filter by sender login.
    pub sender: Option<String>,
    /// Events created at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Events created at or before this time.
    pub until: Option<DateTime<Utc>>,
    /// Only events with no `forwarded_at` stamp.
    pub only_pending: bool,
    /// Maximum number of events to return (`None` or 0 = unbounded).
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything still waiting for delivery, with no time bound.
    pub fn pending() -> Self {
        Self::new().only_pending()
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.types.push(event_type.into());
        self
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn since(mut self, time: DateTime<Utc>) -> Self {
        self.since = Some(time);
        self
    }

    pub fn until(mut self, time: DateTime<Utc>) -> Self {
        self.until = Some(time);
        self
    }

    pub fn only_pending(mut self) -> Self {
        self.only_pending = true;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Effective page size, `None` when unbounded.
    pub fn page_limit(&self) -> Option<u32> {
        self.limit.filter(|limit| *limit > 0)
    }

    /// In-process evaluation of the filters, used by the in-memory store.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.types.is_empty() && !self.types.iter().any(|t| *t == event.event_type) {
            return false;
        }
        if let Some(repository) = &self.repository {
            if event.repository.as_ref() != Some(repository) {
                return false;
            }
        }
        if let Some(sender) = &self.sender {
            if event.sender.as_ref() != Some(sender) {
                return false;
            }
        }
        if self.since.is_some_and(|since| event.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at > until) {
            return false;
        }
        !(self.only_pending && event.forwarded_at.is_some())
    }
}

/// One page of events plus the total number of matches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub total: u64,
}

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    Duplicate,
}

impl StoreOutcome {
    pub const fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}
