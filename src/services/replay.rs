//! Creation of replay events from stored history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::domain::errors::StorageError;
use crate::domain::models::{Event, EventQuery, StoreOutcome};
use crate::domain::ports::EventStore;
use crate::services::metrics::RelayMetrics;
use crate::services::signal::CoalescedSignal;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("event not found: {0}")]
    NotFound(String),

    #[error("no events to replay")]
    NothingToReplay,

    #[error("limit must be positive")]
    InvalidLimit,

    #[error("since must not be after until")]
    InvalidRange,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Selection for a range replay. `since` and `until` are inclusive.
#[derive(Debug, Clone)]
pub struct ReplayRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub types: Vec<String>,
    pub repository: Option<String>,
    pub sender: Option<String>,
    /// Per-call cap; the configured default applies when `None`.
    pub limit: Option<u32>,
}

impl ReplayRange {
    pub const fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since,
            until,
            types: Vec::new(),
            repository: None,
            sender: None,
            limit: None,
        }
    }

    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub struct ReplayService {
    store: Arc<dyn EventStore>,
    default_limit: u32,
    metrics: Arc<RelayMetrics>,
    forward_signal: Option<CoalescedSignal>,
}

impl ReplayService {
    pub fn new(store: Arc<dyn EventStore>, default_limit: u32, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            store,
            default_limit,
            metrics,
            forward_signal: None,
        }
    }

    #[must_use]
    pub fn with_forward_signal(mut self, signal: CoalescedSignal) -> Self {
        self.forward_signal = Some(signal);
        self
    }

    /// Copy one event into a new pending replay.
    pub async fn replay_event(&self, id: &str) -> Result<Event, ReplayError> {
        let original = self
            .store
            .get_event(id)
            .await?
            .ok_or_else(|| ReplayError::NotFound(id.to_string()))?;

        let replay = self.store_replay(&original).await?;
        self.wake_forwarder();
        Ok(replay)
    }

    /// Replay up to the limit of the events matching `range`, newest first.
    ///
    /// A replay that fails to store is logged and skipped.
    pub async fn replay_range(&self, range: &ReplayRange) -> Result<Vec<Event>, ReplayError> {
        let limit = range.limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(ReplayError::InvalidLimit);
        }
        if range.since > range.until {
            return Err(ReplayError::InvalidRange);
        }

        let mut query = EventQuery::new()
            .since(range.since)
            .until(range.until)
            .types(range.types.iter().cloned())
            .limit(limit);
        query.repository.clone_from(&range.repository);
        query.sender.clone_from(&range.sender);

        let page = self.store.list_events(&query).await?;
        if page.events.is_empty() {
            return Err(ReplayError::NothingToReplay);
        }

        let mut replays = Vec::with_capacity(page.events.len());
        for original in &page.events {
            match self.store_replay(original).await {
                Ok(replay) => replays.push(replay),
                Err(e) => error!(event_id = %original.id, error = %e, "failed to store replay"),
            }
        }

        info!(count = replays.len(), matched = page.total, "range replay complete");
        if !replays.is_empty() {
            self.wake_forwarder();
        }
        Ok(replays)
    }

    async fn store_replay(&self, original: &Event) -> Result<Event, ReplayError> {
        let replay = original.replay();
        // Fresh uuid suffix, so a duplicate here would be a storage bug.
        if self.store.store_event(&replay).await? == StoreOutcome::Duplicate {
            error!(event_id = %replay.id, "replay id already existed");
        }
        self.metrics.replayed_events_total.inc();
        info!(event_id = %replay.id, replayed_from = %original.id, "event replayed");
        Ok(replay)
    }

    fn wake_forwarder(&self) {
        if let Some(signal) = &self.forward_signal {
            signal.notify();
        }
    }
}
