//! Per-type event counts, recomputed on demand.
//!
//! Wakes coalesce through a [`CoalescedSignal`], so a burst of ingested events
//! costs one aggregation query.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::domain::errors::StorageResult;
use crate::domain::ports::EventStore;
use crate::services::metrics::RelayMetrics;
use crate::services::signal::{CoalescedSignal, SignalReceiver};

pub struct StatsCollector {
    store: Arc<dyn EventStore>,
    metrics: Arc<RelayMetrics>,
    window: Option<Duration>,
    latest: RwLock<BTreeMap<String, u64>>,
}

impl StatsCollector {
    pub fn new(store: Arc<dyn EventStore>, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            store,
            metrics,
            window: None,
            latest: RwLock::new(BTreeMap::new()),
        }
    }

    /// Only count events created within `window` of now.
    #[must_use]
    pub const fn with_window(mut self, window: Option<Duration>) -> Self {
        self.window = window;
        self
    }

    /// Recompute the counts and publish them.
    pub async fn collect(&self) -> StorageResult<BTreeMap<String, u64>> {
        let stats = self.store.get_stats(self.window_start()).await?;

        self.metrics.db_events_count.reset();
        for (event_type, count) in &stats {
            self.metrics
                .db_events_count
                .with_label_values(&[event_type.as_str()])
                .set(i64::try_from(*count).unwrap_or(i64::MAX));
        }
        *self.latest.write() = stats.clone();
        debug!(types = stats.len(), "event stats collected");
        Ok(stats)
    }

    /// Oldest creation time counted, or `None` to count everything.
    fn window_start(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let window = self.window?;
        let start = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| chrono::Utc::now().checked_sub_signed(w));
        if start.is_none() {
            warn!(window = ?window, "stats window out of range, counting all events");
        }
        start
    }

    /// Counts from the last successful collection.
    pub fn latest(&self) -> BTreeMap<String, u64> {
        self.latest.read().clone()
    }

    /// Collect on each wake until cancelled. Queues one run immediately.
    pub fn start(
        self: Arc<Self>,
        signal: &CoalescedSignal,
        receiver: SignalReceiver,
        interval: Option<Duration>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        if let Some(period) = interval {
            debug!(interval = ?period, "starting periodic stats collection");
            signal.spawn_interval(period, cancel.clone());
        }
        signal.notify();

        tokio::spawn(async move {
            receiver
                .run(cancel, || {
                    let collector = Arc::clone(&self);
                    async move {
                        if let Err(e) = collector.collect().await {
                            error!(error = %e, "failed to collect event stats");
                        }
                    }
                })
                .await;
            debug!("stats collector stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryEventRepository;
    use crate::domain::models::Event;

    #[tokio::test]
    async fn test_collect_publishes_gauge_and_snapshot() {
        let store = Arc::new(InMemoryEventRepository::new());
        for (id, event_type) in [("a", "push"), ("b", "push"), ("c", "pull_request")] {
            store
                .store_event(&Event::received(id, event_type, None, Vec::new()))
                .await
                .unwrap();
        }
        let metrics = Arc::new(RelayMetrics::new().unwrap());
        let collector = StatsCollector::new(store, metrics.clone());

        let stats = collector.collect().await.unwrap();
        assert_eq!(stats.get("push"), Some(&2));
        assert_eq!(stats.get("pull_request"), Some(&1));
        assert_eq!(collector.latest(), stats);
        assert_eq!(metrics.db_events_count.with_label_values(&["push"]).get(), 2);
    }

    #[tokio::test]
    async fn test_window_excludes_old_events() {
        let store = Arc::new(InMemoryEventRepository::new());
        let old = Event::received("old", "push", None, Vec::new())
            .with_created_at(chrono::Utc::now() - chrono::Duration::days(2));
        store.store_event(&old).await.unwrap();
        store
            .store_event(&Event::received("new", "issues", None, Vec::new()))
            .await
            .unwrap();

        let collector = StatsCollector::new(store, Arc::new(RelayMetrics::new().unwrap()))
            .with_window(Some(Duration::from_secs(86_400)));
        let stats = collector.collect().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.get("issues"), Some(&1));
    }

    #[tokio::test]
    async fn test_oversized_window_counts_everything() {
        let store = Arc::new(InMemoryEventRepository::new());
        let old = Event::received("old", "push", None, Vec::new())
            .with_created_at(chrono::Utc::now() - chrono::Duration::days(3650));
        store.store_event(&old).await.unwrap();

        for window in [Duration::from_secs(u64::MAX), Duration::from_secs(1 << 50)] {
            let collector = StatsCollector::new(store.clone(), Arc::new(RelayMetrics::new().unwrap()))
                .with_window(Some(window));
            let stats = collector.collect().await.unwrap();
            assert_eq!(stats.get("push"), Some(&1));
        }
    }
}
