//! Redelivery of stored events to the downstream target.
//!
//! A sweep lists every event without a `forwarded_at` stamp and tries each
//! once. Failures stay pending and are picked up by the next sweep; there is
//! no retry cap and no backoff.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::errors::StorageResult;
use crate::domain::models::{
    Event, EventQuery, HeaderSet, DELIVERY_HEADER, EVENT_TYPE_HEADER, SIGNATURE_HEADER,
};
use crate::domain::ports::EventStore;
use crate::services::delivery::{ForwardError, ForwardTarget};
use crate::services::metrics::RelayMetrics;
use crate::services::signal::{CoalescedSignal, SignalReceiver};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub forwarded: usize,
    pub failed: usize,
}

pub struct Forwarder {
    store: Arc<dyn EventStore>,
    target: ForwardTarget,
    timeout: Duration,
    metrics: Arc<RelayMetrics>,
    stats_signal: Option<CoalescedSignal>,
}

impl Forwarder {
    pub fn new(
        store: Arc<dyn EventStore>,
        target: ForwardTarget,
        timeout: Duration,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            store,
            target,
            timeout,
            metrics,
            stats_signal: None,
        }
    }

    #[must_use]
    pub fn with_stats_signal(mut self, signal: CoalescedSignal) -> Self {
        self.stats_signal = Some(signal);
        self
    }

    pub const fn target(&self) -> &ForwardTarget {
        &self.target
    }

    /// Try every pending event once, oldest first.
    pub async fn sweep(&self) -> StorageResult<SweepReport> {
        let page = self.store.list_events(&EventQuery::pending()).await?;
        let mut report = SweepReport::default();

        if page.events.is_empty() {
            debug!("no events to forward");
            return Ok(report);
        }
        info!(count = page.events.len(), target = %self.target.describe(), "forwarding pending events");

        for event in page.events.iter().rev() {
            match self.forward_event(event).await {
                Ok(()) => report.forwarded += 1,
                Err(e) => {
                    report.failed += 1;
                    self.metrics.forwarding_errors_total.inc();
                    warn!(event_id = %event.id, error = %e, "forwarding failed, will retry on next sweep");
                    if let Err(store_err) = self.store.record_error(&event.id, &e.to_string()).await {
                        error!(event_id = %event.id, error = %store_err, "failed to record forwarding error");
                    }
                }
            }
        }

        if let Some(signal) = &self.stats_signal {
            signal.notify();
        }
        Ok(report)
    }

    /// Deliver one event and stamp it forwarded.
    pub async fn forward_event(&self, event: &Event) -> Result<(), ForwardError> {
        let headers = outbound_headers(event);
        let status = self
            .target
            .send(headers, Bytes::from(event.payload.clone()), self.timeout)
            .await?;

        self.metrics.forwarded_events_total.inc();
        debug!(event_id = %event.id, status = %status, "event forwarded");

        // Delivered already; a failed stamp only means a later resend.
        if let Err(e) = self.store.mark_forwarded(&event.id).await {
            error!(event_id = %event.id, error = %e, "failed to mark event forwarded");
        }
        Ok(())
    }

    /// Run sweeps on each wake until cancelled. Queues one sweep immediately.
    pub fn start(
        self: Arc<Self>,
        signal: &CoalescedSignal,
        receiver: SignalReceiver,
        interval: Option<Duration>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        if let Some(period) = interval {
            debug!(interval = ?period, "starting periodic forward sweeps");
            signal.spawn_interval(period, cancel.clone());
        }
        signal.notify();

        tokio::spawn(async move {
            receiver
                .run(cancel, || {
                    let forwarder = Arc::clone(&self);
                    async move {
                        if let Err(e) = forwarder.sweep().await {
                            error!(error = %e, "failed to list pending events");
                        }
                    }
                })
                .await;
            debug!("forwarder stopped");
        })
    }
}

fn outbound_headers(event: &Event) -> HeaderMap {
    let mut headers = match event.headers.as_deref().map(HeaderSet::from_json) {
        Some(Ok(set)) => set.to_forward_headers(),
        Some(Err(e)) => {
            warn!(event_id = %event.id, error = %e, "stored headers unreadable, forwarding payload without them");
            HeaderMap::new()
        }
        None => {
            warn!(event_id = %event.id, "event has no stored headers");
            HeaderMap::new()
        }
    };

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        warn!(event_id = %event.id, "content-type is not application/json");
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
    }
    for name in [EVENT_TYPE_HEADER, DELIVERY_HEADER, SIGNATURE_HEADER] {
        if !headers.contains_key(name) {
            warn!(event_id = %event.id, header = name, "header missing from forwarded request");
        }
    }
    headers
}
