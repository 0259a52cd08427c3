//! Prometheus instruments shared by the relay components.
//!
//! Built once, registered into an explicit registry and handed to each
//! component as `Arc<RelayMetrics>`. Tests use a private registry per case.

use prometheus::{Encoder, IntCounter, IntGaugeVec, Opts, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct RelayMetrics {
    pub blocked_origins_total: IntCounter,
    pub signature_errors_total: IntCounter,
    pub stored_events_total: IntCounter,
    pub duplicate_events_total: IntCounter,
    pub forwarded_events_total: IntCounter,
    pub forwarding_errors_total: IntCounter,
    pub replayed_events_total: IntCounter,
    pub db_events_count: IntGaugeVec,
}

impl RelayMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            blocked_origins_total: IntCounter::new(
                "hubrelay_webhook_blocked_origins_total",
                "Deliveries rejected because the sender address is outside the allowlist",
            )?,
            signature_errors_total: IntCounter::new(
                "hubrelay_webhook_signature_errors_total",
                "Deliveries rejected for a missing or mismatched signature",
            )?,
            stored_events_total: IntCounter::new(
                "hubrelay_webhook_stored_events_total",
                "Deliveries newly written to the event store",
            )?,
            duplicate_events_total: IntCounter::new(
                "hubrelay_webhook_duplicate_events_total",
                "Deliveries ignored because their id was already stored",
            )?,
            forwarded_events_total: IntCounter::new(
                "hubrelay_forwarded_events_total",
                "Events successfully delivered to the target",
            )?,
            forwarding_errors_total: IntCounter::new(
                "hubrelay_forwarding_errors_total",
                "Failed delivery attempts to the target",
            )?,
            replayed_events_total: IntCounter::new(
                "hubrelay_replayed_events_total",
                "Replay events created",
            )?,
            db_events_count: IntGaugeVec::new(
                Opts::new("hubrelay_db_events_count", "Stored events by type"),
                &["type"],
            )?,
        })
    }

    pub fn register(&self, reg: &Registry) -> prometheus::Result<()> {
        reg.register(Box::new(self.blocked_origins_total.clone()))?;
        reg.register(Box::new(self.signature_errors_total.clone()))?;
        reg.register(Box::new(self.stored_events_total.clone()))?;
        reg.register(Box::new(self.duplicate_events_total.clone()))?;
        reg.register(Box::new(self.forwarded_events_total.clone()))?;
        reg.register(Box::new(self.forwarding_errors_total.clone()))?;
        reg.register(Box::new(self.replayed_events_total.clone()))?;
        reg.register(Box::new(self.db_events_count.clone()))?;

        Ok(())
    }

    /// Fresh instruments in their own registry.
    pub fn registered() -> prometheus::Result<(Self, Registry)> {
        let registry = Registry::new();
        let metrics = Self::new()?;
        metrics.register(&registry)?;
        Ok((metrics, registry))
    }
}

/// Render a registry in the Prometheus text exposition format.
pub fn render(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
