//! Validation and persistence of inbound webhook deliveries.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::models::{
    Event, HeaderSet, StoreOutcome, DELIVERY_HEADER, EVENT_TYPE_HEADER, SIGNATURE_HEADER,
};
use crate::domain::ports::EventStore;
use crate::services::metrics::RelayMetrics;
use crate::services::origin_allowlist::OriginAllowlist;
use crate::services::signal::CoalescedSignal;
use crate::services::signature::verify_signature;

/// Reasons a delivery is turned away before reaching the store.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid method: {0}")]
    MethodNotAllowed(Method),

    #[error("missing event type")]
    MissingEventType,

    #[error("missing delivery id")]
    MissingDeliveryId,

    #[error("request from disallowed origin: {0}")]
    OriginNotAllowed(String),

    #[error("missing signature")]
    MissingSignature,

    #[error("invalid signature")]
    InvalidSignature,
}

impl IngestError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingEventType | Self::MissingDeliveryId => StatusCode::BAD_REQUEST,
            Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::MissingSignature | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
        }
    }
}

/// One inbound request, independent of the HTTP framework that received it.
#[derive(Debug, Clone)]
pub struct InboundDelivery {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Client address without port, if known.
    pub remote_addr: Option<String>,
}

/// What happened to an accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored { id: String },
    Duplicate { id: String },
    /// Accepted, but the store failed; the error is logged only.
    StoreFailed { id: String },
}

pub struct IngestionService {
    store: Arc<dyn EventStore>,
    allowlist: Arc<OriginAllowlist>,
    secret: Vec<u8>,
    validate_origin: bool,
    metrics: Arc<RelayMetrics>,
    stats_signal: Option<CoalescedSignal>,
    forward_signal: Option<CoalescedSignal>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn EventStore>,
        allowlist: Arc<OriginAllowlist>,
        secret: impl Into<Vec<u8>>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            store,
            allowlist,
            secret: secret.into(),
            validate_origin: true,
            metrics,
            stats_signal: None,
            forward_signal: None,
        }
    }

    #[must_use]
    pub const fn with_origin_validation(mut self, enabled: bool) -> Self {
        self.validate_origin = enabled;
        self
    }

    #[must_use]
    pub fn with_stats_signal(mut self, signal: CoalescedSignal) -> Self {
        self.stats_signal = Some(signal);
        self
    }

    #[must_use]
    pub fn with_forward_signal(mut self, signal: CoalescedSignal) -> Self {
        self.forward_signal = Some(signal);
        self
    }

    /// Validate a delivery and persist it.
    ///
    /// Storage failures are logged and reported as [`IngestOutcome::StoreFailed`];
    /// they are never surfaced as an error to the sender.
    pub async fn ingest(&self, delivery: InboundDelivery) -> Result<IngestOutcome, IngestError> {
        if delivery.method != Method::POST {
            return Err(IngestError::MethodNotAllowed(delivery.method));
        }

        let event_type = header_str(&delivery.headers, EVENT_TYPE_HEADER)
            .ok_or(IngestError::MissingEventType)?
            .to_string();
        let delivery_id = header_str(&delivery.headers, DELIVERY_HEADER)
            .ok_or(IngestError::MissingDeliveryId)?
            .to_string();

        self.check_origin(delivery.remote_addr.as_deref())?;
        self.check_signature(&delivery.headers, &delivery.body)?;

        let headers = match HeaderSet::from_header_map(&delivery.headers).to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(event_id = %delivery_id, error = %e, "failed to encode headers, storing without them");
                None
            }
        };
        let (repository, sender) = extract_refs(&delivery.body);
        let event = Event::received(&delivery_id, &event_type, headers, delivery.body.to_vec())
            .with_repository(repository)
            .with_sender(sender);

        let outcome = match self.store.store_event(&event).await {
            Ok(StoreOutcome::Inserted) => {
                self.metrics.stored_events_total.inc();
                info!(event_id = %delivery_id, event_type = %event_type, "webhook stored");
                for signal in [&self.forward_signal, &self.stats_signal].into_iter().flatten() {
                    signal.notify();
                }
                IngestOutcome::Stored { id: delivery_id }
            }
            Ok(StoreOutcome::Duplicate) => {
                self.metrics.duplicate_events_total.inc();
                debug!(event_id = %delivery_id, "duplicate delivery ignored");
                IngestOutcome::Duplicate { id: delivery_id }
            }
            Err(e) => {
                error!(event_id = %delivery_id, error = %e, "failed to store webhook");
                IngestOutcome::StoreFailed { id: delivery_id }
            }
        };

        Ok(outcome)
    }

    fn check_origin(&self, remote_addr: Option<&str>) -> Result<(), IngestError> {
        let addr = remote_addr.unwrap_or_default();
        if self.allowlist.is_allowed(addr) {
            return Ok(());
        }
        if self.validate_origin {
            self.metrics.blocked_origins_total.inc();
            warn!(ip = %addr, "request from disallowed origin");
            return Err(IngestError::OriginNotAllowed(addr.to_string()));
        }
        warn!(ip = %addr, "request from outside the allowlist, validation disabled");
        Ok(())
    }

    fn check_signature(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), IngestError> {
        let Some(signature) = header_str(headers, SIGNATURE_HEADER) else {
            self.metrics.signature_errors_total.inc();
            return Err(IngestError::MissingSignature);
        };
        if !verify_signature(body, signature, &self.secret) {
            self.metrics.signature_errors_total.inc();
            return Err(IngestError::InvalidSignature);
        }
        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Best-effort `repository.full_name` and `sender.login` from a JSON body.
fn extract_refs(body: &[u8]) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return (None, None);
    };
    let field = |pointer: &str| value.pointer(pointer).and_then(Value::as_str).map(str::to_string);
    (field("/repository/full_name"), field("/sender/login"))
}
