//! Inbound webhook endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::services::ingestion::{InboundDelivery, IngestionService};

/// Largest body the source will send.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub struct WebhookState {
    pub ingestion: Arc<IngestionService>,
    /// Take the client address from `X-Forwarded-For` instead of the socket.
    pub trust_forwarded_for: bool,
}

/// `/webhook` accepts every method so the handler can answer 405 itself.
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", any(receive_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn receive_webhook(State(state): State<Arc<WebhookState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "failed to read webhook body");
            return (StatusCode::BAD_REQUEST, "Error reading request body").into_response();
        }
    };

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let remote_addr = if state.trust_forwarded_for {
        forwarded_for(&parts.headers).or(peer)
    } else {
        peer
    };

    let delivery = InboundDelivery {
        method: parts.method,
        headers: parts.headers,
        body,
        remote_addr,
    };

    match state.ingestion.ingest(delivery).await {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            warn!(error = %e, "webhook rejected");
            (e.status(), e.to_string()).into_response()
        }
    }
}

/// Left-most `X-Forwarded-For` entry.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
