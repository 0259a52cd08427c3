//! HTTP listeners: the public webhook endpoint and the private query/replay API.

pub mod api;
pub mod webhook;

pub use api::{api_router, ApiState};
pub use webhook::{webhook_router, WebhookState};

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `router` on `listener` until `cancel` fires, exposing peer addresses
/// to handlers through `ConnectInfo`.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(cancel.cancelled_owned())
    .await
}
