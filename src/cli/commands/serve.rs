//! Wires the relay together and runs it until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::factory::open_store;
use crate::adapters::http::{self, api_router, webhook_router, ApiState, WebhookState};
use crate::domain::models::Config;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::services::delivery::ForwardTarget;
use crate::services::forwarder::Forwarder;
use crate::services::ingestion::IngestionService;
use crate::services::metrics::RelayMetrics;
use crate::services::origin_allowlist::OriginAllowlist;
use crate::services::replay::ReplayService;
use crate::services::signal::CoalescedSignal;
use crate::services::stats_collector::StatsCollector;

pub async fn execute(config: Config) -> Result<()> {
    let _logger = LoggerImpl::init(&LogConfig::try_from(&config.logging)?)?;

    let (metrics, registry) = RelayMetrics::registered().context("failed to register metrics")?;
    let metrics = Arc::new(metrics);
    let store = open_store(&config.database)
        .await
        .context("failed to open event store")?;
    let cancel = CancellationToken::new();

    let allowlist = Arc::new(OriginAllowlist::new(&config.allowlist.meta_url)?);
    if let Err(e) = allowlist.refresh().await {
        warn!(error = %e, "initial origin allowlist refresh failed, will retry");
    }
    let mut tasks = Vec::new();
    match config.allowlist.refresh_interval() {
        Some(period) => {
            tasks.push(Arc::clone(&allowlist).spawn_refresher(period, cancel.clone()));
        }
        None => info!("periodic origin allowlist refresh disabled"),
    }

    let (stats_signal, stats_rx) = CoalescedSignal::new();
    let stats = Arc::new(
        StatsCollector::new(Arc::clone(&store), Arc::clone(&metrics))
            .with_window(config.stats.window()),
    );
    tasks.push(stats.start(&stats_signal, stats_rx, config.stats.interval(), cancel.clone()));

    let mut ingestion = IngestionService::new(
        Arc::clone(&store),
        Arc::clone(&allowlist),
        config.webhook_secret.as_bytes(),
        Arc::clone(&metrics),
    )
    .with_origin_validation(config.validate_origin)
    .with_stats_signal(stats_signal.clone());
    let mut replay =
        ReplayService::new(Arc::clone(&store), config.replay.default_limit, Arc::clone(&metrics));

    if let Some(url) = &config.target_url {
        let target = ForwardTarget::parse(url, config.forwarder.timeout())?;
        let (forward_signal, forward_rx) = CoalescedSignal::new();
        let forwarder = Arc::new(
            Forwarder::new(
                Arc::clone(&store),
                target,
                config.forwarder.timeout(),
                Arc::clone(&metrics),
            )
            .with_stats_signal(stats_signal.clone()),
        );
        tasks.push(forwarder.start(
            &forward_signal,
            forward_rx,
            config.forwarder.sweep_interval(),
            cancel.clone(),
        ));
        ingestion = ingestion.with_forward_signal(forward_signal.clone());
        replay = replay.with_forward_signal(forward_signal);
        info!(target = %url, "forwarding enabled");
    } else {
        info!("no target configured, running in log-only mode");
    }

    let webhook_state = Arc::new(WebhookState {
        ingestion: Arc::new(ingestion),
        trust_forwarded_for: config.trust_forwarded_for,
    });
    let api_state = Arc::new(ApiState {
        store: Arc::clone(&store),
        replay: Arc::new(replay),
        registry,
    });

    let webhook_listener = TcpListener::bind(&config.webhook_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.webhook_addr))?;
    let api_listener = TcpListener::bind(&config.api_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.api_addr))?;
    info!(webhook = %config.webhook_addr, api = %config.api_addr, "hubrelay listening");

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
            }
            cancel.cancel();
        }
    });

    let served = tokio::try_join!(
        http::serve(webhook_listener, webhook_router(webhook_state), cancel.clone()),
        http::serve(api_listener, api_router(api_state), cancel.clone()),
    );

    cancel.cancel();
    futures::future::join_all(tasks).await;
    if let Err(e) = store.close().await {
        error!(error = %e, "failed to close event store");
    }
    info!("hubrelay stopped");

    served.context("listener failed")?;
    Ok(())
}
