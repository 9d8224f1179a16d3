//! Ghostline - Entry Point
//!
//! Fetches the proxy pool, sends a GET for every URL argument through a
//! random proxy, and keeps serving metrics until shutdown when enabled.

use std::sync::Arc;

use http::HeaderMap;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ghostline::api::{MetricsServer, MetricsServerConfig};
use ghostline::config::{Config, LogConfig};
use ghostline::proxy::TransportConfig;
use ghostline::services::{PoolRefreshConfig, PoolRefreshHandle, PoolRefreshService};
use ghostline::{PoolHandle, ProviderClient, ProxySource, RequestExecutor, RequestMetrics};

#[tokio::main]
async fn main() -> ghostline::Result<()> {
    init_tracing(&LogConfig::from_env());

    info!("Starting Ghostline");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    let metrics = match config.metrics.proxy_label_limit {
        0 => RequestMetrics::new(),
        limit => RequestMetrics::with_proxy_label_limit(limit),
    };

    // Fetch the initial pool
    let provider = Arc::new(
        ProviderClient::new(config.provider.api_key.clone())
            .with_base_url(config.provider.url.clone())
            .with_policy(config.provider.selection_policy),
    );
    let pool = provider.fetch().await?;
    if pool.available_count() == 0 {
        warn!(
            "No selectable proxies (policy: {})",
            config.provider.selection_policy.as_str()
        );
    }
    let pool = PoolHandle::new(pool);

    let executor = RequestExecutor::new(pool.clone())
        .with_metrics(metrics.clone())
        .with_transport_config(TransportConfig {
            timeout: config.request_timeout(),
            ..Default::default()
        })
        .with_retry_policy(config.retry_policy()?);

    let (shutdown_tx, _) = watch::channel(false);

    // Start metrics server
    let metrics_task = if config.metrics.enabled {
        let server = MetricsServer::new(MetricsServerConfig::from(&config), metrics.clone());
        let listener = server.bind().await?;
        let shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, shutdown).await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start pool refresh service
    let refresh = config.refresh_interval().map(|refresh_interval| {
        let (handle, shutdown) = PoolRefreshHandle::new();
        let service = PoolRefreshService::new(
            provider.clone(),
            pool.clone(),
            PoolRefreshConfig { refresh_interval },
        );
        let task = tokio::spawn(async move {
            service.run(shutdown).await;
        });
        (handle, task)
    });

    for url in std::env::args().skip(1) {
        match executor.get(&url, HeaderMap::new(), None).await {
            Ok(response) if response.outcome().is_success() => info!(
                "{} -> {} via {} ({} bytes, {} attempt(s))",
                url,
                response.status().as_u16(),
                response.proxy().endpoint(),
                response.bytes().len(),
                response.outcome().attempts
            ),
            Ok(response) => warn!(
                "{} -> {} via {} after {} attempt(s)",
                url,
                response.status().as_u16(),
                response.proxy().endpoint(),
                response.outcome().attempts
            ),
            Err(e) if e.is_client_error() => warn!("{} rejected: {}", url, e),
            Err(e) => error!("{} failed: {}", url, e),
        }
    }

    if metrics_task.is_none() && refresh.is_none() {
        info!("Ghostline finished");
        return Ok(());
    }

    if metrics_task.is_some() {
        info!("Serving metrics on {}", config.metrics_addr());
    }

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Some(task) = metrics_task {
        let _ = task.await;
    }
    if let Some((handle, task)) = refresh {
        handle.shutdown();
        let _ = task.await;
    }

    info!("Ghostline stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ghostline={},tower_http=info", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
