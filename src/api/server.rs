//! Metrics server using Axum
//!
//! Runs on its own task so scraping never blocks request execution.

use std::net::SocketAddr;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{GhostlineError, Result};
use crate::metrics::RequestMetrics;

use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub metrics: RequestMetrics,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(metrics: RequestMetrics) -> Self {
        Self {
            metrics,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Port for the metrics endpoint (default: 9090)
    pub port: u16,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9090,
        }
    }
}

impl From<&Config> for MetricsServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            host: config.metrics.host.clone(),
            port: config.metrics.port,
        }
    }
}

impl MetricsServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                GhostlineError::InvalidConfig(format!(
                    "Invalid metrics address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }
}

/// Metrics server
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: AppState,
}

impl MetricsServer {
    /// Create a new metrics server
    pub fn new(config: MetricsServerConfig, metrics: RequestMetrics) -> Self {
        Self {
            config,
            state: AppState::new(metrics),
        }
    }

    /// Build the router
    fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.addr()?;
        Ok(TcpListener::bind(addr).await?)
    }

    /// Serve on a bound listener until shutdown
    #[instrument(skip(self, listener, shutdown))]
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let router = self.build_router();

        info!("Metrics server listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| GhostlineError::Internal(e.to_string()))?;

        info!(
            "Metrics server shut down after {:?}",
            self.state.started_at.elapsed()
        );
        Ok(())
    }
}
