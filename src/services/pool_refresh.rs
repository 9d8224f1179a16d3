//! Pool refresh service
//!
//! Periodically re-fetches the proxy listing and swaps the new snapshot into
//! a [`PoolHandle`]. Requests already in flight keep the pool they selected
//! from.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::provider::ProxySource;
use crate::proxy::pool::PoolHandle;

/// Pool refresh service configuration
#[derive(Clone)]
pub struct PoolRefreshConfig {
    /// How often to re-fetch the listing
    pub refresh_interval: Duration,
}

impl Default for PoolRefreshConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Pool refresh service
pub struct PoolRefreshService {
    source: Arc<dyn ProxySource>,
    pool: PoolHandle,
    config: PoolRefreshConfig,
}

impl PoolRefreshService {
    pub fn new(source: Arc<dyn ProxySource>, pool: PoolHandle, config: PoolRefreshConfig) -> Self {
        Self {
            source,
            pool,
            config,
        }
    }

    /// Run until shutdown is signalled
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting pool refresh service (interval: {:?})",
            self.config.refresh_interval
        );

        let mut refresh_interval = interval(self.config.refresh_interval);
        refresh_interval.tick().await; // Skip immediate tick

        loop {
            tokio::select! {
                _ = refresh_interval.tick() => {
                    if let Err(e) = self.refresh().await {
                        error!("Pool refresh failed, keeping previous pool: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Pool refresh service shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Fetch once and swap the pool in. Returns whether the pool was replaced.
    pub async fn refresh(&self) -> Result<bool> {
        let pool = self.source.fetch().await?;

        if pool.is_empty() {
            warn!("Provider returned no proxies, keeping previous pool");
            return Ok(false);
        }

        let previous = self.pool.load().len();
        let current = pool.len();
        self.pool.replace(pool);

        info!("Proxy pool refreshed ({} -> {} proxies)", previous, current);
        Ok(true)
    }
}

/// Handle for managing the pool refresh service
pub struct PoolRefreshHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl PoolRefreshHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for PoolRefreshHandle {
    fn default() -> Self {
        Self::new().0
    }
}
