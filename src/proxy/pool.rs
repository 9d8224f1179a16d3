//! Proxy pool and random selection
//!
//! A pool is an immutable snapshot of the provider's listing. Refreshing
//! produces a new pool which is swapped into a [`PoolHandle`].

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{GhostlineError, Result};
use crate::models::Proxy;

/// Which proxies are eligible for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Every proxy, whatever its reported status
    #[default]
    IncludeAll,
    /// Only proxies the provider reports as online
    OnlineOnly,
}

impl SelectionPolicy {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "online" | "online_only" | "online-only" | "onlineonly" => Self::OnlineOnly,
            _ => Self::IncludeAll,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncludeAll => "include_all",
            Self::OnlineOnly => "online_only",
        }
    }

    fn admits(&self, proxy: &Proxy) -> bool {
        match self {
            Self::IncludeAll => true,
            Self::OnlineOnly => proxy.is_online(),
        }
    }
}

/// Snapshot of proxies available for selection
pub struct ProxyPool {
    proxies: Vec<Proxy>,
    policy: SelectionPolicy,
    rng: Mutex<StdRng>,
}

impl ProxyPool {
    /// Create a pool whose generator is seeded once from OS entropy
    pub fn new(proxies: Vec<Proxy>) -> Self {
        Self {
            proxies,
            policy: SelectionPolicy::default(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the generator with a deterministic one
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Pick one eligible proxy uniformly at random
    pub fn select(&self) -> Result<Proxy> {
        let selected = match self.policy {
            SelectionPolicy::IncludeAll => {
                let mut rng = self.rng.lock();
                self.proxies.choose(&mut *rng).cloned()
            }
            SelectionPolicy::OnlineOnly => {
                let eligible: Vec<&Proxy> =
                    self.proxies.iter().filter(|p| self.policy.admits(p)).collect();
                let mut rng = self.rng.lock();
                eligible.choose(&mut *rng).map(|p| (*p).clone())
            }
        };

        let proxy = selected.ok_or(GhostlineError::EmptyPool)?;
        debug!("Selected proxy {}", proxy.endpoint());
        Ok(proxy)
    }

    pub fn proxies(&self) -> &[Proxy] {
        &self.proxies
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Number of proxies eligible under the current policy
    pub fn available_count(&self) -> usize {
        self.proxies.iter().filter(|p| self.policy.admits(p)).count()
    }

    pub fn online_count(&self) -> usize {
        self.proxies.iter().filter(|p| p.is_online()).count()
    }
}

impl std::fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPool")
            .field("proxies", &self.proxies.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl From<Vec<Proxy>> for ProxyPool {
    fn from(proxies: Vec<Proxy>) -> Self {
        Self::new(proxies)
    }
}

/// Shared, swappable reference to the current pool
#[derive(Clone)]
pub struct PoolHandle {
    current: Arc<ArcSwap<ProxyPool>>,
}

impl PoolHandle {
    pub fn new(pool: ProxyPool) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(pool)),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<ProxyPool> {
        self.current.load_full()
    }

    /// Swap in a refreshed pool; in-flight selections keep their snapshot
    pub fn replace(&self, pool: ProxyPool) {
        self.current.store(Arc::new(pool));
    }

    pub fn select(&self) -> Result<Proxy> {
        self.current.load().select()
    }
}

impl From<ProxyPool> for PoolHandle {
    fn from(pool: ProxyPool) -> Self {
        Self::new(pool)
    }
}
