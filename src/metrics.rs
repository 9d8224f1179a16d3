//! Request counters
//!
//! Counts completed requests by status code, method and proxy address and
//! renders them in the Prometheus text exposition format. Handles are passed
//! explicitly to whoever records or serves them; there is no global registry.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::models::RequestOutcome;

/// Counter name exported on the metrics endpoint
pub const REQUESTS_TOTAL: &str = "external_http_requests_total";

const REQUESTS_TOTAL_HELP: &str =
    "How many external HTTP requests processed, partitioned by status code, method and proxy IP.";

/// Label used for proxies beyond the configured label limit
pub const OTHER_PROXY_LABEL: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RequestLabels {
    code: String,
    method: String,
    proxy_ip: String,
}

#[derive(Debug, Default)]
struct MetricsState {
    counters: DashMap<RequestLabels, AtomicU64>,
    proxy_label_limit: Option<usize>,
    known_proxies: Mutex<HashSet<String>>,
}

/// Shared handle to the request counters
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    inner: Arc<MetricsState>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of distinct proxy labels; later proxies count as `other`
    pub fn with_proxy_label_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(MetricsState {
                proxy_label_limit: Some(limit),
                ..Default::default()
            }),
        }
    }

    pub fn record(&self, status_code: u16, method: &str, proxy_address: &str) {
        let labels = RequestLabels {
            code: status_code.to_string(),
            method: method.to_uppercase(),
            proxy_ip: self.proxy_label(proxy_address),
        };

        if let Some(counter) = self.inner.counters.get(&labels) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.inner
            .counters
            .entry(labels)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &RequestOutcome) {
        self.record(outcome.status_code, &outcome.method, &outcome.proxy_address);
    }

    /// Current value for one label set
    pub fn get(&self, status_code: u16, method: &str, proxy_address: &str) -> u64 {
        let labels = RequestLabels {
            code: status_code.to_string(),
            method: method.to_uppercase(),
            proxy_ip: proxy_address.to_string(),
        };
        self.inner
            .counters
            .get(&labels)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum over every label set
    pub fn total(&self) -> u64 {
        self.inner
            .counters
            .iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    /// Prometheus text exposition of all counters
    pub fn render(&self) -> String {
        let mut samples: Vec<(RequestLabels, u64)> = self
            .inner
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        samples.sort();

        let mut out = String::new();
        let _ = writeln!(out, "# HELP {} {}", REQUESTS_TOTAL, REQUESTS_TOTAL_HELP);
        let _ = writeln!(out, "# TYPE {} counter", REQUESTS_TOTAL);
        for (labels, value) in samples {
            let _ = writeln!(
                out,
                "{}{{code=\"{}\",method=\"{}\",proxy_ip=\"{}\"}} {}",
                REQUESTS_TOTAL,
                escape_label(&labels.code),
                escape_label(&labels.method),
                escape_label(&labels.proxy_ip),
                value
            );
        }
        out
    }

    fn proxy_label(&self, proxy_address: &str) -> String {
        let Some(limit) = self.inner.proxy_label_limit else {
            return proxy_address.to_string();
        };

        let mut known = self.inner.known_proxies.lock();
        if known.contains(proxy_address) {
            return proxy_address.to_string();
        }
        if known.len() < limit {
            known.insert(proxy_address.to_string());
            return proxy_address.to_string();
        }
        OTHER_PROXY_LABEL.to_string()
    }
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
