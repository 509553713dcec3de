//! Per-provider statistics store.
//!
//! The store is the only shared mutable state in the relay. Probes and
//! forwarded requests both feed it through [`StatsStore::record`]; the router
//! reads consistent snapshots out of it. Entries are guarded per provider by
//! the map's shard locks, so an update is observed either entirely or not at
//! all, never as a torn mix.
//!
//! Nothing here is persisted. A restart resets every provider to unknown
//! until the next probe cycle reaches it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::registry::ProviderRegistry;

/// Latency recorded for any failed interaction, in milliseconds.
///
/// Failures carry no meaningful latency of their own, so each one pushes the
/// rolling average toward a 30 second penalty instead.
pub const FAILURE_PENALTY_MS: f64 = 30_000.0;

/// Smoothing factor for the rolling latency average.
const LATENCY_SMOOTHING: f64 = 0.3;

/// Mutable health and latency record for one provider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStats {
    /// Last observed reachability. A provider that has never been probed
    /// successfully stays offline and is never routed to.
    pub online: bool,
    /// Wall-clock time of the most recent probe or forwarded call.
    pub last_check: Option<DateTime<Utc>>,
    /// Exponential moving average of observed latency in milliseconds.
    pub response_time_ms: f64,
    /// Count of all outcome updates, probes and forwards alike.
    pub total_requests: u64,
    /// Count of outcome updates that failed.
    pub failed_requests: u64,
    /// Diagnostic from the most recent failed probe.
    pub last_error: Option<String>,
    /// Consecutive failed probes since the last successful one.
    pub retry_count: u32,
}

impl ProviderStats {
    /// Fraction of successful outcomes, zero before any observation.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            1.0 - self.failed_requests as f64 / self.total_requests as f64
        }
    }
}

/// Map of provider name to [`ProviderStats`], owned exclusively by the store.
pub struct StatsStore {
    inner: DashMap<String, ProviderStats>,
}

impl StatsStore {
    /// Create a store pre-seeded with an empty record per registry entry.
    pub fn new(registry: &ProviderRegistry) -> Self {
        let inner = DashMap::new();
        for provider in registry.iter() {
            inner.insert(provider.name.clone(), ProviderStats::default());
        }
        Self { inner }
    }

    /// Record the outcome of one probe or forwarded call.
    ///
    /// Runs as a single atomic step per provider: counters, reachability,
    /// the rolling latency and `last_check` all move together. The first
    /// sample seeds the average directly; later samples blend in with
    /// weight [`LATENCY_SMOOTHING`].
    pub fn record(&self, name: &str, success: bool, latency_ms: f64) {
        let mut entry = self.inner.entry(name.to_string()).or_default();
        entry.total_requests += 1;
        if success {
            entry.online = true;
        } else {
            entry.failed_requests += 1;
            entry.online = false;
        }
        entry.response_time_ms = if entry.total_requests == 1 {
            latency_ms
        } else {
            LATENCY_SMOOTHING * latency_ms + (1.0 - LATENCY_SMOOTHING) * entry.response_time_ms
        };
        entry.last_check = Some(Utc::now());
    }

    /// Store the diagnostic of a failed probe and bump the consecutive
    /// failure counter.
    pub fn note_probe_failure(&self, name: &str, diagnostic: String) {
        let mut entry = self.inner.entry(name.to_string()).or_default();
        entry.last_error = Some(diagnostic);
        entry.retry_count += 1;
    }

    /// Clear probe-failure bookkeeping after a successful probe.
    pub fn note_probe_success(&self, name: &str) {
        let mut entry = self.inner.entry(name.to_string()).or_default();
        entry.last_error = None;
        entry.retry_count = 0;
    }

    /// Consistent copy of one provider's stats.
    pub fn snapshot(&self, name: &str) -> Option<ProviderStats> {
        self.inner.get(name).map(|entry| entry.value().clone())
    }
}
