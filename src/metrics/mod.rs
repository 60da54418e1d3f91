//! Metrics collection module
//!
//! Tracks per-tool call counts, response times and error rates.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of response times kept per tool
const RESPONSE_WINDOW: usize = 100;

#[derive(Debug, Default)]
struct ToolCounters {
    calls: u64,
    successes: u64,
    errors: BTreeMap<&'static str, u64>,
    response_times: Vec<u64>,
}

/// Metrics collector shared by all transports
pub struct Metrics {
    /// Total tool calls
    total_calls: AtomicU64,
    /// Total calls answered from cache
    cache_hits: AtomicU64,
    tools: RwLock<HashMap<String, ToolCounters>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            tools: RwLock::new(HashMap::new()),
        }
    }

    // A panic while holding the lock leaves plain counters, still usable
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ToolCounters>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ToolCounters>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a tool call
    pub fn record_call(&self, tool: &str) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.write().entry(tool.to_string()).or_default().calls += 1;
    }

    /// Record a call answered from cache
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record tool response time
    pub fn record_response_time(&self, tool: &str, time_ms: u64) {
        let mut tools = self.write();
        let times = &mut tools.entry(tool.to_string()).or_default().response_times;

        if times.len() >= RESPONSE_WINDOW {
            times.remove(0);
        }
        times.push(time_ms);
    }

    /// Record a successful call
    pub fn record_success(&self, tool: &str) {
        self.write().entry(tool.to_string()).or_default().successes += 1;
    }

    /// Record a failed call by error kind
    pub fn record_error(&self, tool: &str, kind: &'static str) {
        *self
            .write()
            .entry(tool.to_string())
            .or_default()
            .errors
            .entry(kind)
            .or_insert(0) += 1;
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Average response time for a tool
    pub fn avg_response_time(&self, tool: &str) -> Option<u64> {
        self.read().get(tool).and_then(|c| average(&c.response_times))
    }

    /// Success percentage for a tool
    pub fn reliability(&self, tool: &str) -> f64 {
        self.read().get(tool).map(reliability).unwrap_or(100.0)
    }

    /// Point-in-time view of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let tools = self
            .read()
            .iter()
            .map(|(name, counters)| {
                let stats = ToolStats {
                    calls: counters.calls,
                    successes: counters.successes,
                    errors: counters.errors.clone(),
                    avg_response_time_ms: average(&counters.response_times),
                    reliability: reliability(counters),
                };
                (name.clone(), stats)
            })
            .collect();

        MetricsSnapshot {
            total_calls: self.total_calls(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            tools,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn average(times: &[u64]) -> Option<u64> {
    if times.is_empty() {
        None
    } else {
        Some(times.iter().sum::<u64>() / times.len() as u64)
    }
}

fn reliability(counters: &ToolCounters) -> f64 {
    let errors: u64 = counters.errors.values().sum();
    let total = errors + counters.successes;
    if total == 0 {
        100.0
    } else {
        (counters.successes as f64 / total as f64) * 100.0
    }
}

/// Serializable view of the metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub cache_hits: u64,
    pub tools: BTreeMap<String, ToolStats>,
}

/// Statistics for a single tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolStats {
    pub calls: u64,
    pub successes: u64,
    pub errors: BTreeMap<&'static str, u64>,
    pub avg_response_time_ms: Option<u64>,
    pub reliability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_call("web_search");
        metrics.record_response_time("web_search", 100);
        metrics.record_success("web_search");

        assert_eq!(metrics.total_calls(), 1);
        assert_eq!(metrics.avg_response_time("web_search"), Some(100));
        assert_eq!(metrics.reliability("web_search"), 100.0);
        assert_eq!(metrics.reliability("unknown"), 100.0);
    }

    #[test]
    fn test_snapshot() {
        let metrics = Metrics::new();

        metrics.record_call("web_search");
        metrics.record_success("web_search");
        metrics.record_call("web_search");
        metrics.record_error("web_search", "upstream");
        metrics.record_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_calls, 2);
        assert_eq!(snapshot.cache_hits, 1);

        let stats = &snapshot.tools["web_search"];
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.errors["upstream"], 1);
        assert_eq!(stats.reliability, 50.0);
        assert!(stats.avg_response_time_ms.is_none());
    }

    #[test]
    fn test_response_window() {
        let metrics = Metrics::new();
        for ms in 0..150 {
            metrics.record_response_time("lens_search", ms);
        }
        // keeps 50..150
        assert_eq!(metrics.avg_response_time("lens_search"), Some(99));
    }
}
