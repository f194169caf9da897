//! Counters for cache lookups and external translator calls.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters owned by a single [`TranslationCache`](crate::cache::TranslationCache)
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Lookups answered from the store
    cache_hits: AtomicUsize,

    /// Lookups that found no stored value
    cache_misses: AtomicUsize,

    /// Calls actually made to the external translator
    external_calls: AtomicUsize,

    /// External calls that failed or timed out
    external_failures: AtomicUsize,
}

impl CacheMetrics {
    /// Create a set of counters, all at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lookup answered from the store
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that found no stored value (it either made the external call or waited on one)
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a call about to be made to the external translator
    pub fn record_external_call(&self) {
        self.external_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an external call that returned an error or timed out
    pub fn record_external_failure(&self) {
        self.external_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of cache hits
    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Get the number of cache misses
    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Get the number of external translator calls
    pub fn external_calls(&self) -> usize {
        self.external_calls.load(Ordering::Relaxed)
    }

    /// Get the number of failed external translator calls
    pub fn external_failures(&self) -> usize {
        self.external_failures.load(Ordering::Relaxed)
    }

    /// Snapshot the counters with derived rates
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let lookups = hits + misses;
        let cache_hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.external_calls();
        let failures = self.external_failures();
        let external_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            external_calls: calls,
            external_failures: failures,
            external_success_rate,
        }
    }
}

/// Point-in-time view of [`CacheMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Percentage (0-100)
    pub cache_hit_rate: f64,

    pub external_calls: usize,
    pub external_failures: usize,

    /// Percentage (0-100)
    pub external_success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.cache_hits(), 0);
        assert_eq!(metrics.cache_misses(), 0);
        assert_eq!(metrics.external_calls(), 0);
        assert_eq!(metrics.external_failures(), 0);
    }

    #[test]
    fn test_record_counters() {
        let metrics = CacheMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_external_call();
        metrics.record_external_failure();

        assert_eq!(metrics.cache_hits(), 2);
        assert_eq!(metrics.cache_misses(), 1);
        assert_eq!(metrics.external_calls(), 1);
        assert_eq!(metrics.external_failures(), 1);
    }

    #[test]
    fn test_report_empty() {
        let report = CacheMetrics::new().report();
        assert_eq!(report.cache_hit_rate, 0.0);
        assert_eq!(report.external_success_rate, 0.0);
    }

    #[test]
    fn test_report_rates() {
        let metrics = CacheMetrics::new();

        // 3 hits, 1 miss = 75% hit rate
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        // 4 calls, 1 failure = 75% success rate
        for _ in 0..4 {
            metrics.record_external_call();
        }
        metrics.record_external_failure();

        let report = metrics.report();
        assert_eq!(report.cache_hit_rate, 75.0);
        assert_eq!(report.external_success_rate, 75.0);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = CacheMetrics::new();
        let b = CacheMetrics::new();
        a.record_cache_hit();
        assert_eq!(a.cache_hits(), 1);
        assert_eq!(b.cache_hits(), 0);
    }

    #[test]
    fn test_report_serializes() {
        let metrics = CacheMetrics::new();
        metrics.record_cache_miss();
        let json = serde_json::to_string(&metrics.report()).expect("Should serialize");
        assert!(json.contains("\"cache_misses\":1"));
        assert!(json.contains("external_success_rate"));
    }
}
