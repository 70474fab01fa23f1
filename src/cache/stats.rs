//! Cache Statistics Module
//!
//! Tracks engine counters: hits, misses, expirations, and eviction activity.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache activity for the lifetime of one engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of reads that returned a value
    pub hits: u64,
    /// Number of reads that returned nothing (missing, expired, or corrupt)
    pub misses: u64,
    /// Entries removed lazily because they were read after expiring
    pub expired: u64,
    /// Entries removed by threshold pruning
    pub pruned: u64,
    /// Namespaces discarded wholesale for being over capacity
    pub evictions: u64,
    /// Times the hash table was reset for exceeding its cap
    pub hash_table_resets: u64,
    /// Namespace file loads, forced reloads included
    pub loads: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Counts a lazy expiration; the read itself is also a miss.
    pub fn record_expired(&mut self) {
        self.expired += 1;
        self.misses += 1;
    }

    pub fn record_pruned(&mut self, count: usize) {
        self.pruned += count as u64;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_hash_table_reset(&mut self) {
        self.hash_table_resets += 1;
    }

    pub fn record_load(&mut self) {
        self.loads += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.loads, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_counts_as_miss() {
        let mut stats = CacheStats::new();
        stats.record_expired();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_eviction_counters() {
        let mut stats = CacheStats::new();
        stats.record_pruned(26);
        stats.record_pruned(4);
        stats.record_eviction();
        stats.record_hash_table_reset();
        assert_eq!(stats.pruned, 30);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.hash_table_resets, 1);
    }
}
