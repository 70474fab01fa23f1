//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::{
    DEFAULT_CLEANUP_THRESHOLD, DEFAULT_HASH_TABLE_MAX_RECORDS, DEFAULT_MAX_RECORDS,
    DEFAULT_VALID_TIME,
};

/// Name of the directory used when no cache directory is configured.
pub const DEFAULT_CACHE_DIR_NAME: &str = "jsoncache";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the namespace files and the hash table file
    pub cache_dir: PathBuf,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Maximum number of records per namespace before hard eviction
    pub max_records: usize,
    /// Fraction of `max_records` at which expired entries get pruned
    pub cleanup_threshold: f64,
    /// Maximum size of the shared hash table before it is reset
    pub hash_table_max_records: usize,
}

impl CacheConfig {
    /// Creates a config with defaults pointing at `cache_dir`.
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Cache directory (default: `jsoncache` next to the executable)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 60)
    /// - `CACHE_MAX_RECORDS` - Records per namespace (default: 500)
    /// - `CACHE_CLEANUP_THRESHOLD` - Soft prune threshold (default: 0.75)
    /// - `CACHE_HASH_TABLE_MAX_RECORDS` - Hash table cap (default: 1000)
    pub fn from_env() -> Self {
        let cleanup_threshold = env::var("CACHE_CLEANUP_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|t| is_valid_threshold(*t))
            .unwrap_or(DEFAULT_CLEANUP_THRESHOLD);

        Self {
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_dir),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_VALID_TIME),
            max_records: env::var("CACHE_MAX_RECORDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_RECORDS),
            cleanup_threshold,
            hash_table_max_records: env::var("CACHE_HASH_TABLE_MAX_RECORDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HASH_TABLE_MAX_RECORDS),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            default_ttl: DEFAULT_VALID_TIME,
            max_records: DEFAULT_MAX_RECORDS,
            cleanup_threshold: DEFAULT_CLEANUP_THRESHOLD,
            hash_table_max_records: DEFAULT_HASH_TABLE_MAX_RECORDS,
        }
    }
}

/// Cleanup thresholds are fractions strictly between 0 and 1.
pub fn is_valid_threshold(threshold: f64) -> bool {
    threshold > 0.0 && threshold < 1.0
}

/// `jsoncache` beside the running executable, or relative to the working dir.
fn default_cache_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CACHE_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR_NAME))
}
