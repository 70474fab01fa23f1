//! JSON Disk Cache maintenance tool
//!
//! Opens the configured cache directory, loads every namespace found there,
//! and flushes it back so expired entries are pruned, oversized namespaces
//! are discarded, and the hash table is capped.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use json_disk_cache::{CacheConfig, CacheEngine};

/// Main entry point for the maintenance tool.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache engine on the configured directory
/// 4. Load every namespace file and report its size
/// 5. Flush, applying pruning and eviction, and report the outcome
fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "json_disk_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: dir={}, default_ttl={}s, max_records={}, cleanup_threshold={}, hash_table_max_records={}",
        config.cache_dir.display(),
        config.default_ttl,
        config.max_records,
        config.cleanup_threshold,
        config.hash_table_max_records
    );

    let mut engine = CacheEngine::open(&config)
        .with_context(|| format!("cannot open cache at {}", config.cache_dir.display()))?;

    let names = engine.namespaces_on_disk()?;
    for name in &names {
        let records = engine.namespace(name)?.count_records();
        info!("Namespace '{}': {} records before compaction", name, records);
    }

    engine.flush().context("cache flush failed")?;

    for name in &names {
        info!(
            "Namespace '{}': {} records after compaction",
            name,
            engine.count_records(Some(name.as_str()))
        );
    }

    let stats = engine.stats().clone();
    info!(
        "Compaction complete: namespaces={}, pruned={}, evicted={}, hash_table_resets={}",
        names.len(),
        stats.pruned,
        stats.evictions,
        stats.hash_table_resets
    );

    engine.close().context("cache close failed")?;
    Ok(())
}
