//! Cache Module
//!
//! Provides a disk-persisted, namespaced cache with TTL expiration and
//! threshold eviction.

mod engine;
mod entry;
mod eviction;
mod hash_table;
mod key;
mod namespace;
mod persistence;
mod stats;
mod storage;


// Re-export public types
pub use engine::{CacheEngine, Namespace};
pub use entry::CacheEntry;
pub use eviction::{EvictionOutcome, EvictionPolicy};
pub use hash_table::{hash_key, HashTable, HASH_KEY_LENGTH};
pub use key::{HashKey, KeyPart, LogicalKey};
pub use namespace::{Lookup, NamespaceStore};
pub use persistence::PersistenceCoordinator;
pub use stats::CacheStats;
pub use storage::{FsStoragePreparer, StoragePreparer};

// == Public Constants ==
/// Default TTL in seconds
pub const DEFAULT_VALID_TIME: u64 = 60;

/// Default records per namespace
pub const DEFAULT_MAX_RECORDS: usize = 500;

/// Default fraction of `DEFAULT_MAX_RECORDS` that triggers pruning
pub const DEFAULT_CLEANUP_THRESHOLD: f64 = 0.75;

/// Default hash table size cap
pub const DEFAULT_HASH_TABLE_MAX_RECORDS: usize = 1000;

/// File stem of the shared hash table
pub const HASH_FILE_NAME: &str = "hashtable";

/// Extension of every cache file
pub const CACHE_FILE_EXTENSION: &str = "cache";

/// Cache directory permissions (owner rwx)
pub const CACHE_DIR_MODE: u32 = 0o700;

/// Cache file permissions (owner rw)
pub const CACHE_FILE_MODE: u32 = 0o600;
