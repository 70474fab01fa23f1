//! Cache Engine Module
//!
//! Facade tying namespaces, the hash table, eviction and persistence together.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::entry::current_timestamp;
use crate::cache::eviction::EvictionPolicy;
use crate::cache::hash_table::HashTable;
use crate::cache::key::{HashKey, LogicalKey};
use crate::cache::namespace::{Lookup, NamespaceStore};
use crate::cache::persistence::{validate_namespace, PersistenceCoordinator};
use crate::cache::stats::CacheStats;
use crate::cache::storage::{FsStoragePreparer, StoragePreparer};
use crate::config::{is_valid_threshold, CacheConfig};
use crate::error::{CacheError, Result};

// == Cache Engine ==
/// Disk-backed cache split into namespaces.
///
/// Namespaces are loaded from disk the first time they are selected with
/// [`namespace`](Self::namespace). Nothing is written until
/// [`flush`](Self::flush) or [`close`](Self::close); an engine dropped without
/// being closed flushes on drop and logs any failure.
#[derive(Debug)]
pub struct CacheEngine {
    persistence: PersistenceCoordinator,
    namespaces: HashMap<String, NamespaceStore>,
    hash_table: HashTable,
    default_ttl: u64,
    policy: EvictionPolicy,
    /// Most recently selected namespace
    current: Option<String>,
    stats: CacheStats,
    closed: bool,
}

impl CacheEngine {
    // == Constructors ==
    /// Opens the cache described by `config` on the local filesystem.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        Self::with_preparer(config, Box::new(FsStoragePreparer))
    }

    /// Opens the cache using a custom storage preparer.
    ///
    /// Fails with [`CacheError::Setup`] if the directory or the hash table
    /// file cannot be prepared.
    pub fn with_preparer(
        config: &CacheConfig,
        preparer: Box<dyn StoragePreparer>,
    ) -> Result<Self> {
        let persistence = PersistenceCoordinator::new(&config.cache_dir, preparer)?;
        let hash_table = persistence.load_hash_table(config.hash_table_max_records);

        let cleanup_threshold = if is_valid_threshold(config.cleanup_threshold) {
            config.cleanup_threshold
        } else {
            warn!(
                threshold = config.cleanup_threshold,
                "cleanup threshold must be between 0 and 1, using default"
            );
            crate::cache::DEFAULT_CLEANUP_THRESHOLD
        };

        info!(
            dir = %persistence.dir().display(),
            default_ttl = config.default_ttl,
            max_records = config.max_records,
            cleanup_threshold,
            hash_table_records = hash_table.len(),
            "cache engine opened"
        );

        Ok(Self {
            persistence,
            namespaces: HashMap::new(),
            hash_table,
            default_ttl: config.default_ttl,
            policy: EvictionPolicy::new(config.max_records, cleanup_threshold),
            current: None,
            stats: CacheStats::new(),
            closed: false,
        })
    }

    // == Namespace Selection ==
    /// Selects `name`, loading it from disk on first use in this engine.
    pub fn namespace(&mut self, name: &str) -> Result<Namespace<'_>> {
        self.ensure_loaded(name, false)?;
        Ok(Namespace {
            engine: self,
            name: name.to_string(),
        })
    }

    /// Selects `name` and re-reads it from disk even if already loaded.
    ///
    /// In-memory changes not yet flushed for this namespace are replaced by
    /// the file content.
    pub fn reload_namespace(&mut self, name: &str) -> Result<Namespace<'_>> {
        self.ensure_loaded(name, true)?;
        Ok(Namespace {
            engine: self,
            name: name.to_string(),
        })
    }

    fn ensure_loaded(&mut self, name: &str, force: bool) -> Result<()> {
        validate_namespace(name)?;

        let loaded = self
            .namespaces
            .get(name)
            .is_some_and(NamespaceStore::is_loaded);
        if force || !loaded {
            let entries = self.persistence.load_namespace(name)?;
            let store = self.namespaces.entry(name.to_string()).or_default();
            store.replace_entries(entries);
            store.record_load();
            self.stats.record_load();
            debug!(
                namespace = name,
                records = store.len(),
                load_count = store.load_count(),
                "namespace loaded"
            );
        }

        self.current = Some(name.to_string());
        Ok(())
    }

    /// Name of the most recently selected namespace.
    pub fn current_namespace(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Names of the namespaces held in memory.
    pub fn loaded_namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.namespaces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names of the namespaces that have a file in the cache directory.
    pub fn namespaces_on_disk(&self) -> Result<Vec<String>> {
        self.persistence.namespace_names()
    }

    // == Counting ==
    /// Number of records in `namespace`, or in the most recently selected
    /// namespace when `None`. Zero for a namespace never populated.
    pub fn count_records(&self, namespace: Option<&str>) -> usize {
        namespace
            .or(self.current.as_deref())
            .and_then(|name| self.namespaces.get(name))
            .map_or(0, NamespaceStore::len)
    }

    /// How many times `namespace` has been read from disk.
    pub fn load_count(&self, namespace: &str) -> u32 {
        self.namespaces
            .get(namespace)
            .map_or(0, NamespaceStore::load_count)
    }

    // == Maintenance ==
    /// Removes expired entries from a loaded namespace. Returns how many went.
    pub fn remove_expired(&mut self, namespace: &str) -> usize {
        let removed = self
            .namespaces
            .get_mut(namespace)
            .map_or(0, |store| store.remove_expired_at(current_timestamp()));
        self.stats.record_pruned(removed);
        removed
    }

    /// Deletes a namespace's file and drops its in-memory entries.
    ///
    /// Returns whether a file existed.
    pub fn delete_namespace(&mut self, namespace: &str) -> Result<bool> {
        let existed = self.persistence.delete_namespace_file(namespace)?;
        self.namespaces.remove(namespace);
        info!(namespace, existed, "namespace deleted");
        Ok(existed)
    }

    /// Hash key for `key`, recording it in the hash table on first sight.
    pub fn resolve_key(&mut self, key: impl Into<LogicalKey>) -> HashKey {
        self.hash_table.resolve(&key.into())
    }

    /// Logical key recorded for a hash key, if the hash table knows it.
    pub fn lookup_hash(&self, hash: &str) -> Option<&str> {
        self.hash_table.lookup(hash)
    }

    pub fn hash_table_len(&self) -> usize {
        self.hash_table.len()
    }

    // == Configuration ==
    /// Default TTL in seconds for entries stored without one.
    pub fn set_valid_time(&mut self, seconds: u64) -> &mut Self {
        self.default_ttl = seconds;
        self
    }

    /// Records allowed per namespace before it is discarded at flush.
    pub fn set_max_records(&mut self, records: usize) -> &mut Self {
        self.policy.max_records = records;
        self
    }

    /// Fraction of the record limit above which expired entries are pruned.
    ///
    /// Values outside (0, 1) are ignored.
    pub fn set_cleanup_threshold(&mut self, threshold: f64) -> &mut Self {
        if is_valid_threshold(threshold) {
            self.policy.cleanup_threshold = threshold;
        } else {
            warn!(threshold, "cleanup threshold must be between 0 and 1, ignoring");
        }
        self
    }

    /// Hash table size above which it is reset at flush.
    pub fn set_hash_table_max_records(&mut self, records: usize) -> &mut Self {
        self.hash_table.set_max_records(records);
        self
    }

    pub fn valid_time(&self) -> u64 {
        self.default_ttl
    }

    pub fn max_records(&self) -> usize {
        self.policy.max_records
    }

    pub fn cleanup_threshold(&self) -> f64 {
        self.policy.cleanup_threshold
    }

    pub fn hash_table_max_records(&self) -> usize {
        self.hash_table.max_records()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn dir(&self) -> &Path {
        self.persistence.dir()
    }

    // == Flush ==
    /// Writes the hash table and every known namespace to disk.
    ///
    /// Each namespace is merged with its current file, pruned or discarded
    /// by the eviction policy, then rewritten. All namespaces are attempted;
    /// the first failure is returned.
    pub fn flush(&mut self) -> Result<()> {
        let now = current_timestamp();
        let mut first_error: Option<CacheError> = None;

        if self.hash_table.enforce_cap() {
            self.stats.record_hash_table_reset();
        }
        if let Err(err) = self.persistence.save_hash_table(&self.hash_table) {
            error!(error = %err, "failed to save hash table");
            first_error = first_error.or(Some(err));
        }

        for (name, store) in self.namespaces.iter_mut() {
            match self
                .persistence
                .save_namespace(name, store, &self.policy, now)
            {
                Ok(outcome) => {
                    self.stats.record_pruned(outcome.pruned());
                    if outcome.is_discarded() {
                        self.stats.record_eviction();
                    }
                }
                Err(err) => {
                    error!(namespace = %name, error = %err, "failed to save namespace");
                    first_error = first_error.or(Some(err));
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(namespaces = self.namespaces.len(), "cache flushed");
                Ok(())
            }
        }
    }

    /// Flushes and consumes the engine.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush()
    }
}

impl Drop for CacheEngine {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.flush() {
            error!(error = %err, "cache flush on drop failed, data not persisted");
        }
    }
}

// == Namespace Handle ==
/// Access to one namespace of a [`CacheEngine`].
#[derive(Debug)]
pub struct Namespace<'a> {
    engine: &'a mut CacheEngine,
    name: String,
}

impl Namespace<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, key: impl Into<LogicalKey>) -> HashKey {
        self.engine.hash_table.resolve(&key.into())
    }

    fn store(&mut self) -> &mut NamespaceStore {
        self.engine
            .namespaces
            .entry(self.name.clone())
            .or_default()
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl_seconds` (engine default when
    /// `None`), replacing any existing entry and restarting its clock.
    pub fn set<T>(
        &mut self,
        key: impl Into<LogicalKey>,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        let ttl = ttl_seconds.unwrap_or(self.engine.default_ttl);
        let hash = self.resolve(key);
        self.store().set(hash, value, ttl);
        Ok(())
    }

    // == Get ==
    /// Returns the value under `key` if present and not expired.
    ///
    /// Expired entries are removed on the way. Fails only if the stored value
    /// cannot be represented as `T`.
    pub fn get<T>(&mut self, key: impl Into<LogicalKey>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let hash = self.resolve(key);
        let lookup = self.store().get(&hash);
        match lookup {
            Lookup::Hit(value) => {
                self.engine.stats.record_hit();
                Ok(Some(serde_json::from_value(value)?))
            }
            Lookup::Expired => {
                self.engine.stats.record_expired();
                Ok(None)
            }
            Lookup::Missing | Lookup::Corrupt => {
                self.engine.stats.record_miss();
                Ok(None)
            }
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or calls `producer` once, stores
    /// its result, and returns it.
    pub fn get_or_compute<T, F>(
        &mut self,
        key: impl Into<LogicalKey>,
        ttl_seconds: Option<u64>,
        producer: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.try_get_or_compute(key, ttl_seconds, || {
            Ok::<T, std::convert::Infallible>(producer())
        })
    }

    /// Like [`get_or_compute`](Self::get_or_compute) with a fallible
    /// producer. A producer error is returned as [`CacheError::Invocation`]
    /// and nothing is stored.
    pub fn try_get_or_compute<T, E, F>(
        &mut self,
        key: impl Into<LogicalKey>,
        ttl_seconds: Option<u64>,
        producer: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let key = key.into();
        if let Some(value) = self.get(&key)? {
            return Ok(value);
        }

        let value = producer().map_err(|e| CacheError::Invocation(e.to_string()))?;
        self.set(&key, &value, ttl_seconds)?;
        Ok(value)
    }

    // == Presence / Validity ==
    /// True if an entry exists for `key`, expired or not.
    pub fn is_present(&mut self, key: impl Into<LogicalKey>) -> bool {
        let hash = self.resolve(key);
        self.store().is_present(&hash)
    }

    /// True if an entry exists for `key` and has not expired.
    pub fn is_valid(&mut self, key: impl Into<LogicalKey>) -> bool {
        let hash = self.resolve(key);
        self.store().is_valid(&hash)
    }

    // == Clear ==
    /// Removes the entry for `key`. Returns whether there was one.
    pub fn clear(&mut self, key: impl Into<LogicalKey>) -> bool {
        let hash = self.resolve(key);
        self.store().clear(&hash)
    }

    pub fn count_records(&self) -> usize {
        self.engine.count_records(Some(self.name.as_str()))
    }

    pub fn load_count(&self) -> u32 {
        self.engine.load_count(&self.name)
    }

    /// Removes expired entries now instead of waiting for the next flush.
    pub fn remove_expired(&mut self) -> usize {
        let name = self.name.clone();
        self.engine.remove_expired(&name)
    }
}
