//! Namespace Store Module
//!
//! In-memory entries of a single namespace, keyed by hash key.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::warn;

use crate::cache::entry::{current_timestamp, CacheEntry};
use crate::cache::key::HashKey;

// == Lookup Outcome ==
/// Result of reading one hash key from a namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Entry present and valid
    Hit(Value),
    /// No entry
    Missing,
    /// Entry was stale and has been removed
    Expired,
    /// Serialized form could not be parsed; entry removed
    Corrupt,
}

// == Namespace Store ==
/// Entries of one namespace plus how often it has been read from disk.
///
/// Keys removed since the last load or save are remembered so that merging
/// the file back in does not resurrect them.
#[derive(Debug, Default)]
pub struct NamespaceStore {
    entries: HashMap<HashKey, CacheEntry>,
    removed: HashSet<HashKey>,
    load_count: u32,
}

impl NamespaceStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores a decoded value valid for `ttl_seconds` from now, replacing any
    /// existing entry.
    pub fn set(&mut self, hash: HashKey, value: Value, ttl_seconds: u64) {
        self.insert(hash, CacheEntry::new(value, ttl_seconds));
    }

    /// Inserts a prepared entry as-is.
    pub fn insert(&mut self, hash: HashKey, entry: CacheEntry) {
        self.removed.remove(&hash);
        self.entries.insert(hash, entry);
    }

    fn remove(&mut self, hash: &str) -> bool {
        if self.entries.remove(hash).is_some() {
            self.removed.insert(hash.to_string());
            true
        } else {
            false
        }
    }

    // == Get ==
    /// Reads `hash`, enforcing expiry lazily and materializing the value.
    pub fn get(&mut self, hash: &str) -> Lookup {
        self.get_at(hash, current_timestamp())
    }

    pub(crate) fn get_at(&mut self, hash: &str, now: i64) -> Lookup {
        let Some(entry) = self.entries.get_mut(hash) else {
            return Lookup::Missing;
        };

        if !entry.is_valid_at(now) {
            self.remove(hash);
            return Lookup::Expired;
        }

        match entry.materialize().map(Value::clone) {
            Ok(value) => Lookup::Hit(value),
            Err(err) => {
                warn!(hash, error = %err, "dropping cache entry with unreadable value");
                self.remove(hash);
                Lookup::Corrupt
            }
        }
    }

    // == Presence / Validity ==
    /// True if an entry exists, regardless of expiry.
    pub fn is_present(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    /// True if an entry exists and has not expired.
    pub fn is_valid(&self, hash: &str) -> bool {
        self.is_valid_at(hash, current_timestamp())
    }

    pub(crate) fn is_valid_at(&self, hash: &str, now: i64) -> bool {
        self.entries
            .get(hash)
            .is_some_and(|entry| entry.is_valid_at(now))
    }

    // == Clear ==
    /// Removes an entry. Returns whether it existed.
    pub fn clear(&mut self, hash: &str) -> bool {
        self.remove(hash)
    }

    /// Drops every entry, along with any memory of removals.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.removed.clear();
    }

    // == Remove Expired ==
    /// Removes every entry that expired before `now`. Returns how many went.
    pub fn remove_expired_at(&mut self, now: i64) -> usize {
        let expired: Vec<HashKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_valid_at(now))
            .map(|(hash, _)| hash.clone())
            .collect();

        for hash in &expired {
            self.remove(hash);
        }
        expired.len()
    }

    // == Merge ==
    /// Lays `older` underneath the current entries: keys already in memory
    /// keep their in-memory entry, keys removed in memory stay removed.
    pub fn merge_underneath(&mut self, older: HashMap<HashKey, CacheEntry>) {
        for (hash, entry) in older {
            if self.removed.contains(&hash) {
                continue;
            }
            self.entries.entry(hash).or_insert(entry);
        }
    }

    /// Replaces all entries, e.g. after reading the namespace file.
    pub fn replace_entries(&mut self, entries: HashMap<HashKey, CacheEntry>) {
        self.entries = entries;
        self.removed.clear();
    }

    /// Forgets removals once the file reflects them.
    pub(crate) fn mark_persisted(&mut self) {
        self.removed.clear();
    }

    // == Freeze ==
    /// Serializes every decoded value and drops the decoded copies.
    pub fn freeze(&mut self) -> serde_json::Result<()> {
        for entry in self.entries.values_mut() {
            entry.freeze()?;
        }
        Ok(())
    }

    pub fn entries(&self) -> &HashMap<HashKey, CacheEntry> {
        &self.entries
    }

    // == Load Bookkeeping ==
    pub fn is_loaded(&self) -> bool {
        self.load_count > 0
    }

    pub fn load_count(&self) -> u32 {
        self.load_count
    }

    pub(crate) fn record_load(&mut self) {
        self.load_count += 1;
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn entry(value: Value, valid_until: i64) -> CacheEntry {
        CacheEntry::with_expiry(value, valid_until)
    }

    #[test]
    fn test_store_new() {
        let store = NamespaceStore::new();
        assert!(store.is_empty());
        assert!(!store.is_loaded());
        assert_eq!(store.load_count(), 0);
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = NamespaceStore::new();

        store.set("h1".to_string(), json!("value1"), 60);

        assert_eq!(store.get("h1"), Lookup::Hit(json!("value1")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = NamespaceStore::new();
        assert_eq!(store.get("missing"), Lookup::Missing);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = NamespaceStore::new();

        store.set("h1".to_string(), json!(1), 60);
        store.set("h1".to_string(), json!(2), 60);

        assert_eq!(store.get("h1"), Lookup::Hit(json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_removes_expired() {
        let mut store = NamespaceStore::new();
        store.insert("old".to_string(), entry(json!(1), NOW - 1));

        assert!(store.is_present("old"));
        assert!(!store.is_valid_at("old", NOW));
        assert_eq!(store.get_at("old", NOW), Lookup::Expired);
        assert!(!store.is_present("old"));
    }

    #[test]
    fn test_store_get_materializes_serialized() {
        let mut store = NamespaceStore::new();
        store.insert(
            "h".to_string(),
            CacheEntry::from_serialized(r#"[1,"two"]"#.to_string(), NOW + 10),
        );

        assert_eq!(store.get_at("h", NOW), Lookup::Hit(json!([1, "two"])));
        assert!(store.entries()["h"].is_decoded());
    }

    #[test]
    fn test_store_get_corrupt_serialized() {
        let mut store = NamespaceStore::new();
        store.insert(
            "h".to_string(),
            CacheEntry::from_serialized("{oops".to_string(), NOW + 10),
        );

        assert_eq!(store.get_at("h", NOW), Lookup::Corrupt);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_clear() {
        let mut store = NamespaceStore::new();
        store.set("h1".to_string(), json!(1), 60);

        assert!(store.clear("h1"));
        assert!(!store.clear("h1"));
        assert_eq!(store.get("h1"), Lookup::Missing);
    }

    #[test]
    fn test_store_remove_expired() {
        let mut store = NamespaceStore::new();
        store.insert("a".to_string(), entry(json!(1), NOW - 5));
        store.insert("b".to_string(), entry(json!(2), NOW));
        store.insert("c".to_string(), entry(json!(3), NOW + 5));

        assert_eq!(store.remove_expired_at(NOW), 1);
        assert_eq!(store.len(), 2);
        assert!(!store.is_present("a"));
    }

    #[test]
    fn test_store_merge_underneath_keeps_memory() {
        let mut store = NamespaceStore::new();
        store.insert("shared".to_string(), entry(json!("memory"), NOW + 10));

        let mut disk = HashMap::new();
        disk.insert(
            "shared".to_string(),
            CacheEntry::from_serialized("\"disk\"".to_string(), NOW + 10),
        );
        disk.insert(
            "other".to_string(),
            CacheEntry::from_serialized("\"disk only\"".to_string(), NOW + 10),
        );
        store.merge_underneath(disk);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_at("shared", NOW), Lookup::Hit(json!("memory")));
        assert_eq!(store.get_at("other", NOW), Lookup::Hit(json!("disk only")));
    }

    #[test]
    fn test_store_merge_skips_removed_keys() {
        let mut store = NamespaceStore::new();
        store.insert("cleared".to_string(), entry(json!(1), NOW + 10));
        store.insert("stale".to_string(), entry(json!(2), NOW - 10));
        assert!(store.clear("cleared"));
        assert_eq!(store.get_at("stale", NOW), Lookup::Expired);

        let mut disk = HashMap::new();
        disk.insert("cleared".to_string(), entry(json!(1), NOW + 10));
        disk.insert("stale".to_string(), entry(json!(2), NOW - 10));
        store.merge_underneath(disk.clone());
        assert!(store.is_empty());

        store.mark_persisted();
        store.merge_underneath(disk);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_freeze() {
        let mut store = NamespaceStore::new();
        store.set("h".to_string(), json!({"k": [1, 2]}), 60);

        store.freeze().unwrap();

        let frozen = &store.entries()["h"];
        assert!(!frozen.is_decoded());
        assert_eq!(frozen.serialized(), Some(r#"{"k":[1,2]}"#));
    }

    #[test]
    fn test_store_load_count() {
        let mut store = NamespaceStore::new();
        store.record_load();
        store.record_load();
        assert!(store.is_loaded());
        assert_eq!(store.load_count(), 2);
    }
}
