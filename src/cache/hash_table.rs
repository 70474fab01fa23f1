//! Hash Table Module
//!
//! Resolves logical keys to short hash keys and remembers the mapping in a
//! table shared by every namespace.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cache::key::{HashKey, LogicalKey};

/// Length in hex characters of every hash key.
pub const HASH_KEY_LENGTH: usize = 40;

// == Hash Table ==
/// Bidirectional logical-key/hash-key table.
///
/// `reverse` (hash → logical key) is what gets persisted; `forward` is an
/// index rebuilt from it so resolution does not scan the table. A logical key
/// already present keeps its recorded hash even if it would hash differently
/// today.
#[derive(Debug, Default)]
pub struct HashTable {
    reverse: HashMap<HashKey, String>,
    forward: HashMap<String, HashKey>,
    max_records: usize,
}

impl HashTable {
    // == Constructor ==
    /// Creates an empty table capped at `max_records`.
    pub fn new(max_records: usize) -> Self {
        Self {
            reverse: HashMap::new(),
            forward: HashMap::new(),
            max_records,
        }
    }

    /// Rebuilds a table from its persisted reverse mapping.
    ///
    /// When one logical key is recorded under several hashes, the smallest
    /// hash wins so the choice does not depend on map iteration order.
    pub fn from_reverse(reverse: HashMap<HashKey, String>, max_records: usize) -> Self {
        let mut forward: HashMap<String, HashKey> = HashMap::with_capacity(reverse.len());
        for (hash, logical) in &reverse {
            forward
                .entry(logical.clone())
                .and_modify(|current| {
                    if *hash < *current {
                        *current = hash.clone();
                    }
                })
                .or_insert_with(|| hash.clone());
        }

        Self {
            reverse,
            forward,
            max_records,
        }
    }

    // == Resolve ==
    /// Returns the hash key for `key`, recording it on first sight.
    pub fn resolve(&mut self, key: &LogicalKey) -> HashKey {
        self.resolve_normalized(&key.normalize())
    }

    /// Same as [`resolve`](Self::resolve) for an already-normalized key.
    pub fn resolve_normalized(&mut self, normalized: &str) -> HashKey {
        if let Some(hash) = self.forward.get(normalized) {
            return hash.clone();
        }

        let hash = hash_key(normalized);
        debug!(hash = %hash, "recording new logical key");
        self.reverse.insert(hash.clone(), normalized.to_string());
        self.forward.insert(normalized.to_string(), hash.clone());
        hash
    }

    // == Lookup ==
    /// Returns the logical key recorded for `hash`.
    pub fn lookup(&self, hash: &str) -> Option<&str> {
        self.reverse.get(hash).map(String::as_str)
    }

    // == Cap ==
    /// Empties the table if it grew past its cap. Returns whether it did.
    pub fn enforce_cap(&mut self) -> bool {
        if self.reverse.len() <= self.max_records {
            return false;
        }
        info!(
            records = self.reverse.len(),
            max_records = self.max_records,
            "hash table over capacity, resetting"
        );
        self.reverse.clear();
        self.forward.clear();
        true
    }

    pub fn set_max_records(&mut self, max_records: usize) {
        self.max_records = max_records;
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// The persisted hash → logical key mapping.
    pub fn reverse_table(&self) -> &HashMap<HashKey, String> {
        &self.reverse
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

// == Hashing ==
/// One-way hash of a normalized logical key: hex SHA-256 cut to
/// [`HASH_KEY_LENGTH`] characters.
pub fn hash_key(normalized: &str) -> HashKey {
    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_KEY_LENGTH);
    hex
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_shape() {
        let hash = hash_key("hello");
        assert_eq!(hash.len(), HASH_KEY_LENGTH);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, hash_key("hello"));
        assert_ne!(hash, hash_key("hello "));
    }

    #[test]
    fn test_resolve_records_key() {
        let mut table = HashTable::new(10);

        let hash = table.resolve(&LogicalKey::from("integer"));

        assert_eq!(hash, hash_key(r#""integer""#));
        assert_eq!(table.lookup(&hash), Some(r#""integer""#));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_resolve_same_composite_key_twice() {
        let mut table = HashTable::new(10);

        let first = table.resolve(&LogicalKey::from(("user", 159)));
        let second = table.resolve(&LogicalKey::from(("user", 159)));

        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_recorded_hash_wins_over_recomputed() {
        let mut reverse = HashMap::new();
        reverse.insert("legacyhash".to_string(), r#""integer""#.to_string());
        let mut table = HashTable::from_reverse(reverse, 10);

        assert_eq!(table.resolve(&LogicalKey::from("integer")), "legacyhash");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_logical_key_smallest_hash_wins() {
        let mut reverse = HashMap::new();
        reverse.insert("bbb".to_string(), "same".to_string());
        reverse.insert("aaa".to_string(), "same".to_string());
        let mut table = HashTable::from_reverse(reverse, 10);

        assert_eq!(table.resolve_normalized("same"), "aaa");
    }

    #[test]
    fn test_enforce_cap_resets_when_over() {
        let mut table = HashTable::new(2);
        table.resolve_normalized("a");
        table.resolve_normalized("b");
        assert!(!table.enforce_cap(), "At the cap is not over it");

        table.resolve_normalized("c");
        assert!(table.enforce_cap());
        assert!(table.is_empty());

        // Resolution after a reset yields the same hash again
        assert_eq!(table.resolve_normalized("a"), hash_key("a"));
    }
}
