//! Cache Entry Module
//!
//! Defines individual cache entries with an absolute expiry and a value held
//! either decoded, serialized, or both.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and expiry.
///
/// On disk only `validUntil` and `serialized` exist. In memory the decoded
/// value may sit next to (or instead of) its serialized text; at least one of
/// the two is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Expiration timestamp (Unix seconds)
    #[serde(rename = "validUntil")]
    pub valid_until: i64,
    /// Portable JSON text of the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    serialized: Option<String>,
    /// Materialized value, never written to disk
    #[serde(skip)]
    decoded: Option<Value>,
}

impl CacheEntry {
    // == Constructors ==
    /// Creates an entry holding a decoded value, valid for `ttl_seconds` from now.
    pub fn new(value: Value, ttl_seconds: u64) -> Self {
        Self::with_expiry(value, expiry_from_now(ttl_seconds))
    }

    /// Creates an entry holding a decoded value with an absolute expiry.
    pub fn with_expiry(value: Value, valid_until: i64) -> Self {
        Self {
            valid_until,
            serialized: None,
            decoded: Some(value),
        }
    }

    /// Creates an entry from its serialized form, as read from disk.
    pub fn from_serialized(serialized: String, valid_until: i64) -> Self {
        Self {
            valid_until,
            serialized: Some(serialized),
            decoded: None,
        }
    }

    // == Validity ==
    /// Checks if the entry is still valid at `now`.
    ///
    /// Boundary condition: an entry whose `valid_until` equals `now` is still
    /// valid; it expires once the clock moves past it.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.valid_until >= now
    }

    /// True when the entry carries something it can return.
    ///
    /// Entries read from disk without a `serialized` field fail this check.
    pub fn has_value(&self) -> bool {
        self.decoded.is_some() || self.serialized.is_some()
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn serialized(&self) -> Option<&str> {
        self.serialized.as_deref()
    }

    // == Materialize ==
    /// Returns the decoded value, parsing the serialized form on first access
    /// and caching the result in the entry.
    pub fn materialize(&mut self) -> serde_json::Result<&Value> {
        let value = match self.decoded.take() {
            Some(value) => value,
            None => serde_json::from_str(self.serialized.as_deref().unwrap_or("null"))?,
        };
        Ok(self.decoded.insert(value))
    }

    // == Freeze ==
    /// Serializes the decoded value (if any) and drops the decoded copy so the
    /// entry is in its on-disk shape.
    pub fn freeze(&mut self) -> serde_json::Result<()> {
        if let Some(value) = self.decoded.take() {
            match serde_json::to_string(&value) {
                Ok(text) => self.serialized = Some(text),
                Err(err) => {
                    self.decoded = Some(value);
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Absolute expiry for a TTL starting now.
pub fn expiry_from_now(ttl_seconds: u64) -> i64 {
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    current_timestamp().saturating_add(ttl)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new(json!("test_value"), 60);

        assert!(entry.is_decoded());
        assert!(entry.serialized().is_none());
        assert!(entry.is_valid_at(current_timestamp()));
        assert!(entry.has_value());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(json!(1), 1);
        assert!(entry.is_valid_at(current_timestamp()));

        // Second granularity: wait until the clock is past valid_until
        sleep(Duration::from_millis(2100));

        assert!(!entry.is_valid_at(current_timestamp()));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp();
        let entry = CacheEntry::with_expiry(json!("x"), now);

        assert!(entry.is_valid_at(now), "Entry is valid at its expiry second");
        assert!(!entry.is_valid_at(now + 1));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new(json!(1), u64::MAX);
        assert_eq!(entry.valid_until, i64::MAX);
        assert!(entry.is_valid_at(current_timestamp()));
    }

    #[test]
    fn test_freeze_then_materialize() {
        let mut entry = CacheEntry::new(json!({"a": [1, 2, 3]}), 60);

        entry.freeze().unwrap();
        assert!(!entry.is_decoded());
        assert_eq!(entry.serialized(), Some(r#"{"a":[1,2,3]}"#));

        let value = entry.materialize().unwrap().clone();
        assert_eq!(value, json!({"a": [1, 2, 3]}));
        // Decoded form is cached alongside the serialized one
        assert!(entry.is_decoded());
        assert!(entry.serialized().is_some());
    }

    #[test]
    fn test_materialize_corrupt_serialized() {
        let mut entry = CacheEntry::from_serialized("{not json".to_string(), i64::MAX);
        assert!(entry.materialize().is_err());
    }

    #[test]
    fn test_disk_shape() {
        let mut entry = CacheEntry::with_expiry(json!("hello"), 1_700_000_000);
        entry.freeze().unwrap();

        let text = serde_json::to_string(&entry).unwrap();
        assert_eq!(text, r#"{"validUntil":1700000000,"serialized":"\"hello\""}"#);

        let back: CacheEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(back.valid_until, 1_700_000_000);
        assert_eq!(back.serialized(), Some("\"hello\""));
        assert!(!back.is_decoded());
    }

    #[test]
    fn test_record_without_serialized_has_no_value() {
        let back: CacheEntry = serde_json::from_str(r#"{"validUntil":5}"#).unwrap();
        assert!(!back.has_value());
    }
}
