//! JSON Disk Cache - A namespaced key/value cache persisted as JSON files
//!
//! Provides per-entry TTL, short hashed keys, and threshold eviction, with
//! state surviving process restarts.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheEngine, KeyPart, LogicalKey, Namespace};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
