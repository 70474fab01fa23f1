//! Eviction Policy Module
//!
//! Bounds namespace size before it is persisted: first prune expired entries
//! once a threshold is crossed, then discard the whole namespace if it is
//! still over capacity.

use tracing::{debug, warn};

use crate::cache::namespace::NamespaceStore;

// == Eviction Outcome ==
/// What the policy did to a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionOutcome {
    /// Below the cleanup threshold, nothing inspected
    Untouched,
    /// Expired entries removed; namespace is within capacity
    Pruned(usize),
    /// Still over capacity after pruning; every entry dropped
    Discarded { pruned: usize, dropped: usize },
}

impl EvictionOutcome {
    pub fn is_discarded(&self) -> bool {
        matches!(self, EvictionOutcome::Discarded { .. })
    }

    /// Number of expired entries removed by the soft prune.
    pub fn pruned(&self) -> usize {
        match *self {
            EvictionOutcome::Untouched => 0,
            EvictionOutcome::Pruned(n) => n,
            EvictionOutcome::Discarded { pruned, .. } => pruned,
        }
    }
}

// == Eviction Policy ==
/// Two-stage threshold eviction.
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Records allowed per namespace
    pub max_records: usize,
    /// Fraction of `max_records` that triggers pruning
    pub cleanup_threshold: f64,
}

impl EvictionPolicy {
    pub fn new(max_records: usize, cleanup_threshold: f64) -> Self {
        Self {
            max_records,
            cleanup_threshold,
        }
    }

    /// Record count above which expired entries are pruned.
    pub fn cleanup_trigger(&self) -> usize {
        (self.max_records as f64 * self.cleanup_threshold).floor() as usize
    }

    // == Apply ==
    /// Runs the policy against `store` as of `now`.
    pub fn apply(&self, name: &str, store: &mut NamespaceStore, now: i64) -> EvictionOutcome {
        let mut pruned = 0;
        if store.len() > self.cleanup_trigger() {
            pruned = store.remove_expired_at(now);
            debug!(namespace = name, pruned, "pruned expired entries");
        }

        if store.len() > self.max_records {
            let dropped = store.len();
            warn!(
                namespace = name,
                records = dropped,
                max_records = self.max_records,
                "namespace over capacity with valid entries, discarding"
            );
            store.reset();
            return EvictionOutcome::Discarded { pruned, dropped };
        }

        if pruned > 0 || store.len() > self.cleanup_trigger() {
            EvictionOutcome::Pruned(pruned)
        } else {
            EvictionOutcome::Untouched
        }
    }
}
