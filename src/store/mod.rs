//! Durable key-value storage for ledger and scenario payloads.
//!
//! The ledger core never talks to a concrete database — it consumes the
//! [`KeyValueStore`] contract: namespaced string keys, a quota-exceeded
//! failure distinguishable from other failures, an approximate quota
//! query, and a change notification fired when another handle of the
//! same store modifies a key.
//!
//! Two backends satisfy the contract:
//!
//! - [`MemKvStore`] — DashMap-backed, ephemeral (tests and `--data-dir`-less runs)
//! - [`RedbKvStore`] — ACID transactions via redb

pub mod durable;
pub mod mem;

pub use durable::RedbKvStore;
pub use mem::MemKvStore;

use std::sync::mpsc;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Approximate storage usage, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used: u64,
    pub total: u64,
}

impl QuotaUsage {
    /// Used fraction as a percentage in [0, 100].
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.used as f64 / self.total as f64) * 100.0
    }
}

/// Notification that a key was modified by another handle of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
}

/// Contract every conforming store backend must satisfy.
///
/// All operations are synchronous and complete in bounded time. `set`
/// must raise [`StoreError::QuotaExceeded`] — and nothing else — when a
/// write would exceed the byte budget, so callers can tell quota
/// exhaustion apart from genuine failures.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or replace a value, enforcing the byte budget.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Approximate quota usage; `Ok(None)` when the backend cannot measure.
    fn quota(&self) -> StoreResult<Option<QuotaUsage>>;

    /// Register a listener for changes made through *other* handles.
    ///
    /// A handle never hears its own writes. Disconnected listeners are
    /// dropped on the next notification.
    fn subscribe(&self, sender: mpsc::Sender<StoreChange>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_percentage() {
        let usage = QuotaUsage {
            used: 850,
            total: 1000,
        };
        assert!((usage.percentage() - 85.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_quota_reads_as_full() {
        let usage = QuotaUsage { used: 0, total: 0 };
        assert_eq!(usage.percentage(), 100.0);
    }
}
