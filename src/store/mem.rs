//! In-memory store backed by DashMap.
//!
//! The ephemeral backend: fast, quota-enforcing, with full change
//! notification between handles. All data is lost on process exit,
//! which also makes it the test double for the durable backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use dashmap::DashMap;

use crate::error::StoreError;
use crate::store::{KeyValueStore, QuotaUsage, StoreChange, StoreResult};

/// Default byte budget: mirrors the ~5 MB quota of typical web storage.
pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

struct Inner {
    data: DashMap<String, String>,
    capacity: u64,
    used: AtomicU64,
    // (handle id, sender); a handle never receives its own writes.
    subscribers: Mutex<Vec<(u64, mpsc::Sender<StoreChange>)>>,
    next_handle: AtomicU64,
}

/// Concurrent in-memory key-value store with a byte budget.
///
/// Cloning produces a new handle onto the same shared data. Each clone
/// models one execution context for change notification: a write made
/// through one handle notifies subscribers of every *other* handle.
pub struct MemKvStore {
    inner: Arc<Inner>,
    handle: u64,
}

impl MemKvStore {
    /// Create an empty store with the default byte budget.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    /// Create an empty store with an explicit byte budget.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: DashMap::new(),
                capacity,
                used: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                next_handle: AtomicU64::new(1),
            }),
            handle: 0,
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    fn entry_size(key: &str, value: &str) -> u64 {
        (key.len() + value.len()) as u64
    }

    fn notify(&self, key: &str) {
        let mut subs = self.inner.subscribers.lock().unwrap();
        subs.retain(|(handle, sender)| {
            if *handle == self.handle {
                return true;
            }
            sender
                .send(StoreChange {
                    key: key.to_string(),
                })
                .is_ok()
        });
    }
}

impl Clone for MemKvStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            handle: self.inner.next_handle.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for MemKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.data.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let new_size = Self::entry_size(key, value);
        let old_size = self
            .inner
            .data
            .get(key)
            .map(|v| Self::entry_size(key, v.value()))
            .unwrap_or(0);

        let used = self.inner.used.load(Ordering::Relaxed);
        let projected = used - old_size + new_size;
        if projected > self.inner.capacity {
            return Err(StoreError::QuotaExceeded {
                needed: new_size,
                capacity: self.inner.capacity,
            });
        }

        self.inner.data.insert(key.to_string(), value.to_string());
        self.inner.used.store(projected, Ordering::Relaxed);
        self.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        if let Some((k, v)) = self.inner.data.remove(key) {
            self.inner
                .used
                .fetch_sub(Self::entry_size(&k, &v), Ordering::Relaxed);
            self.notify(key);
        }
        Ok(())
    }

    fn quota(&self) -> StoreResult<Option<QuotaUsage>> {
        Ok(Some(QuotaUsage {
            used: self.inner.used.load(Ordering::Relaxed),
            total: self.inner.capacity,
        }))
    }

    fn subscribe(&self, sender: mpsc::Sender<StoreChange>) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((self.handle, sender));
    }
}
