//! ACID-durable key-value store backed by redb.
//!
//! Used for ledger and scenario payloads that must survive restarts.
//! All writes go through transactions; reads use MVCC snapshots. The
//! byte budget is enforced before commit so a quota failure leaves the
//! stored payload untouched.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::store::{KeyValueStore, QuotaUsage, StoreChange, StoreResult};

/// Single table holding all namespaced keys.
const KV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("kv");

/// Default byte budget for the durable backend.
pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

struct Inner {
    db: Database,
    capacity: u64,
    used: AtomicU64,
    subscribers: Mutex<Vec<(u64, mpsc::Sender<StoreChange>)>>,
    next_handle: AtomicU64,
}

/// ACID-durable store using redb, with the same handle/notification
/// semantics as [`crate::store::MemKvStore`].
pub struct RedbKvStore {
    inner: Arc<Inner>,
    handle: u64,
}

impl RedbKvStore {
    /// Open or create a durable store in the given directory with the
    /// default byte budget.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        Self::open_with_capacity(data_dir, DEFAULT_CAPACITY_BYTES)
    }

    /// Open or create a durable store with an explicit byte budget.
    pub fn open_with_capacity(data_dir: &Path, capacity: u64) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("augur.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Ensure the table exists so later reads never race its creation,
        // and measure the bytes already stored.
        let txn = db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        let used = {
            let table = txn.open_table(KV_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            let mut used = 0u64;
            let iter = table.iter().map_err(|e| StoreError::Redb {
                message: format!("iter failed: {e}"),
            })?;
            for entry in iter {
                let (k, v) = entry.map_err(|e| StoreError::Redb {
                    message: format!("scan failed: {e}"),
                })?;
                used += (k.value().len() + v.value().len()) as u64;
            }
            used
        };
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                capacity,
                used: AtomicU64::new(used),
                subscribers: Mutex::new(Vec::new()),
                next_handle: AtomicU64::new(1),
            }),
            handle: 0,
        })
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

impl Clone for RedbKvStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            handle: self.inner.next_handle.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl KeyValueStore for RedbKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let txn = self.inner.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(KV_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let result = table.get(key).map_err(|e| StoreError::Redb {
            message: format!("get failed: {e}"),
        })?;
        Ok(result.map(|guard| guard.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let new_size = (key.len() + value.len()) as u64;
        let txn = self.inner.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        let projected = {
            let mut table = txn.open_table(KV_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            let old_size = table
                .get(key)
                .map_err(|e| StoreError::Redb {
                    message: format!("get failed: {e}"),
                })?
                .map(|guard| (key.len() + guard.value().len()) as u64)
                .unwrap_or(0);

            let used = self.inner.used.load(Ordering::Relaxed);
            let projected = used - old_size + new_size;
            if projected > self.inner.capacity {
                // Dropping the uncommitted transaction aborts it.
                return Err(StoreError::QuotaExceeded {
                    needed: new_size,
                    capacity: self.inner.capacity,
                });
            }

            table.insert(key, value).map_err(|e| StoreError::Redb {
                message: format!("insert failed: {e}"),
            })?;
            projected
        };
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        self.inner.used.store(projected, Ordering::Relaxed);
        self.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let txn = self.inner.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        let freed = {
            let mut table = txn.open_table(KV_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            let removed = table.remove(key).map_err(|e| StoreError::Redb {
                message: format!("remove failed: {e}"),
            })?;
            removed.map(|guard| (key.len() + guard.value().len()) as u64)
        };
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        if let Some(freed) = freed {
            self.inner.used.fetch_sub(freed, Ordering::Relaxed);
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

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore")
            .field("handle", &self.handle)
            .finish()
    }
}
