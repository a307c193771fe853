//! Run ledger: durable, deduplicated, capacity-bounded record of analysis runs.
//!
//! The ledger is the single choke point for the `augur:runs` store key;
//! no other code reads or writes it. It keeps an in-memory mirror of the
//! stored array for the current session; every mutation prunes the
//! mirror to the retention limits and persists the pruned set.
//!
//! A persisted write that trips the store quota is retried once with a
//! drastically reduced record count, then dropped — data loss is
//! confined to the persisted copy, never the session mirror.

use std::sync::{Arc, Mutex, mpsc};

use crate::error::LedgerError;
use crate::model::RunRecord;
use crate::notify::{ChangeHub, LedgerEvent};
use crate::store::{KeyValueStore, StoreChange};

/// Maximum stored records, pinned included.
pub const MAX_TOTAL: usize = 20;
/// Maximum pinned records exempt from capacity pruning.
pub const MAX_PINNED: usize = 5;
/// Record count for the single reduced retry after a quota failure.
pub const QUOTA_RETRY_COUNT: usize = 10;
/// The one namespaced key holding the JSON array of all records.
pub const RUNS_KEY: &str = "augur:runs";

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Outcome of [`RunLedger::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Whether the record was merged into an existing one by content hash.
    pub merged: bool,
}

// ---------------------------------------------------------------------------
// Retention policy
// ---------------------------------------------------------------------------

/// Capacity limits applied before every persisted write.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_total: usize,
    pub max_pinned: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_total: MAX_TOTAL,
            max_pinned: MAX_PINNED,
        }
    }
}

impl RetentionPolicy {
    /// Prune a record set to the retention limits.
    ///
    /// Pinned records sorted newest-first and truncated to `max_pinned`;
    /// the most recent unpinned records fill the remaining slots up to
    /// `max_total`. The kept set is re-sorted by `createdAt` descending.
    pub fn prune(&self, records: Vec<RunRecord>) -> Vec<RunRecord> {
        let (mut pinned, mut unpinned): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.is_pinned);

        sort_newest_first(&mut pinned);
        pinned.truncate(self.max_pinned);

        sort_newest_first(&mut unpinned);
        unpinned.truncate(self.max_total.saturating_sub(pinned.len()));

        let mut kept = pinned;
        kept.extend(unpinned);
        sort_newest_first(&mut kept);
        kept
    }
}

fn sort_newest_first(records: &mut [RunRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

// ---------------------------------------------------------------------------
// Run ledger
// ---------------------------------------------------------------------------

/// Repository owning all reads and writes of the run-ledger store key.
///
/// Each ledger should own its *own handle* of the underlying store
/// (clone the concrete store before wrapping it in `Arc`): change
/// notification is per-handle, so a ledger hears writes from other
/// contexts but never its own.
pub struct RunLedger {
    store: Arc<dyn KeyValueStore>,
    records: Mutex<Vec<RunRecord>>,
    policy: RetentionPolicy,
    hub: ChangeHub,
    store_changes: Mutex<mpsc::Receiver<StoreChange>>,
}

impl RunLedger {
    /// Open a ledger over the given store handle.
    ///
    /// An empty, missing, or corrupt persisted payload recovers to an
    /// empty ledger with a warning — never an error.
    pub fn open(store: Arc<dyn KeyValueStore>, policy: RetentionPolicy) -> Self {
        let records = load_records(store.as_ref());
        let (tx, rx) = mpsc::channel();
        store.subscribe(tx);
        Self {
            store,
            records: Mutex::new(records),
            policy,
            hub: ChangeHub::new(),
            store_changes: Mutex::new(rx),
        }
    }

    /// Record a completed analysis run.
    ///
    /// If the record carries a `contentHash` matching a stored record,
    /// the stored record is kept: its timestamp is refreshed to the new
    /// run's, it is flagged a duplicate, its count incremented, and it
    /// moves to the front of recency order. Otherwise the record is
    /// inserted at the front. Either way the result is persisted.
    pub fn add(&self, record: RunRecord) -> LedgerResult<AddOutcome> {
        let mut records = self.records.lock().unwrap();

        let existing_pos = record.content_hash.as_deref().and_then(|hash| {
            records
                .iter()
                .position(|r| r.content_hash.as_deref() == Some(hash))
        });

        let merged = match existing_pos {
            Some(pos) => {
                let mut kept = records.remove(pos);
                kept.created_at = record.created_at;
                kept.is_duplicate = true;
                let count = kept.duplicate_count.unwrap_or(1) + 1;
                kept.duplicate_count = Some(count);
                tracing::debug!(id = %kept.id, count, "merged duplicate run");
                records.insert(0, kept);
                true
            }
            None => {
                records.insert(0, record);
                false
            }
        };

        self.persist(&mut records)?;
        Ok(AddOutcome { merged })
    }

    /// All records, most recent first.
    pub fn list(&self) -> Vec<RunRecord> {
        let mut records = self.records.lock().unwrap().clone();
        sort_newest_first(&mut records);
        records
    }

    /// Look up a record by id. `None` is the explicit not-found value.
    pub fn get(&self, id: &str) -> Option<RunRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Flip a record's pin flag and persist. Returns the new state.
    pub fn toggle_pin(&self, id: &str) -> LedgerResult<bool> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| LedgerError::RunNotFound { id: id.to_string() })?;
        record.is_pinned = !record.is_pinned;
        let pinned = record.is_pinned;
        self.persist(&mut records)?;
        Ok(pinned)
    }

    /// Remove a record unconditionally, pinned or not.
    ///
    /// Returns whether the id existed; deleting an unknown id is a no-op.
    pub fn delete(&self, id: &str) -> LedgerResult<bool> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.persist(&mut records)?;
        Ok(true)
    }

    /// Refresh the session mirror from the store.
    pub fn reload(&self) {
        *self.records.lock().unwrap() = load_records(self.store.as_ref());
    }

    /// Subscribe to ledger change events.
    pub fn subscribe(&self) -> mpsc::Receiver<LedgerEvent> {
        self.hub.subscribe()
    }

    /// Drain pending store notifications from other contexts.
    ///
    /// When the ledger key changed externally, the mirror is refreshed
    /// and an [`LedgerEvent::External`] is published. Returns whether a
    /// refresh happened. There is no background scheduler — callers
    /// invoke this from their own loop.
    pub fn poll_external(&self) -> bool {
        let changed = {
            let rx = self.store_changes.lock().unwrap();
            let mut changed = false;
            while let Ok(change) = rx.try_recv() {
                if change.key == RUNS_KEY {
                    changed = true;
                }
            }
            changed
        };
        if changed {
            self.reload();
            self.hub.publish(&LedgerEvent::External {
                key: RUNS_KEY.to_string(),
            });
        }
        changed
    }

    /// Prune the mirror, persist it, and announce the change.
    ///
    /// Invoked before every persisted write. Quota failures retry once
    /// with the newest `QUOTA_RETRY_COUNT` records, then drop the write.
    fn persist(&self, records: &mut Vec<RunRecord>) -> LedgerResult<()> {
        *records = self.policy.prune(std::mem::take(records));

        let payload = match serde_json::to_string(&*records) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "run ledger serialization failed, dropping write");
                return Ok(());
            }
        };

        match self.store.set(RUNS_KEY, &payload) {
            Ok(()) => {
                self.hub.publish(&LedgerEvent::Changed);
                Ok(())
            }
            Err(e) if e.is_quota_exceeded() => {
                tracing::warn!(
                    records = records.len(),
                    retry_count = QUOTA_RETRY_COUNT,
                    "run ledger write exceeded quota, retrying reduced"
                );
                self.persist_reduced(records)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn persist_reduced(&self, records: &[RunRecord]) -> LedgerResult<()> {
        let reduced: Vec<&RunRecord> = records.iter().take(QUOTA_RETRY_COUNT).collect();
        let payload = match serde_json::to_string(&reduced) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "run ledger serialization failed, dropping write");
                return Ok(());
            }
        };
        match self.store.set(RUNS_KEY, &payload) {
            Ok(()) => {
                self.hub.publish(&LedgerEvent::Changed);
                Ok(())
            }
            Err(e) => {
                // Session mirror keeps the full set; only the persisted copy is stale.
                tracing::warn!(error = %e, "dropping run ledger write after quota retry");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for RunLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLedger")
            .field("records", &self.records.lock().unwrap().len())
            .field("policy", &self.policy)
            .finish()
    }
}

fn load_records(store: &dyn KeyValueStore) -> Vec<RunRecord> {
    match store.get(RUNS_KEY) {
        Ok(Some(payload)) => match serde_json::from_str::<Vec<RunRecord>>(&payload) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "corrupt run ledger payload, starting empty");
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read run ledger, starting empty");
            Vec::new()
        }
    }
}
