//! Persistence and recovery tests for the run ledger.
//!
//! These tests verify that ledger state survives a store reopen (the
//! durable backend) and that corrupt persisted payloads recover to an
//! empty ledger without poisoning later writes.

use std::sync::Arc;

use augur::ledger::{RUNS_KEY, RetentionPolicy, RunLedger};
use augur::model::RunRecord;
use augur::store::{KeyValueStore, RedbKvStore};

fn record(id: &str, created_at: u64) -> RunRecord {
    RunRecord {
        id: id.to_string(),
        created_at,
        ..RunRecord::new(0)
    }
}

fn open_ledger(dir: &std::path::Path) -> RunLedger {
    let store = RedbKvStore::open(dir).unwrap();
    RunLedger::open(Arc::new(store), RetentionPolicy::default())
}

#[test]
fn runs_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let ledger = open_ledger(dir.path());
        ledger.add(record("a", 100)).unwrap();
        ledger.add(record("b", 200)).unwrap();
    }

    let ledger = open_ledger(dir.path());
    let ids: Vec<_> = ledger.list().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn pin_and_duplicate_state_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let ledger = open_ledger(dir.path());
        let mut hashed = record("a", 100);
        hashed.content_hash = Some("h1".into());
        ledger.add(hashed).unwrap();

        let mut again = record("b", 200);
        again.content_hash = Some("h1".into());
        ledger.add(again).unwrap();

        ledger.toggle_pin("a").unwrap();
    }

    let ledger = open_ledger(dir.path());
    let restored = ledger.get("a").unwrap();
    assert!(restored.is_pinned);
    assert!(restored.is_duplicate);
    assert_eq!(restored.duplicate_count, Some(2));
}

#[test]
fn corrupt_persisted_payload_recovers_and_heals() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = RedbKvStore::open(dir.path()).unwrap();
        store.set(RUNS_KEY, "not json{").unwrap();
    }

    // Corrupt bytes read as an empty ledger, not a failure.
    let ledger = open_ledger(dir.path());
    assert!(ledger.list().is_empty());

    // The next write replaces the corrupt payload with a clean one.
    ledger.add(record("fresh", 100)).unwrap();
    drop(ledger);

    let ledger = open_ledger(dir.path());
    let records = ledger.list();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "fresh");
}

#[test]
fn tighter_retention_applies_on_next_write() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let ledger = open_ledger(dir.path());
        for i in 0..10u64 {
            ledger.add(record(&format!("r{i}"), i)).unwrap();
        }
    }

    // Reopen with a smaller budget: pruning applies on the next persist.
    let store = RedbKvStore::open(dir.path()).unwrap();
    let ledger = RunLedger::open(
        Arc::new(store),
        RetentionPolicy {
            max_total: 3,
            max_pinned: 1,
        },
    );
    assert_eq!(ledger.list().len(), 10);

    ledger.add(record("newest", 100)).unwrap();
    let ids: Vec<_> = ledger.list().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["newest", "r9", "r8"]);
}
