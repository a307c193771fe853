//! # augur
//!
//! Run ledger and graph-diff engine for causal decision graphs.
//!
//! Users of a decision-graph editor run probabilistic analyses against
//! their graph; augur durably records every run, deduplicates identical
//! results by content hash, enforces retention limits, and computes
//! structural and numeric differences between any two runs.
//!
//! ## Architecture
//!
//! - **Run ledger** (`ledger`): append, dedup-by-hash, pin, prune, retrieve
//! - **Graph diff** (`diff`): per-entity add/remove/modify + ranked edge deltas
//! - **Outcome bands** (`bands`): (p10, p50, p90) extraction and formatting
//! - **Scenario guard** (`scenario`): quota-aware saves with export fallback
//! - **Storage** (`store`): key-value contract with mem (DashMap) and redb backends
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use augur::ledger::{RetentionPolicy, RunLedger};
//! use augur::model::RunRecord;
//! use augur::store::MemKvStore;
//!
//! let ledger = RunLedger::open(Arc::new(MemKvStore::new()), RetentionPolicy::default());
//! let outcome = ledger.add(RunRecord::new(42)).unwrap();
//! assert!(!outcome.merged);
//! ```

pub mod bands;
pub mod config;
pub mod diff;
pub mod error;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod scenario;
pub mod store;
