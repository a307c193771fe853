//! Rich diagnostic error types for augur.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for augur.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum AugurError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("quota exceeded: write of {needed} bytes over capacity of {capacity}")]
    #[diagnostic(
        code(augur::store::quota),
        help(
            "The store's byte budget is exhausted. Delete or unpin old runs, \
             export scenarios to a file, or raise `store_capacity_bytes` in the config."
        )
    )]
    QuotaExceeded { needed: u64, capacity: u64 },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(augur::store::io),
        help(
            "A filesystem operation failed. Check that the data directory \
             exists and is writable, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(augur::store::redb),
        help(
            "The embedded database rejected a transaction. If this repeats on \
             every start, the database file may be corrupt — move it aside and \
             let augur create a fresh one."
        )
    )]
    Redb { message: String },
}

impl StoreError {
    /// Whether this failure is the distinguishable quota-exceeded case.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

// ---------------------------------------------------------------------------
// Ledger errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LedgerError {
    #[error("run not found: {id}")]
    #[diagnostic(
        code(augur::ledger::run_not_found),
        help("No stored run has this id. List stored runs with `augur runs list`.")
    )]
    RunNotFound { id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Scenario errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ScenarioError {
    #[error("failed to serialize scenario payload: {message}")]
    #[diagnostic(
        code(augur::scenario::serialize),
        help("A scenario holds a value that cannot be represented as JSON.")
    )]
    Serialize { message: String },

    #[error("failed to write scenario export: {path}")]
    #[diagnostic(
        code(augur::scenario::export_write),
        help("Ensure the export directory exists and you have write permissions to it.")
    )]
    ExportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(augur::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(augur::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(augur::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(augur::config::invalid),
        help(
            "Check the retention fields: max_pinned must not exceed max_total, \
             and both must be > 0."
        )
    )]
    Invalid { message: String },
}

/// Convenience alias for functions returning augur results.
pub type AugurResult<T> = std::result::Result<T, AugurError>;
