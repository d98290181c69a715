//! Error types for Trueno-Fit
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Per-configuration failures never surface here: they become error codes on
//! a [`ResultRecord`](crate::record::ResultRecord). These variants cover the
//! run-level mistakes (configuration, ledger I/O) that stop a benchmark.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Fit error types
#[derive(Error, Debug)]
pub enum Error {
    /// A requested software package has no minimizer list (fatal by design)
    #[error("No minimizer given for software: {software}\nAdd a `minimizers.{software}` entry to the options file")]
    MissingMinimizers {
        /// Software package name
        software: String,
    },

    /// No controller is registered for a software package
    #[error("Unknown software: {0}\nRegister a controller factory for it before benchmarking")]
    UnknownSoftware(String),

    /// Ledger file could not be located
    #[error("Could not find checkpoint file '{filename}' (also looked in '{results_dir}')")]
    LedgerNotFound {
        /// Configured checkpoint filename
        filename: String,
        /// Configured results directory
        results_dir: String,
    },

    /// Ledger has been finalized and accepts no more records
    #[error("Cannot add to checkpoint - checkpoint has been finalized")]
    LedgerFinalized,

    /// Another writer owns the ledger file
    #[error("Checkpoint file is already open for writing: {path}\nOnly one writer per checkpoint file is allowed")]
    LedgerLocked {
        /// Ledger path
        path: String,
    },

    /// Binary-to-text payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid input (options, tags, arguments)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
