// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tollgate usage tracker.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type used across the usage store, persistence layer,
/// access policy, and remote cost fetcher.
#[derive(Debug, Error)]
pub enum TollgateError {
    /// Configuration errors (unknown budget period, invalid role, bad budgets).
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors while reading or writing a usage file.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A usage file exists but could not be parsed or violates ledger invariants.
    #[error("corrupt usage ledger at {}: {source}", path.display())]
    CorruptLedger {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The user identifier cannot be used to name a usage file.
    #[error("invalid user id `{0}`")]
    InvalidUserId(String),

    /// A cost amount was negative or not a finite number.
    #[error("invalid cost amount {0}: must be finite and non-negative")]
    InvalidAmount(f64),

    /// Remote metering errors (network failure, non-2xx status, decode failure).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TollgateError {
    /// Wraps an I/O error as a storage error.
    pub fn storage(err: std::io::Error) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }
}
