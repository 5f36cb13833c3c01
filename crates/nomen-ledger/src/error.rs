//! Ledger capability errors.

use thiserror::Error;

/// Errors surfaced by ledger capabilities.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The destination source has no fresh destinations left.
    #[error("keypool exhausted")]
    KeypoolExhausted,

    /// The coin selector could not cover the requested amount.
    #[error("insufficient funds: need {needed} base units")]
    InsufficientFunds { needed: u64 },

    /// Broadcasting a transaction to the network failed.
    #[error("broadcast failed: {0}")]
    Broadcast(String),

    /// The underlying ledger backend failed.
    #[error("ledger backend error: {0}")]
    Backend(String),
}

/// Result alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
