//! Error types for the registration protocol.

use thiserror::Error;

use nomen_core::CoreError;
use nomen_ledger::LedgerError;
use nomen_store::StoreError;

/// Errors that can occur during protocol operations.
///
/// Every precondition failure is detected before any wallet state is
/// mutated; the queue and lock variants are the only ones that can leave
/// work behind, and the assembler compensates for those before surfacing
/// them.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A name or value failed local validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The name already has an unexpired registration.
    #[error("name already exists: {0}")]
    NameExists(String),

    /// A pending transaction is already revealing this name.
    #[error("name is already being registered: {0}")]
    NameAlreadyRegistering(String),

    /// The name is active and the caller did not opt into re-registration.
    #[error("name is already active: {0}")]
    NameAlreadyActive(String),

    /// No confirmed or pending registration exists for this name.
    #[error("name is not registered: {0}")]
    NameNotRegistered(String),

    /// The referenced prior transaction has no live name output.
    #[error("prior name output not found in {0}")]
    PriorOutputNotFound(String),

    /// The prior name output is not a commit.
    #[error("prior operation at {0} is not a commit")]
    PriorOpWrongType(String),

    /// The supplied secret does not open the prior commitment.
    #[error("salt does not match the commitment at {0}")]
    SecretMismatch(String),

    /// Too many unconfirmed operations are chained on this name.
    #[error("chain limit exceeded for {name}: {pending} pending, limit {limit}")]
    ChainLimitExceeded {
        name: String,
        pending: u32,
        limit: u32,
    },

    /// The destination source has no fresh destinations left.
    #[error("keypool exhausted")]
    KeypoolExhausted,

    /// The wallet cannot fund the transaction.
    #[error("insufficient funds: need {needed} base units")]
    InsufficientFunds { needed: u64 },

    /// No signing key is available for the transaction.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Writing to the deferred queue failed; locked coins were released.
    #[error("queue write failed: {0}")]
    QueueWriteFailed(String),

    /// Erasing from the deferred queue failed.
    #[error("queue erase failed: {0}")]
    QueueEraseFailed(String),

    /// A bounded lookup gave out before reaching a verdict; retrying may
    /// succeed.
    #[error("transient lookup failure: {0}")]
    TransientLookupFailure(String),

    /// Broadcasting to the network failed.
    #[error("broadcast failed: {0}")]
    Broadcast(String),

    /// Core validation or codec error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Ledger backend error.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<LedgerError> for ProtocolError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::KeypoolExhausted => ProtocolError::KeypoolExhausted,
            LedgerError::InsufficientFunds { needed } => ProtocolError::InsufficientFunds { needed },
            LedgerError::Broadcast(msg) => ProtocolError::Broadcast(msg),
            LedgerError::Backend(msg) => ProtocolError::Ledger(msg),
        }
    }
}

impl From<StoreError> for ProtocolError {
    fn from(e: StoreError) -> Self {
        ProtocolError::Store(e)
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
