//! Error types for nomen core.

use thiserror::Error;

/// Core errors that can occur while constructing or decoding primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("name exceeds the maximum length ({0} bytes)")]
    NameTooLong(usize),

    #[error("value exceeds the maximum length ({0} bytes)")]
    ValueTooLong(usize),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("transaction is not signed")]
    Unsigned,

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}
