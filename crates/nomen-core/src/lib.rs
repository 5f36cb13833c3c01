//! # Nomen Core
//!
//! Pure primitives for the nomen registration kernel: names, salts,
//! commitments, name operations, and transactions.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Name`] / [`Value`] - Length-bounded opaque byte strings
//! - [`Salt`] - 20-byte registration secret
//! - [`Commitment`] - Hash binding a salt to a name, published before reveal
//! - [`NameOp`] - Closed variant attached to a transaction output
//! - [`Transaction`] / [`TxId`] - Wallet transactions and their identities
//!
//! ## Canonicalization
//!
//! All transactions are encoded using deterministic CBOR. See [`canonical`].
//! The raw bytes handed to the deferred queue are this encoding.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod nameop;
pub mod tx;
pub mod types;
pub mod validation;

pub use canonical::{canonical_tx_bytes, decode_transaction, unsigned_tx_bytes};
pub use crypto::{Commitment, Keypair, PublicKey, Salt, Signature};
pub use error::CoreError;
pub use nameop::NameOp;
pub use tx::{Transaction, TransactionBuilder, TxIn, TxOut, TxWitness, SEQUENCE_FINAL};
pub use types::{Destination, Name, Outpoint, TxId, Value};
pub use validation::{check_name, check_value, verify_transaction};

/// Fixed width of a registration salt in bytes.
pub const SALT_LEN: usize = 20;

/// Fixed width of a commitment hash in bytes.
pub const COMMITMENT_LEN: usize = 20;

/// Maximum length of a name in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a value in bytes.
pub const MAX_VALUE_LEN: usize = 520;

/// Amount in base units carried by every name output.
pub const NAME_AMOUNT: u64 = 1_000_000;

/// Number of confirmations a commit needs before its reveal may be broadcast.
pub const COMMIT_MATURITY: u32 = 12;

/// Sequence marker placed on the reveal's commit input. One past the
/// maturity depth, so the reveal is held until the commit has matured.
pub const REVEAL_SEQUENCE: u32 = COMMIT_MATURITY + 1;
