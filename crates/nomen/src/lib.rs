//! # Nomen
//!
//! Two-phase commit-reveal name registration with a durable
//! deferred-transaction queue.
//!
//! ## Overview
//!
//! Registering a name takes two transactions:
//!
//! - **Commit**: publishes `hash(salt || name)` without disclosing the
//!   name. Nobody watching the chain learns what is being registered.
//! - **Reveal**: after the commit has matured, discloses the name, its
//!   value, and the salt by spending the commit output.
//!
//! Reveals are signed immediately but held in a durable queue until the
//! commit is deep enough; the queue survives restarts. Updates chain off
//! the newest operation output, pending or confirmed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nomen::{CommitOptions, ProtocolConfig, RegistrationProtocol, RevealOptions};
//! use nomen::core::{Keypair, Name, Value};
//! use nomen::store::SqliteStore;
//!
//! async fn example(protocol: RegistrationProtocol<SqliteStore>) {
//!     let name = Name::try_from("d/example").unwrap();
//!     let value = Value::try_from("{\"ip\":\"1.2.3.4\"}").unwrap();
//!
//!     let handle = protocol
//!         .register_commit(&name, CommitOptions::default())
//!         .await
//!         .unwrap();
//!
//!     // Once the commit has matured on chain:
//!     let txid = protocol
//!         .register_reveal(&name, &value, RevealOptions::default())
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `nomen::core` - Primitives (Name, Salt, Commitment, Transaction)
//! - `nomen::ledger` - Capability traits and the name query view
//! - `nomen::store` - The wallet store and its backends

pub mod assemble;
pub mod delegate;
pub mod destination;
pub mod error;
pub mod protocol;

// Re-export component crates
pub use nomen_core as core;
pub use nomen_ledger as ledger;
pub use nomen_store as store;

// Re-export main types for convenience
pub use assemble::{NamePlan, TxAssembler};
pub use delegate::{DelegatedName, DelegationPlanner};
pub use destination::DestinationHelper;
pub use error::{ProtocolError, Result};
pub use protocol::{
    AutoRegisterOptions, CommitHandle, CommitOptions, ProtocolConfig, RegistrationProtocol,
    RevealOptions, UpdateOptions, WalletNameEntry, DEFAULT_CHAIN_LIMIT,
};

// Re-export commonly used core types
pub use nomen_core::{
    Commitment, Keypair, Name, NameOp, Outpoint, Salt, Transaction, TxId, Value,
};
