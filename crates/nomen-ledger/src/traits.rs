//! Capability traits for the external ledger and wallet plumbing.
//!
//! The registration kernel consumes these; it never implements them.
//! Implementations live with whatever node or wallet backend hosts the
//! kernel, and with the testkit mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nomen_core::{Destination, Keypair, Name, Outpoint, Transaction, TxOut, Value};

use crate::error::Result;

/// The confirmed state of a registered name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    /// The value assigned by the newest confirmed operation.
    pub value: Value,
    /// The outpoint of that operation's name output.
    pub outpoint: Outpoint,
    /// Height at which the registration lapses unless renewed.
    pub expiry_height: u64,
}

impl NameRecord {
    /// Whether the record has lapsed at the given height.
    pub fn expired_at(&self, height: u64) -> bool {
        height >= self.expiry_height
    }
}

/// Outcome of a trial pool admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptDecision {
    /// The transaction would be admitted now.
    Accept,
    /// Rejected for a reason that may clear later, such as an immature
    /// input. Candidates for the deferred queue.
    NotCurrentlyValid(String),
    /// Rejected by a consensus rule. Never becomes valid.
    Invalid(String),
}

/// A destination reserved from the keypool but not yet committed to.
///
/// Callers must hand it back via [`DestinationSource::keep`] once the
/// transaction using it is durable, or [`DestinationSource::release`]
/// on any failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedDestination {
    /// The reserved destination.
    pub dest: Destination,
    /// Backend-assigned reservation handle.
    pub index: u64,
}

/// Read access to the confirmed ledger.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// The confirmed record for a name, if one is indexed.
    async fn name_record(&self, name: &Name) -> Result<Option<NameRecord>>;

    /// Whether a name has any confirmed record, expired or not.
    async fn name_exists(&self, name: &Name) -> Result<bool> {
        Ok(self.name_record(name).await?.is_some())
    }

    /// The current best block height.
    async fn active_height(&self) -> Result<u64>;

    /// The unspent output at an outpoint, if it exists and is unspent.
    async fn coin_at(&self, outpoint: &Outpoint) -> Result<Option<TxOut>>;

    /// Wait until the view reflects the current chain tip.
    ///
    /// Called before any locks are taken so that grouped queries observe
    /// one logical snapshot.
    async fn sync_to_tip(&self) -> Result<()>;
}

/// Read access to the unconfirmed transaction pool.
#[async_trait]
pub trait PoolQuery: Send + Sync {
    /// Whether a pending transaction reveals this name.
    async fn registers_name(&self, name: &Name) -> Result<bool>;

    /// Number of pending operations chained on this name.
    async fn pending_chain_length(&self, name: &Name) -> Result<u32>;

    /// The newest pending name output for this name, if any.
    async fn last_name_output(&self, name: &Name) -> Result<Option<Outpoint>>;

    /// The value assigned by the newest pending operation, if any.
    async fn pending_value(&self, name: &Name) -> Result<Option<Value>>;

    /// Trial-run pool admission without submitting.
    async fn test_accept(&self, tx: &Transaction) -> Result<AcceptDecision>;
}

/// Resolves the signing key controlling a destination.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// The wallet key for a destination, or None when the destination is
    /// not controlled by a single wallet key.
    async fn signing_key_for(&self, dest: &Destination) -> Result<Option<Keypair>>;
}

/// Hands out fresh wallet destinations.
#[async_trait]
pub trait DestinationSource: Send + Sync {
    /// Reserve a fresh destination. Fails with `KeypoolExhausted` when the
    /// pool is empty.
    async fn reserve(&self) -> Result<ReservedDestination>;

    /// Commit the reservation; the destination will not be handed out again.
    async fn keep(&self, reserved: ReservedDestination) -> Result<()>;

    /// Return the reservation to the pool.
    async fn release(&self, reserved: ReservedDestination) -> Result<()>;
}

/// Selects wallet coins to fund a transaction.
#[async_trait]
pub trait CoinSelector: Send + Sync {
    /// Select unspent coins covering at least `amount`. Fails with
    /// `InsufficientFunds` when the wallet cannot cover it.
    async fn select(&self, amount: u64) -> Result<Vec<(Outpoint, TxOut)>>;
}

/// Submits transactions to the network.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, tx: &Transaction) -> Result<()>;
}
