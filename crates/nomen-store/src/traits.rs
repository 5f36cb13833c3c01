//! The WalletStore trait: durable local wallet state.

use std::collections::BTreeMap;

use async_trait::async_trait;

use nomen_core::{Outpoint, Transaction, TxId};

use crate::error::Result;

/// Durable wallet-side state for the registration kernel.
///
/// Three concerns share one store so that a single backend file holds
/// everything that must survive a restart:
///
/// - The deferred transaction queue: signed transactions waiting for their
///   inputs to mature before broadcast. Entries stay until explicitly
///   dequeued; there is no automatic expiry.
/// - Wallet transaction records: every transaction this wallet authored,
///   scanned when locating a prior commit or listing owned names.
/// - Coin locks: outpoints consumed by queued transactions, held so a
///   concurrent spend cannot double-use them.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Write a transaction into the deferred queue under `txid`.
    ///
    /// Writing an id that is already queued replaces the stored
    /// transaction.
    async fn enqueue(&self, txid: TxId, tx: &Transaction) -> Result<()>;

    /// Remove a queued transaction. `NotFound` when the id is not queued.
    async fn dequeue(&self, txid: TxId) -> Result<()>;

    /// A stable snapshot of the queue, ordered by transaction id.
    async fn queued(&self) -> Result<BTreeMap<TxId, Transaction>>;

    /// Record a wallet-authored transaction.
    async fn record_transaction(&self, tx: &Transaction) -> Result<()>;

    /// All recorded wallet transactions, in insertion order.
    async fn transactions(&self) -> Result<Vec<Transaction>>;

    /// A recorded wallet transaction by id.
    async fn get_transaction(&self, txid: TxId) -> Result<Option<Transaction>>;

    /// Mark an outpoint as consumed by a queued transaction.
    async fn lock_coin(&self, outpoint: Outpoint) -> Result<()>;

    /// Release a coin lock. Unlocking an unlocked coin is a no-op.
    async fn unlock_coin(&self, outpoint: Outpoint) -> Result<()>;

    /// Whether an outpoint is currently locked.
    async fn is_locked(&self, outpoint: Outpoint) -> Result<bool>;

    /// All locked outpoints.
    async fn locked_coins(&self) -> Result<Vec<Outpoint>>;
}
