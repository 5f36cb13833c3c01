//! In-memory implementation of the WalletStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;

use nomen_core::{Outpoint, Transaction, TxId};

use crate::error::{Result, StoreError};
use crate::traits::WalletStore;

/// In-memory wallet store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Deferred queue, keyed by transaction id.
    queued: BTreeMap<TxId, Transaction>,

    /// Wallet-authored transactions in insertion order.
    records: Vec<Transaction>,

    /// Locked outpoints.
    locks: BTreeSet<(TxId, u32)>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryStoreInner> {
        // A poisoned lock means a writer panicked; the data itself is
        // still consistent for these map operations.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryStoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn enqueue(&self, txid: TxId, tx: &Transaction) -> Result<()> {
        self.write().queued.insert(txid, tx.clone());
        Ok(())
    }

    async fn dequeue(&self, txid: TxId) -> Result<()> {
        match self.write().queued.remove(&txid) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(txid.to_hex())),
        }
    }

    async fn queued(&self) -> Result<BTreeMap<TxId, Transaction>> {
        Ok(self.read().queued.clone())
    }

    async fn record_transaction(&self, tx: &Transaction) -> Result<()> {
        let mut inner = self.write();
        let txid = tx.txid();
        if let Some(existing) = inner.records.iter_mut().find(|t| t.txid() == txid) {
            *existing = tx.clone();
        } else {
            inner.records.push(tx.clone());
        }
        Ok(())
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.read().records.clone())
    }

    async fn get_transaction(&self, txid: TxId) -> Result<Option<Transaction>> {
        Ok(self
            .read()
            .records
            .iter()
            .find(|t| t.txid() == txid)
            .cloned())
    }

    async fn lock_coin(&self, outpoint: Outpoint) -> Result<()> {
        self.write().locks.insert((outpoint.txid, outpoint.vout));
        Ok(())
    }

    async fn unlock_coin(&self, outpoint: Outpoint) -> Result<()> {
        self.write().locks.remove(&(outpoint.txid, outpoint.vout));
        Ok(())
    }

    async fn is_locked(&self, outpoint: Outpoint) -> Result<bool> {
        Ok(self.read().locks.contains(&(outpoint.txid, outpoint.vout)))
    }

    async fn locked_coins(&self) -> Result<Vec<Outpoint>> {
        Ok(self
            .read()
            .locks
            .iter()
            .map(|&(txid, vout)| Outpoint::new(txid, vout))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomen_core::{Keypair, TransactionBuilder};

    fn make_tx(tag: u8) -> Transaction {
        let keypair = Keypair::from_seed(&[tag; 32]);
        TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([tag; 32]), 0))
            .pay(1000, keypair.destination())
            .sign(&keypair)
    }

    #[tokio::test]
    async fn test_queue_semantics_match_sqlite() {
        let store = MemoryStore::new();
        let tx = make_tx(0x01);
        let txid = tx.txid();

        store.enqueue(txid, &tx).await.unwrap();
        assert_eq!(store.queued().await.unwrap().get(&txid), Some(&tx));

        let replacement = make_tx(0x02);
        store.enqueue(txid, &replacement).await.unwrap();
        assert_eq!(
            store.queued().await.unwrap().get(&txid),
            Some(&replacement)
        );

        store.dequeue(txid).await.unwrap();
        assert!(matches!(
            store.dequeue(txid).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_records_keep_insertion_order() {
        let store = MemoryStore::new();
        let a = make_tx(0x01);
        let b = make_tx(0x02);

        store.record_transaction(&a).await.unwrap();
        store.record_transaction(&b).await.unwrap();

        let txs = store.transactions().await.unwrap();
        assert_eq!(txs, vec![a, b]);
    }
}
