//! SQLite implementation of the WalletStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. Transactions are
//! stored as their canonical CBOR bytes, so what comes back out is
//! byte-identical to what went in.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use nomen_core::{canonical_tx_bytes, decode_transaction, Outpoint, Transaction, TxId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::WalletStore;

/// SQLite-based wallet store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing; nothing survives the drop.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the locked connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await
        .map_err(join_error)?
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

fn join_error(e: tokio::task::JoinError) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
        Some(format!("spawn_blocking failed: {}", e)),
    ))
}

fn decode_raw(raw: &[u8]) -> Result<Transaction> {
    decode_transaction(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn txid_from_row(bytes: Vec<u8>) -> Result<TxId> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("txid column is not 32 bytes".into()))?;
    Ok(TxId::from_bytes(arr))
}

#[async_trait]
impl WalletStore for SqliteStore {
    async fn enqueue(&self, txid: TxId, tx: &Transaction) -> Result<()> {
        let raw = canonical_tx_bytes(tx);
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO queued_txs (txid, raw, queued_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(txid) DO UPDATE SET
                     raw = excluded.raw,
                     queued_at = excluded.queued_at",
                params![txid.as_bytes().as_slice(), raw, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn dequeue(&self, txid: TxId) -> Result<()> {
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM queued_txs WHERE txid = ?1",
                params![txid.as_bytes().as_slice()],
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound(txid.to_hex()));
            }
            Ok(())
        })
        .await
    }

    async fn queued(&self) -> Result<BTreeMap<TxId, Transaction>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT txid, raw FROM queued_txs ORDER BY txid")?;
            let rows = stmt.query_map([], |row| {
                let txid: Vec<u8> = row.get(0)?;
                let raw: Vec<u8> = row.get(1)?;
                Ok((txid, raw))
            })?;

            let mut queued = BTreeMap::new();
            for row in rows {
                let (txid_bytes, raw) = row?;
                queued.insert(txid_from_row(txid_bytes)?, decode_raw(&raw)?);
            }
            Ok(queued)
        })
        .await
    }

    async fn record_transaction(&self, tx: &Transaction) -> Result<()> {
        let txid = tx.txid();
        let raw = canonical_tx_bytes(tx);
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO wallet_txs (txid, raw, recorded_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(txid) DO UPDATE SET raw = excluded.raw",
                params![txid.as_bytes().as_slice(), raw, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.blocking(|conn| {
            let mut stmt =
                // rowid preserves insertion order exactly; recorded_at has
                // only millisecond resolution and would tie-break by key.
                conn.prepare("SELECT raw FROM wallet_txs ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

            let mut txs = Vec::new();
            for raw in rows {
                txs.push(decode_raw(&raw?)?);
            }
            Ok(txs)
        })
        .await
    }

    async fn get_transaction(&self, txid: TxId) -> Result<Option<Transaction>> {
        self.blocking(move |conn| {
            let raw: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT raw FROM wallet_txs WHERE txid = ?1",
                    params![txid.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|raw| decode_raw(&raw)).transpose()
        })
        .await
    }

    async fn lock_coin(&self, outpoint: Outpoint) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO locked_coins (txid, vout, locked_at) VALUES (?1, ?2, ?3)",
                params![
                    outpoint.txid.as_bytes().as_slice(),
                    outpoint.vout,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn unlock_coin(&self, outpoint: Outpoint) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM locked_coins WHERE txid = ?1 AND vout = ?2",
                params![outpoint.txid.as_bytes().as_slice(), outpoint.vout],
            )?;
            Ok(())
        })
        .await
    }

    async fn is_locked(&self, outpoint: Outpoint) -> Result<bool> {
        self.blocking(move |conn| {
            let locked: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM locked_coins WHERE txid = ?1 AND vout = ?2)",
                params![outpoint.txid.as_bytes().as_slice(), outpoint.vout],
                |row| row.get(0),
            )?;
            Ok(locked)
        })
        .await
    }

    async fn locked_coins(&self) -> Result<Vec<Outpoint>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare("SELECT txid, vout FROM locked_coins ORDER BY txid, vout")?;
            let rows = stmt.query_map([], |row| {
                let txid: Vec<u8> = row.get(0)?;
                let vout: u32 = row.get(1)?;
                Ok((txid, vout))
            })?;

            let mut coins = Vec::new();
            for row in rows {
                let (txid_bytes, vout) = row?;
                coins.push(Outpoint::new(txid_from_row(txid_bytes)?, vout));
            }
            Ok(coins)
        })
        .await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
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
    async fn test_queue_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let tx = make_tx(0x01);
        let txid = tx.txid();

        store.enqueue(txid, &tx).await.unwrap();
        let queued = store.queued().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued.get(&txid), Some(&tx));

        store.dequeue(txid).await.unwrap();
        assert!(store.queued().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_absent_is_not_found() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store.dequeue(TxId::from_bytes([0x99; 32])).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_enqueue_same_id_overwrites() {
        let store = SqliteStore::open_memory().unwrap();
        let a = make_tx(0x01);
        let b = make_tx(0x02);
        let key = a.txid();

        store.enqueue(key, &a).await.unwrap();
        store.enqueue(key, &b).await.unwrap();

        let queued = store.queued().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued.get(&key), Some(&b));
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.db");
        let tx = make_tx(0x07);
        let txid = tx.txid();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.enqueue(txid, &tx).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let queued = store.queued().await.unwrap();
        assert_eq!(queued.get(&txid), Some(&tx));
    }

    #[tokio::test]
    async fn test_wallet_transaction_records() {
        let store = SqliteStore::open_memory().unwrap();
        let a = make_tx(0x01);
        let b = make_tx(0x02);

        store.record_transaction(&a).await.unwrap();
        store.record_transaction(&b).await.unwrap();

        assert_eq!(store.transactions().await.unwrap().len(), 2);
        assert_eq!(store.get_transaction(a.txid()).await.unwrap(), Some(a));
        assert_eq!(
            store.get_transaction(TxId::from_bytes([0xee; 32])).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_transactions_keep_insertion_order() {
        let store = SqliteStore::open_memory().unwrap();
        // Insert in descending txid order, which any key-ordered read
        // would reverse.
        let mut txs: Vec<Transaction> = (0..8).map(|i| make_tx(0x10 + i)).collect();
        txs.sort_by_key(|tx| std::cmp::Reverse(tx.txid()));
        for tx in &txs {
            store.record_transaction(tx).await.unwrap();
        }

        assert_eq!(store.transactions().await.unwrap(), txs);

        // Re-recording an existing transaction keeps its position.
        store.record_transaction(&txs[0]).await.unwrap();
        assert_eq!(store.transactions().await.unwrap(), txs);
    }

    #[tokio::test]
    async fn test_coin_locks() {
        let store = SqliteStore::open_memory().unwrap();
        let coin = Outpoint::new(TxId::from_bytes([0x0a; 32]), 3);

        assert!(!store.is_locked(coin).await.unwrap());
        store.lock_coin(coin).await.unwrap();
        assert!(store.is_locked(coin).await.unwrap());
        assert_eq!(store.locked_coins().await.unwrap(), vec![coin]);

        store.unlock_coin(coin).await.unwrap();
        assert!(!store.is_locked(coin).await.unwrap());

        // Unlocking again is a no-op
        store.unlock_coin(coin).await.unwrap();
    }
}
