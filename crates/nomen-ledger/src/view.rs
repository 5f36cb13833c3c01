//! Combined read view over the confirmed ledger and the pending pool.

use nomen_core::{Name, NameOp, Outpoint, Salt, TxId, Value};

use crate::error::Result;
use crate::traits::{LedgerQuery, PoolQuery};

/// Upper bound on output indices tried when locating a commit output.
pub const MAX_COMMIT_PREVOUT_TRIALS: u32 = 1000;

/// Outcome of a bounded commit-output scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitSearch {
    /// A live commit output matching the secret was found.
    Found(Outpoint),
    /// The first live name output is not a commit.
    WrongType(Outpoint),
    /// A live commit output exists but its commitment does not match the
    /// supplied secret.
    Mismatch(Outpoint),
    /// No name output exists among the scanned indices.
    Missing,
    /// The trial bound was reached with live outputs still beyond it.
    /// The scan may succeed if retried with fresher knowledge.
    Exhausted,
}

/// Read-only composition of [`LedgerQuery`] and [`PoolQuery`].
///
/// Pending pool state takes precedence over confirmed state wherever both
/// answer the same question, so chained operations spend the newest
/// unconfirmed output rather than a stale confirmed one.
pub struct NameLedgerView<'a> {
    ledger: &'a dyn LedgerQuery,
    pool: &'a dyn PoolQuery,
}

impl<'a> NameLedgerView<'a> {
    pub fn new(ledger: &'a dyn LedgerQuery, pool: &'a dyn PoolQuery) -> Self {
        Self { ledger, pool }
    }

    /// Whether the name has an unexpired confirmed record.
    pub async fn exists(&self, name: &Name) -> Result<bool> {
        match self.ledger.name_record(name).await? {
            Some(record) => {
                let height = self.ledger.active_height().await?;
                Ok(!record.expired_at(height))
            }
            None => Ok(false),
        }
    }

    /// Number of pending operations chained on this name.
    pub async fn pending_chain_length(&self, name: &Name) -> Result<u32> {
        self.pool.pending_chain_length(name).await
    }

    /// Whether a pending transaction already reveals this name.
    pub async fn registers_name(&self, name: &Name) -> Result<bool> {
        self.pool.registers_name(name).await
    }

    /// The outpoint the next operation on this name must spend.
    ///
    /// A pending output is preferred over the confirmed one.
    pub async fn last_operation_outpoint(&self, name: &Name) -> Result<Option<Outpoint>> {
        if let Some(outpoint) = self.pool.last_name_output(name).await? {
            return Ok(Some(outpoint));
        }
        Ok(self
            .ledger
            .name_record(name)
            .await?
            .map(|record| record.outpoint))
    }

    /// The value the next operation inherits when the caller omits one.
    ///
    /// The newest pending value wins over the confirmed one.
    pub async fn current_value(&self, name: &Name) -> Result<Option<Value>> {
        if let Some(value) = self.pool.pending_value(name).await? {
            return Ok(Some(value));
        }
        Ok(self
            .ledger
            .name_record(name)
            .await?
            .map(|record| record.value))
    }

    /// Scan the outputs of `txid` for a live commit matching `salt` and
    /// `name`, up to [`MAX_COMMIT_PREVOUT_TRIALS`] indices.
    ///
    /// The first live name output decides the outcome: a commit whose
    /// commitment verifies is `Found`, a commit that does not verify is
    /// `Mismatch`, and any other operation is `WrongType`.
    pub async fn find_commit_outpoint(
        &self,
        name: &Name,
        salt: &Salt,
        txid: TxId,
    ) -> Result<CommitSearch> {
        for vout in 0..MAX_COMMIT_PREVOUT_TRIALS {
            let outpoint = Outpoint::new(txid, vout);
            let Some(coin) = self.ledger.coin_at(&outpoint).await? else {
                continue;
            };
            match &coin.name_op {
                Some(NameOp::Commit { commitment }) => {
                    if commitment.verify(salt, name) {
                        return Ok(CommitSearch::Found(outpoint));
                    }
                    return Ok(CommitSearch::Mismatch(outpoint));
                }
                Some(_) => return Ok(CommitSearch::WrongType(outpoint)),
                None => continue,
            }
        }
        // Distinguish a genuinely absent output from a truncated scan.
        let sentinel = Outpoint::new(txid, MAX_COMMIT_PREVOUT_TRIALS);
        if self.ledger.coin_at(&sentinel).await?.is_some() {
            Ok(CommitSearch::Exhausted)
        } else {
            Ok(CommitSearch::Missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use nomen_core::{Commitment, Destination, NameOp, Transaction, TxOut};

    use super::*;
    use crate::traits::{AcceptDecision, NameRecord};

    struct FixedLedger {
        height: u64,
        record: Option<NameRecord>,
        coins: HashMap<Outpoint, TxOut>,
    }

    #[async_trait]
    impl LedgerQuery for FixedLedger {
        async fn name_record(&self, _name: &Name) -> Result<Option<NameRecord>> {
            Ok(self.record.clone())
        }

        async fn active_height(&self) -> Result<u64> {
            Ok(self.height)
        }

        async fn coin_at(&self, outpoint: &Outpoint) -> Result<Option<TxOut>> {
            Ok(self.coins.get(outpoint).cloned())
        }

        async fn sync_to_tip(&self) -> Result<()> {
            Ok(())
        }
    }

    struct EmptyPool;

    #[async_trait]
    impl PoolQuery for EmptyPool {
        async fn registers_name(&self, _name: &Name) -> Result<bool> {
            Ok(false)
        }

        async fn pending_chain_length(&self, _name: &Name) -> Result<u32> {
            Ok(0)
        }

        async fn last_name_output(&self, _name: &Name) -> Result<Option<Outpoint>> {
            Ok(None)
        }

        async fn pending_value(&self, _name: &Name) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn test_accept(&self, _tx: &Transaction) -> Result<AcceptDecision> {
            Ok(AcceptDecision::Accept)
        }
    }

    fn dest() -> Destination {
        Destination::from_bytes([3; 20])
    }

    fn ledger_with(coins: HashMap<Outpoint, TxOut>) -> FixedLedger {
        FixedLedger {
            height: 100,
            record: None,
            coins,
        }
    }

    #[tokio::test]
    async fn test_exists_respects_expiry() {
        let name = Name::try_from("d/x").unwrap();
        let mut ledger = ledger_with(HashMap::new());
        ledger.record = Some(NameRecord {
            value: Value::empty(),
            outpoint: Outpoint::new(TxId::ZERO, 0),
            expiry_height: 100,
        });

        let pool = EmptyPool;
        let view = NameLedgerView::new(&ledger, &pool);
        assert!(!view.exists(&name).await.unwrap());

        ledger.record.as_mut().unwrap().expiry_height = 101;
        let view = NameLedgerView::new(&ledger, &pool);
        assert!(view.exists(&name).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_scan_classifies_outputs() {
        let name = Name::try_from("d/x").unwrap();
        let salt = Salt::from_bytes([7; 20]);
        let txid = TxId::from_bytes([1; 32]);
        let pool = EmptyPool;

        // Bare coins below a matching commit: skipped, then found.
        let mut coins = HashMap::new();
        coins.insert(Outpoint::new(txid, 0), TxOut::payment(5, dest()));
        coins.insert(
            Outpoint::new(txid, 2),
            TxOut::name(
                1,
                dest(),
                NameOp::Commit {
                    commitment: Commitment::of(&salt, &name),
                },
            ),
        );
        let ledger = ledger_with(coins);
        let view = NameLedgerView::new(&ledger, &pool);
        assert_eq!(
            view.find_commit_outpoint(&name, &salt, txid).await.unwrap(),
            CommitSearch::Found(Outpoint::new(txid, 2))
        );

        // A wrong salt on the same commit.
        let wrong = Salt::from_bytes([8; 20]);
        assert_eq!(
            view.find_commit_outpoint(&name, &wrong, txid).await.unwrap(),
            CommitSearch::Mismatch(Outpoint::new(txid, 2))
        );

        // A non-commit operation first.
        let mut coins = HashMap::new();
        coins.insert(
            Outpoint::new(txid, 0),
            TxOut::name(
                1,
                dest(),
                NameOp::Update {
                    name: name.clone(),
                    value: Value::empty(),
                },
            ),
        );
        let ledger = ledger_with(coins);
        let view = NameLedgerView::new(&ledger, &pool);
        assert_eq!(
            view.find_commit_outpoint(&name, &salt, txid).await.unwrap(),
            CommitSearch::WrongType(Outpoint::new(txid, 0))
        );
    }

    #[tokio::test]
    async fn test_commit_scan_missing_vs_exhausted() {
        let name = Name::try_from("d/x").unwrap();
        let salt = Salt::from_bytes([7; 20]);
        let txid = TxId::from_bytes([1; 32]);
        let pool = EmptyPool;

        let ledger = ledger_with(HashMap::new());
        let view = NameLedgerView::new(&ledger, &pool);
        assert_eq!(
            view.find_commit_outpoint(&name, &salt, txid).await.unwrap(),
            CommitSearch::Missing
        );

        let mut coins = HashMap::new();
        coins.insert(
            Outpoint::new(txid, MAX_COMMIT_PREVOUT_TRIALS),
            TxOut::payment(5, dest()),
        );
        let ledger = ledger_with(coins);
        let view = NameLedgerView::new(&ledger, &pool);
        assert_eq!(
            view.find_commit_outpoint(&name, &salt, txid).await.unwrap(),
            CommitSearch::Exhausted
        );
    }
}
