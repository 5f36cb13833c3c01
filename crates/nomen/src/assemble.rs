//! Transaction assembly: funding, change, signing, and delivery.

use tracing::{debug, warn};

use nomen_core::{
    Keypair, NameOp, Outpoint, Transaction, TransactionBuilder, TxId, NAME_AMOUNT,
};
use nomen_ledger::{Broadcaster, CoinSelector, DestinationSource, ReservedDestination};
use nomen_store::WalletStore;

use crate::error::{ProtocolError, Result};

/// What a name transaction must contain: the operation, the destination
/// its output pays, and the prior name output it spends, if any.
///
/// A plan with a prior input needs no funding; the prior name output
/// carries the locked amount forward. A plan without one is funded from
/// wallet coins, with change paid to a reserved destination.
pub struct NamePlan {
    pub op: NameOp,
    pub dest: nomen_core::Destination,
    pub prior: Option<(Outpoint, u32)>,
}

/// Builds, signs, and delivers name transactions.
///
/// The signing key is taken per plan; pre-signed transactions go through
/// [`TxAssembler::queue_signed`] without touching wallet keys.
pub struct TxAssembler<'a> {
    coins: &'a dyn CoinSelector,
    dests: &'a dyn DestinationSource,
    broadcaster: &'a dyn Broadcaster,
    store: &'a dyn WalletStore,
}

impl<'a> TxAssembler<'a> {
    pub fn new(
        coins: &'a dyn CoinSelector,
        dests: &'a dyn DestinationSource,
        broadcaster: &'a dyn Broadcaster,
        store: &'a dyn WalletStore,
    ) -> Self {
        Self {
            coins,
            dests,
            broadcaster,
            store,
        }
    }

    /// Assemble a plan and broadcast it immediately.
    pub async fn broadcast(&self, signer: &Keypair, plan: NamePlan) -> Result<TxId> {
        let (tx, change) = self.build_signed(signer, plan).await?;

        if let Err(e) = self.broadcaster.broadcast(&tx).await {
            self.release_change(change).await;
            return Err(e.into());
        }

        let txid = tx.txid();
        self.store.record_transaction(&tx).await?;
        self.keep_change(change).await?;
        debug!(txid = %txid, "broadcast name transaction");
        Ok(txid)
    }

    /// Assemble a plan and place it in the deferred queue.
    pub async fn queue(&self, signer: &Keypair, plan: NamePlan) -> Result<TxId> {
        let (tx, change) = self.build_signed(signer, plan).await?;

        match self.queue_signed(&tx).await {
            Ok(txid) => {
                self.keep_change(change).await?;
                Ok(txid)
            }
            Err(e) => {
                self.release_change(change).await;
                Err(e)
            }
        }
    }

    /// Place an already-signed transaction in the deferred queue.
    ///
    /// Locks every consumed coin first, records the wallet transaction,
    /// and writes the queue entry last. When the queue write fails, the
    /// coins locked here are released again before the error surfaces.
    pub async fn queue_signed(&self, tx: &Transaction) -> Result<TxId> {
        let txid = tx.txid();

        let mut locked = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            self.store.lock_coin(input.prevout).await?;
            locked.push(input.prevout);
        }

        let queued = async {
            self.store.record_transaction(tx).await?;
            self.store
                .enqueue(txid, tx)
                .await
                .map_err(|e| ProtocolError::QueueWriteFailed(e.to_string()))
        }
        .await;

        match queued {
            Ok(()) => {
                debug!(txid = %txid, inputs = locked.len(), "queued name transaction");
                Ok(txid)
            }
            Err(e) => {
                for outpoint in locked {
                    if let Err(unlock_err) = self.store.unlock_coin(outpoint).await {
                        warn!(%outpoint, error = %unlock_err, "failed to release coin lock");
                    }
                }
                Err(e)
            }
        }
    }

    /// Build and sign the transaction for a plan.
    async fn build_signed(
        &self,
        signer: &Keypair,
        plan: NamePlan,
    ) -> Result<(Transaction, Option<ReservedDestination>)> {
        let mut builder = TransactionBuilder::new();
        let mut change = None;

        if let Some((outpoint, sequence)) = plan.prior {
            // The prior name output funds the new one.
            builder = builder.input_with_sequence(outpoint, sequence);
        } else {
            let selected = self.coins.select(NAME_AMOUNT).await?;
            let mut total = 0u64;
            for (outpoint, coin) in selected {
                total = total.saturating_add(coin.amount);
                builder = builder.input(outpoint);
            }
            let excess = total.saturating_sub(NAME_AMOUNT);
            if excess > 0 {
                let reserved = self.dests.reserve().await?;
                builder = builder.pay(excess, reserved.dest);
                change = Some(reserved);
            }
        }

        builder = builder.name_output(NAME_AMOUNT, plan.dest, plan.op);
        Ok((builder.sign(signer), change))
    }

    async fn keep_change(&self, change: Option<ReservedDestination>) -> Result<()> {
        if let Some(reserved) = change {
            self.dests.keep(reserved).await?;
        }
        Ok(())
    }

    async fn release_change(&self, change: Option<ReservedDestination>) {
        if let Some(reserved) = change {
            if let Err(e) = self.dests.release(reserved).await {
                warn!(error = %e, "failed to release change destination");
            }
        }
    }
}
