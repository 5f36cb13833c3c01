//! The registration protocol: commit, reveal, update, auto-register, and
//! the deferred-queue surface.
//!
//! Registration is a two-phase exchange. The commit publishes only a
//! salted hash of the name; once it has matured on chain, the reveal
//! discloses the name, its value, and the salt by spending the commit
//! output. Updates then chain off the newest operation output. Reveals
//! are never broadcast directly: they wait in the durable queue with a
//! maturity sequence marker until the commit is deep enough.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use nomen_core::{
    check_name, check_value, decode_transaction, verify_transaction, Commitment, Destination,
    Keypair, Name, NameOp, Outpoint, Salt, Transaction, TxId, Value, COMMIT_MATURITY,
    REVEAL_SEQUENCE, SEQUENCE_FINAL,
};
use nomen_ledger::{
    AcceptDecision, Broadcaster, CoinSelector, CommitSearch, DestinationSource, KeyResolver,
    LedgerQuery, NameLedgerView, PoolQuery,
};
use nomen_store::WalletStore;

use crate::assemble::{NamePlan, TxAssembler};
use crate::delegate::DelegationPlanner;
use crate::destination::DestinationHelper;
use crate::error::{ProtocolError, Result};

/// Default cap on unconfirmed operations chained on one name.
pub const DEFAULT_CHAIN_LIMIT: u32 = 25;

/// Configuration for the registration protocol.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Maximum pending operations per name.
    pub chain_limit: u32,
    /// Confirmations a commit needs before its reveal may go out.
    pub commit_maturity: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chain_limit: DEFAULT_CHAIN_LIMIT,
            commit_maturity: COMMIT_MATURITY,
        }
    }
}

/// Options for [`RegistrationProtocol::register_commit`].
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Commit even though the name is currently registered (pre-position
    /// for an expiring name).
    pub allow_existing: bool,
    /// Pay the name output here instead of a reserved destination.
    pub dest_override: Option<Destination>,
}

/// Options for [`RegistrationProtocol::register_reveal`].
#[derive(Debug, Clone, Default)]
pub struct RevealOptions {
    /// Explicit secret; when absent the wallet is scanned and the salt
    /// re-derived.
    pub salt: Option<Salt>,
    /// Explicit commit transaction; requires `salt`.
    pub prior_txid: Option<TxId>,
    /// Reveal even though the name is currently active.
    pub allow_active: bool,
    pub dest_override: Option<Destination>,
}

/// Options for [`RegistrationProtocol::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub dest_override: Option<Destination>,
}

/// Options for [`RegistrationProtocol::auto_register`].
#[derive(Debug, Clone, Default)]
pub struct AutoRegisterOptions {
    pub allow_existing: bool,
    /// Register a delegated name alongside and point the parent at it.
    pub delegate: bool,
    pub dest_override: Option<Destination>,
}

/// What a commit leaves behind: the caller needs the salt to reveal.
#[derive(Debug, Clone)]
pub struct CommitHandle {
    pub name: Name,
    pub txid: TxId,
    pub salt: Salt,
}

/// A name owned by this wallet, per its newest recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletNameEntry {
    pub name: Name,
    pub value: Value,
    pub outpoint: Outpoint,
}

/// The registration protocol facade.
///
/// Wallet-side mutation is serialized: each top-level operation takes an
/// internal mutex, syncs the ledger view to the tip, and only then reads
/// wallet state, so ledger locks are always taken before wallet locks.
pub struct RegistrationProtocol<S: WalletStore> {
    keypair: Keypair,
    store: Arc<S>,
    ledger: Arc<dyn LedgerQuery>,
    pool: Arc<dyn PoolQuery>,
    keys: Arc<dyn KeyResolver>,
    dests: Arc<dyn DestinationSource>,
    coins: Arc<dyn CoinSelector>,
    broadcaster: Arc<dyn Broadcaster>,
    config: ProtocolConfig,
    op_lock: Mutex<()>,
}

impl<S: WalletStore> RegistrationProtocol<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keypair: Keypair,
        store: Arc<S>,
        ledger: Arc<dyn LedgerQuery>,
        pool: Arc<dyn PoolQuery>,
        keys: Arc<dyn KeyResolver>,
        dests: Arc<dyn DestinationSource>,
        coins: Arc<dyn CoinSelector>,
        broadcaster: Arc<dyn Broadcaster>,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            keypair,
            store,
            ledger,
            pool,
            keys,
            dests,
            coins,
            broadcaster,
            config,
            op_lock: Mutex::new(()),
        }
    }

    /// The wallet store backing this protocol.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn view(&self) -> NameLedgerView<'_> {
        NameLedgerView::new(self.ledger.as_ref(), self.pool.as_ref())
    }

    fn assembler(&self) -> TxAssembler<'_> {
        TxAssembler::new(
            self.coins.as_ref(),
            self.dests.as_ref(),
            self.broadcaster.as_ref(),
            self.store.as_ref(),
        )
    }

    /// Resolve the wallet signing key, failing when the wallet cannot
    /// sign right now.
    async fn signer(&self) -> Result<Keypair> {
        self.keys
            .signing_key_for(&self.keypair.destination())
            .await?
            .ok_or_else(|| ProtocolError::SigningFailed("wallet signing key unavailable".into()))
    }

    /// Publish a commitment to `name` without disclosing it.
    pub async fn register_commit(&self, name: &Name, opts: CommitOptions) -> Result<CommitHandle> {
        let _guard = self.op_lock.lock().await;
        self.ledger.sync_to_tip().await?;
        self.commit_locked(name, &opts).await
    }

    async fn commit_locked(&self, name: &Name, opts: &CommitOptions) -> Result<CommitHandle> {
        check_name(name.as_bytes())?;

        let view = self.view();
        if !opts.allow_existing && view.exists(name).await? {
            return Err(ProtocolError::NameExists(name.to_string()));
        }

        let signer = self.signer().await?;
        let mut helper = DestinationHelper::new(self.dests.as_ref(), opts.dest_override);
        let dest = helper.destination().await?;

        // Deterministic salt when a single key controls the destination,
        // random otherwise. Determinism lets the reveal re-derive it from
        // the wallet alone.
        let salt = match self.keys.signing_key_for(&dest).await? {
            Some(key) => Salt::derive(&key, name),
            None => Salt::random(),
        };
        let commitment = Commitment::of(&salt, name);

        let plan = NamePlan {
            op: NameOp::Commit { commitment },
            dest,
            prior: None,
        };
        match self.assembler().broadcast(&signer, plan).await {
            Ok(txid) => {
                helper.finalize().await?;
                info!(name = %name, txid = %txid, "commit broadcast");
                Ok(CommitHandle {
                    name: name.clone(),
                    txid,
                    salt,
                })
            }
            Err(e) => {
                helper.abort().await?;
                Err(e)
            }
        }
    }

    /// Reveal a committed name by queueing the disclosure transaction.
    ///
    /// The reveal spends the commit output with the maturity sequence, so
    /// it sits in the deferred queue until the commit is
    /// `commit_maturity` blocks deep.
    pub async fn register_reveal(
        &self,
        name: &Name,
        value: &Value,
        opts: RevealOptions,
    ) -> Result<TxId> {
        let _guard = self.op_lock.lock().await;
        self.ledger.sync_to_tip().await?;

        check_name(name.as_bytes())?;
        check_value(value.as_bytes())?;

        let view = self.view();
        if view.registers_name(name).await? {
            return Err(ProtocolError::NameAlreadyRegistering(name.to_string()));
        }
        if !opts.allow_active && view.exists(name).await? {
            return Err(ProtocolError::NameAlreadyActive(name.to_string()));
        }

        let (salt, commit_txid) = match (opts.salt, opts.prior_txid) {
            (Some(salt), Some(txid)) => (salt, txid),
            (Some(_), None) | (None, Some(_)) => {
                return Err(ProtocolError::InvalidInput(
                    "salt and prior txid must be given together".into(),
                ))
            }
            (None, None) => self.scan_wallet_for_commit(name).await?,
        };

        let outpoint = match view.find_commit_outpoint(name, &salt, commit_txid).await? {
            CommitSearch::Found(outpoint) => outpoint,
            CommitSearch::WrongType(outpoint) => {
                return Err(ProtocolError::PriorOpWrongType(outpoint.to_string()))
            }
            CommitSearch::Mismatch(outpoint) => {
                return Err(ProtocolError::SecretMismatch(outpoint.to_string()))
            }
            CommitSearch::Missing => {
                return Err(ProtocolError::PriorOutputNotFound(commit_txid.to_string()))
            }
            CommitSearch::Exhausted => {
                return Err(ProtocolError::TransientLookupFailure(format!(
                    "commit output scan bound reached in {}",
                    commit_txid
                )))
            }
        };

        let signer = self.signer().await?;
        let mut helper = DestinationHelper::new(self.dests.as_ref(), opts.dest_override);
        let dest = helper.destination().await?;

        let plan = NamePlan {
            op: NameOp::Reveal {
                name: name.clone(),
                value: value.clone(),
                salt,
            },
            dest,
            prior: Some((outpoint, REVEAL_SEQUENCE)),
        };
        match self.assembler().queue(&signer, plan).await {
            Ok(txid) => {
                helper.finalize().await?;
                info!(name = %name, txid = %txid, "reveal queued");
                Ok(txid)
            }
            Err(e) => {
                helper.abort().await?;
                Err(e)
            }
        }
    }

    /// Find this wallet's commit for `name` by re-deriving the salt for
    /// each recorded commit output. First match wins.
    async fn scan_wallet_for_commit(&self, name: &Name) -> Result<(Salt, TxId)> {
        for tx in self.store.transactions().await? {
            if tx.name_outputs().count() > 1 {
                // First operation wins below; behavior on such
                // transactions is unspecified.
                warn!(txid = %tx.txid(), "wallet transaction carries multiple name outputs");
            }
            for (vout, op) in tx.name_outputs() {
                let NameOp::Commit { commitment } = op else {
                    continue;
                };
                let Some(out) = tx.outputs.get(vout as usize) else {
                    continue;
                };
                let Some(key) = self.keys.signing_key_for(&out.dest).await? else {
                    continue;
                };
                let salt = Salt::derive(&key, name);
                if commitment.verify(&salt, name) {
                    return Ok((salt, tx.txid()));
                }
            }
        }
        Err(ProtocolError::PriorOutputNotFound(format!(
            "no wallet commit found for {}",
            name
        )))
    }

    /// Change a registered name's value, chaining off the newest
    /// operation output and broadcasting immediately.
    ///
    /// When `value` is omitted the current value is carried forward,
    /// preferring the newest pending one.
    pub async fn update(
        &self,
        name: &Name,
        value: Option<&Value>,
        opts: UpdateOptions,
    ) -> Result<TxId> {
        let _guard = self.op_lock.lock().await;
        self.ledger.sync_to_tip().await?;

        check_name(name.as_bytes())?;
        if let Some(value) = value {
            check_value(value.as_bytes())?;
        }

        let view = self.view();
        let pending = view.pending_chain_length(name).await?;
        if pending >= self.config.chain_limit {
            return Err(ProtocolError::ChainLimitExceeded {
                name: name.to_string(),
                pending,
                limit: self.config.chain_limit,
            });
        }

        let outpoint = view
            .last_operation_outpoint(name)
            .await?
            .ok_or_else(|| ProtocolError::NameNotRegistered(name.to_string()))?;

        let value = match value {
            Some(value) => value.clone(),
            None => view
                .current_value(name)
                .await?
                .ok_or_else(|| ProtocolError::NameNotRegistered(name.to_string()))?,
        };

        let signer = self.signer().await?;
        let mut helper = DestinationHelper::new(self.dests.as_ref(), opts.dest_override);
        let dest = helper.destination().await?;

        let plan = NamePlan {
            op: NameOp::Update {
                name: name.clone(),
                value,
            },
            dest,
            prior: Some((outpoint, SEQUENCE_FINAL)),
        };
        match self.assembler().broadcast(&signer, plan).await {
            Ok(txid) => {
                helper.finalize().await?;
                info!(name = %name, txid = %txid, "update broadcast");
                Ok(txid)
            }
            Err(e) => {
                helper.abort().await?;
                Err(e)
            }
        }
    }

    /// One-call registration: broadcast the commit now and queue the
    /// reveal for when it matures.
    ///
    /// With `delegate` set, a second commit-reveal pair registers a
    /// delegated name carrying the caller's value, while the parent's
    /// reveal carries an import value pointing at it.
    pub async fn auto_register(
        &self,
        name: &Name,
        value: Option<&Value>,
        opts: AutoRegisterOptions,
    ) -> Result<Vec<CommitHandle>> {
        let _guard = self.op_lock.lock().await;
        self.ledger.sync_to_tip().await?;

        check_name(name.as_bytes())?;
        if let Some(value) = value {
            check_value(value.as_bytes())?;
        }

        let view = self.view();
        if view.registers_name(name).await? {
            return Err(ProtocolError::NameAlreadyRegistering(name.to_string()));
        }
        if !opts.allow_existing && view.exists(name).await? {
            return Err(ProtocolError::NameExists(name.to_string()));
        }

        let caller_value = value.cloned().unwrap_or_else(Value::empty);

        let commit_opts = CommitOptions {
            allow_existing: opts.allow_existing,
            dest_override: opts.dest_override,
        };

        if !opts.delegate {
            let handle = self.commit_locked(name, &commit_opts).await?;
            self.queue_reveal_for(&handle, &caller_value, opts.dest_override)
                .await?;
            return Ok(vec![handle]);
        }

        let delegated = DelegationPlanner.plan(name, &view).await?;

        let parent = self.commit_locked(name, &commit_opts).await?;
        self.queue_reveal_for(&parent, &delegated.import_value, opts.dest_override)
            .await?;

        let child = self.commit_locked(&delegated.name, &commit_opts).await?;
        self.queue_reveal_for(&child, &caller_value, opts.dest_override)
            .await?;

        Ok(vec![parent, child])
    }

    /// Queue the reveal for a commit this protocol just broadcast.
    ///
    /// The commit output is located from the wallet record rather than
    /// the ledger, since the commit is still unconfirmed.
    async fn queue_reveal_for(
        &self,
        handle: &CommitHandle,
        value: &Value,
        dest_override: Option<Destination>,
    ) -> Result<TxId> {
        let tx = self
            .store
            .get_transaction(handle.txid)
            .await?
            .ok_or_else(|| ProtocolError::PriorOutputNotFound(handle.txid.to_string()))?;
        let (vout, _) = tx
            .name_output()
            .ok_or_else(|| ProtocolError::PriorOutputNotFound(handle.txid.to_string()))?;
        let outpoint = Outpoint::new(handle.txid, vout);

        let signer = self.signer().await?;
        let mut helper = DestinationHelper::new(self.dests.as_ref(), dest_override);
        let dest = helper.destination().await?;

        let plan = NamePlan {
            op: NameOp::Reveal {
                name: handle.name.clone(),
                value: value.clone(),
                salt: handle.salt,
            },
            dest,
            prior: Some((outpoint, REVEAL_SEQUENCE)),
        };
        match self.assembler().queue(&signer, plan).await {
            Ok(txid) => {
                helper.finalize().await?;
                info!(name = %handle.name, txid = %txid, "reveal queued");
                Ok(txid)
            }
            Err(e) => {
                helper.abort().await?;
                Err(e)
            }
        }
    }

    /// Accept externally-built raw transaction bytes.
    ///
    /// Valid transactions are broadcast immediately. Transactions the
    /// pool rejects for a reason that may clear, such as an immature
    /// input, are queued. Consensus-invalid transactions are refused.
    pub async fn enqueue_raw(&self, raw: &[u8]) -> Result<TxId> {
        let _guard = self.op_lock.lock().await;
        self.ledger.sync_to_tip().await?;

        let tx =
            decode_transaction(raw).map_err(|e| ProtocolError::InvalidInput(e.to_string()))?;
        verify_transaction(&tx)?;

        match self.pool.test_accept(&tx).await? {
            AcceptDecision::Accept => {
                self.broadcaster.broadcast(&tx).await?;
                self.store.record_transaction(&tx).await?;
                let txid = tx.txid();
                info!(txid = %txid, "raw transaction broadcast");
                Ok(txid)
            }
            AcceptDecision::Invalid(reason) => Err(ProtocolError::InvalidInput(format!(
                "transaction rejected: {}",
                reason
            ))),
            AcceptDecision::NotCurrentlyValid(reason) => {
                // The transaction arrives signed; no wallet key is needed
                // to hold it in the queue.
                let txid = self.assembler().queue_signed(&tx).await?;
                info!(txid = %txid, reason = %reason, "raw transaction queued");
                Ok(txid)
            }
        }
    }

    /// Remove a transaction from the deferred queue and release its coin
    /// locks.
    pub async fn dequeue(&self, txid: TxId) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let queued = self.store.queued().await?;
        let Some(tx) = queued.get(&txid) else {
            return Err(ProtocolError::QueueEraseFailed(format!(
                "{} is not queued",
                txid
            )));
        };

        self.store
            .dequeue(txid)
            .await
            .map_err(|e| ProtocolError::QueueEraseFailed(e.to_string()))?;

        for input in &tx.inputs {
            if let Err(e) = self.store.unlock_coin(input.prevout).await {
                warn!(outpoint = %input.prevout, error = %e, "failed to release coin lock");
            }
        }
        info!(txid = %txid, "dequeued transaction");
        Ok(())
    }

    /// A stable snapshot of the deferred queue.
    pub async fn queued_transactions(&self) -> Result<BTreeMap<TxId, Transaction>> {
        Ok(self.store.queued().await?)
    }

    /// Names owned by this wallet, per the newest confirmed disclosure.
    ///
    /// Queued and broadcast-but-unconfirmed transactions are excluded. An
    /// entry only appears once its name output is a confirmed ledger coin.
    pub async fn list_names(&self) -> Result<Vec<WalletNameEntry>> {
        let queued = self.store.queued().await?;
        let mut entries: BTreeMap<Vec<u8>, WalletNameEntry> = BTreeMap::new();

        for tx in self.store.transactions().await? {
            let txid = tx.txid();
            if queued.contains_key(&txid) {
                continue;
            }
            if tx.name_outputs().count() > 1 {
                warn!(txid = %txid, "wallet transaction carries multiple name outputs");
            }
            // Records are in insertion order, so a later confirmed
            // transaction replaces an earlier entry for the same name.
            for (vout, op) in tx.name_outputs() {
                if !op.is_update_like() {
                    continue;
                }
                let (Some(name), Some(value)) = (op.name(), op.value()) else {
                    continue;
                };
                let outpoint = Outpoint::new(txid, vout);
                if self.ledger.coin_at(&outpoint).await?.is_none() {
                    continue;
                }
                entries.insert(
                    name.as_bytes().to_vec(),
                    WalletNameEntry {
                        name: name.clone(),
                        value: value.clone(),
                        outpoint,
                    },
                );
                break;
            }
        }

        Ok(entries.into_values().collect())
    }
}
