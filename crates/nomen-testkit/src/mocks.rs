//! In-memory stand-ins for the ledger and wallet capabilities.
//!
//! [`MockChain`] plays the node: a confirmed name index, a coin set, a
//! pending pool, and a broadcast log. [`MockWalletFunds`] plays the
//! wallet backend: coins, a keypool, and key resolution. Both are safe
//! to share behind `Arc` and mutate from test code while a protocol
//! instance holds them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use nomen_core::{
    Destination, Keypair, Name, NameOp, Outpoint, Transaction, TxId, TxOut, Value, NAME_AMOUNT,
};
use nomen_ledger::{
    AcceptDecision, Broadcaster, CoinSelector, DestinationSource, KeyResolver, LedgerError,
    LedgerQuery, NameRecord, PoolQuery, ReservedDestination, Result,
};

/// Blocks a confirmed registration stays active before it lapses.
pub const NAME_EXPIRY: u64 = 36_000;

#[derive(Default)]
struct ChainState {
    height: u64,
    records: HashMap<Vec<u8>, NameRecord>,
    coins: HashMap<Outpoint, TxOut>,
    pending: Vec<Transaction>,
    broadcasts: Vec<Transaction>,
    accept: Option<AcceptDecision>,
    broadcast_failure: Option<String>,
}

/// A scripted chain backend implementing [`LedgerQuery`], [`PoolQuery`],
/// and [`Broadcaster`].
///
/// Broadcast transactions land in the pending pool and stay visible to
/// pool queries until [`MockChain::confirm_broadcasts`] folds them into
/// confirmed state.
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                height: 100,
                ..ChainState::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_height(&self, height: u64) {
        self.state().height = height;
    }

    pub fn height(&self) -> u64 {
        self.state().height
    }

    /// Place an unspent output at an outpoint.
    pub fn add_coin(&self, outpoint: Outpoint, out: TxOut) {
        self.state().coins.insert(outpoint, out);
    }

    /// Install a confirmed registration directly, bypassing the
    /// commit-reveal exchange. Returns the synthesized record outpoint.
    pub fn confirm_name(&self, name: &Name, value: &Value, dest: Destination) -> Outpoint {
        let txid = TxId(*blake3::hash(name.as_bytes()).as_bytes());
        let outpoint = Outpoint::new(txid, 0);
        let mut state = self.state();
        let expiry_height = state.height + NAME_EXPIRY;
        state.coins.insert(
            outpoint,
            TxOut::name(
                NAME_AMOUNT,
                dest,
                NameOp::Update {
                    name: name.clone(),
                    value: value.clone(),
                },
            ),
        );
        state.records.insert(
            name.as_bytes().to_vec(),
            NameRecord {
                value: value.clone(),
                outpoint,
                expiry_height,
            },
        );
        outpoint
    }

    /// Mark a confirmed registration as lapsed at the current height.
    pub fn expire_name(&self, name: &Name) {
        let mut state = self.state();
        let height = state.height;
        if let Some(record) = state.records.get_mut(name.as_bytes()) {
            record.expiry_height = height;
        }
    }

    /// Fold every pending transaction into confirmed state: spent coins
    /// disappear, created outputs become coins, disclosed names gain or
    /// refresh their records, and the height advances by one block.
    pub fn confirm_broadcasts(&self) {
        let mut state = self.state();
        state.height += 1;
        let height = state.height;
        let pending = std::mem::take(&mut state.pending);
        for tx in pending {
            let txid = tx.txid();
            for input in &tx.inputs {
                state.coins.remove(&input.prevout);
            }
            for (vout, out) in tx.outputs.iter().enumerate() {
                let outpoint = Outpoint::new(txid, vout as u32);
                state.coins.insert(outpoint, out.clone());
                let Some(op) = &out.name_op else {
                    continue;
                };
                if !op.is_update_like() {
                    continue;
                }
                let (Some(name), Some(value)) = (op.name(), op.value()) else {
                    continue;
                };
                state.records.insert(
                    name.as_bytes().to_vec(),
                    NameRecord {
                        value: value.clone(),
                        outpoint,
                        expiry_height: height + NAME_EXPIRY,
                    },
                );
            }
        }
    }

    /// Force the trial-acceptance verdict for every transaction.
    pub fn set_accept_decision(&self, decision: AcceptDecision) {
        self.state().accept = Some(decision);
    }

    /// Make every subsequent broadcast fail with this reason.
    pub fn fail_broadcasts(&self, reason: &str) {
        self.state().broadcast_failure = Some(reason.to_string());
    }

    /// Every transaction broadcast so far, in order.
    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.state().broadcasts.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Inject a transaction into the pending pool without broadcasting.
    pub fn add_pending(&self, tx: Transaction) {
        self.state().pending.push(tx);
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerQuery for MockChain {
    async fn name_record(&self, name: &Name) -> Result<Option<NameRecord>> {
        Ok(self.state().records.get(name.as_bytes()).cloned())
    }

    async fn active_height(&self) -> Result<u64> {
        Ok(self.state().height)
    }

    async fn coin_at(&self, outpoint: &Outpoint) -> Result<Option<TxOut>> {
        Ok(self.state().coins.get(outpoint).cloned())
    }

    async fn sync_to_tip(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl PoolQuery for MockChain {
    async fn registers_name(&self, name: &Name) -> Result<bool> {
        Ok(self.state().pending.iter().any(|tx| {
            tx.name_output()
                .is_some_and(|(_, op)| matches!(op, NameOp::Reveal { .. }) && op.name() == Some(name))
        }))
    }

    async fn pending_chain_length(&self, name: &Name) -> Result<u32> {
        let count = self
            .state()
            .pending
            .iter()
            .filter(|tx| {
                tx.name_output()
                    .is_some_and(|(_, op)| op.is_update_like() && op.name() == Some(name))
            })
            .count();
        Ok(count as u32)
    }

    async fn last_name_output(&self, name: &Name) -> Result<Option<Outpoint>> {
        let state = self.state();
        for tx in state.pending.iter().rev() {
            if let Some((vout, op)) = tx.name_output() {
                if op.is_update_like() && op.name() == Some(name) {
                    return Ok(Some(Outpoint::new(tx.txid(), vout)));
                }
            }
        }
        Ok(None)
    }

    async fn pending_value(&self, name: &Name) -> Result<Option<Value>> {
        let state = self.state();
        for tx in state.pending.iter().rev() {
            if let Some((_, op)) = tx.name_output() {
                if op.is_update_like() && op.name() == Some(name) {
                    return Ok(op.value().cloned());
                }
            }
        }
        Ok(None)
    }

    async fn test_accept(&self, _tx: &Transaction) -> Result<AcceptDecision> {
        Ok(self
            .state()
            .accept
            .clone()
            .unwrap_or(AcceptDecision::Accept))
    }
}

#[async_trait]
impl Broadcaster for MockChain {
    async fn broadcast(&self, tx: &Transaction) -> Result<()> {
        let mut state = self.state();
        if let Some(reason) = &state.broadcast_failure {
            return Err(LedgerError::Broadcast(reason.clone()));
        }
        state.broadcasts.push(tx.clone());
        state.pending.push(tx.clone());
        Ok(())
    }
}

struct FundsState {
    utxos: Vec<(Outpoint, TxOut)>,
    issued: Vec<Destination>,
    next_reservation: u64,
    next_coin: u64,
    kept: Vec<u64>,
    released: Vec<u64>,
    keypool_empty: bool,
    wallet_locked: bool,
}

/// A scripted wallet backend implementing [`CoinSelector`],
/// [`DestinationSource`], and [`KeyResolver`].
///
/// One keypair controls every destination it hands out; key resolution
/// answers for the keypair's own destination and for any reserved one,
/// unless the wallet is locked.
pub struct MockWalletFunds {
    keypair: Keypair,
    state: Mutex<FundsState>,
}

impl MockWalletFunds {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            state: Mutex::new(FundsState {
                utxos: Vec::new(),
                issued: Vec::new(),
                next_reservation: 0,
                next_coin: 0,
                kept: Vec::new(),
                released: Vec::new(),
                keypool_empty: false,
                wallet_locked: false,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FundsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a spendable coin of the given amount. Returns its outpoint.
    pub fn add_coin(&self, amount: u64) -> Outpoint {
        let mut state = self.state();
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&state.next_coin.to_le_bytes());
        seed[8] = 0xfc;
        state.next_coin += 1;
        let outpoint = Outpoint::new(TxId::from_bytes(seed), 0);
        let out = TxOut::payment(amount, self.keypair.destination());
        state.utxos.push((outpoint, out));
        outpoint
    }

    /// Remove every spendable coin, so selection fails with
    /// `InsufficientFunds`.
    pub fn drain_coins(&self) {
        self.state().utxos.clear();
    }

    /// Make subsequent reservations fail with `KeypoolExhausted`.
    pub fn exhaust_keypool(&self) {
        self.state().keypool_empty = true;
    }

    /// Make key resolution answer `None` for every destination.
    pub fn lock_wallet(&self) {
        self.state().wallet_locked = true;
    }

    pub fn unlock_wallet(&self) {
        self.state().wallet_locked = false;
    }

    /// Reservation handles committed via `keep` so far.
    pub fn kept(&self) -> Vec<u64> {
        self.state().kept.clone()
    }

    /// Reservation handles returned via `release` so far.
    pub fn released(&self) -> Vec<u64> {
        self.state().released.clone()
    }

    fn derive_dest(&self, index: u64) -> Destination {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.keypair.destination().as_bytes());
        hasher.update(&index.to_le_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Destination::from_bytes(bytes)
    }
}

#[async_trait]
impl CoinSelector for MockWalletFunds {
    async fn select(&self, amount: u64) -> Result<Vec<(Outpoint, TxOut)>> {
        let mut state = self.state();
        let mut selected = Vec::new();
        let mut total = 0u64;
        while total < amount {
            let Some((outpoint, out)) = state.utxos.pop() else {
                return Err(LedgerError::InsufficientFunds { needed: amount });
            };
            total += out.amount;
            selected.push((outpoint, out));
        }
        Ok(selected)
    }
}

#[async_trait]
impl DestinationSource for MockWalletFunds {
    async fn reserve(&self) -> Result<ReservedDestination> {
        let mut state = self.state();
        if state.keypool_empty {
            return Err(LedgerError::KeypoolExhausted);
        }
        let index = state.next_reservation;
        state.next_reservation += 1;
        let dest = self.derive_dest(index);
        state.issued.push(dest);
        Ok(ReservedDestination { dest, index })
    }

    async fn keep(&self, reserved: ReservedDestination) -> Result<()> {
        self.state().kept.push(reserved.index);
        Ok(())
    }

    async fn release(&self, reserved: ReservedDestination) -> Result<()> {
        self.state().released.push(reserved.index);
        Ok(())
    }
}

#[async_trait]
impl KeyResolver for MockWalletFunds {
    async fn signing_key_for(&self, dest: &Destination) -> Result<Option<Keypair>> {
        let state = self.state();
        if state.wallet_locked {
            return Ok(None);
        }
        if *dest == self.keypair.destination() || state.issued.contains(dest) {
            return Ok(Some(self.keypair.clone()));
        }
        Ok(None)
    }
}
