//! Ready-made protocol instances wired to the mock backends.

use std::sync::Arc;

use nomen::{
    CommitHandle, CommitOptions, ProtocolConfig, RegistrationProtocol, Result, RevealOptions,
};
use nomen_core::{Keypair, Name, Value, NAME_AMOUNT};
use nomen_store::MemoryStore;

use crate::mocks::{MockChain, MockWalletFunds};

/// Coins the fixture wallet starts with.
const FIXTURE_COINS: usize = 8;

/// A registration protocol over an in-memory store, a [`MockChain`], and
/// a [`MockWalletFunds`] holding eight coins of twice the name amount.
///
/// The mock handles stay public so tests can script chain and wallet
/// state around protocol calls.
pub struct TestFixture {
    pub keypair: Keypair,
    pub chain: Arc<MockChain>,
    pub funds: Arc<MockWalletFunds>,
    pub protocol: RegistrationProtocol<MemoryStore>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        Self::build([7u8; 32], config)
    }

    /// A fixture whose wallet key is derived from `seed`, for tests that
    /// need distinct parties.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::build(seed, ProtocolConfig::default())
    }

    fn build(seed: [u8; 32], config: ProtocolConfig) -> Self {
        let keypair = Keypair::from_seed(&seed);
        let chain = Arc::new(MockChain::new());
        let funds = Arc::new(MockWalletFunds::new(keypair.clone()));
        for _ in 0..FIXTURE_COINS {
            funds.add_coin(2 * NAME_AMOUNT);
        }

        let protocol = RegistrationProtocol::new(
            keypair.clone(),
            Arc::new(MemoryStore::new()),
            chain.clone(),
            chain.clone(),
            funds.clone(),
            funds.clone(),
            funds.clone(),
            chain.clone(),
            config,
        );

        Self {
            keypair,
            chain,
            funds,
            protocol,
        }
    }

    /// Commit to a name and confirm the commit on chain.
    pub async fn commit_confirmed(&self, name: &Name) -> Result<CommitHandle> {
        let handle = self
            .protocol
            .register_commit(name, CommitOptions::default())
            .await?;
        self.chain.confirm_broadcasts();
        Ok(handle)
    }

    /// Commit, confirm, and queue the reveal for a name.
    pub async fn commit_and_reveal(&self, name: &Name, value: &Value) -> Result<CommitHandle> {
        let handle = self.commit_confirmed(name).await?;
        self.protocol
            .register_reveal(name, value, RevealOptions::default())
            .await?;
        Ok(handle)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A name from a literal, panicking on invalid input.
pub fn name(s: &str) -> Name {
    Name::try_from(s).unwrap()
}

/// A value from a literal, panicking on invalid input.
pub fn value(s: &str) -> Value {
    Value::try_from(s).unwrap()
}
