//! # Nomen Testkit
//!
//! Test utilities for the nomen registration protocol.
//!
//! ## Mocks
//!
//! [`MockChain`] stands in for the node: it answers ledger and pool
//! queries, accepts broadcasts into a pending pool, and confirms them on
//! demand. [`MockWalletFunds`] stands in for the wallet backend: coin
//! selection, a keypool, and key resolution, all scriptable.
//!
//! ## Fixtures
//!
//! [`TestFixture`] wires a [`nomen::RegistrationProtocol`] over an
//! in-memory store to both mocks, funded and ready to register names.
//!
//! ## Property Testing
//!
//! [`generators`] provides proptest strategies for names, values, salts,
//! and name operations.

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::{name, value, TestFixture};
pub use mocks::{MockChain, MockWalletFunds, NAME_EXPIRY};
