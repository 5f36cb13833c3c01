//! # Nomen Ledger
//!
//! Capability traits the registration kernel consumes: confirmed-ledger
//! queries, pool queries, key resolution, destination reservation, coin
//! selection and broadcast. Plus [`NameLedgerView`], the read-only
//! composition the protocol queries through.
//!
//! Everything behind these traits is out of the kernel's hands: consensus
//! validation, index maintenance, pool admission, fee and coin-selection
//! policy all belong to the hosting node or wallet.

pub mod error;
pub mod traits;
pub mod view;

pub use error::{LedgerError, Result};
pub use traits::{
    AcceptDecision, Broadcaster, CoinSelector, DestinationSource, KeyResolver, LedgerQuery,
    NameRecord, PoolQuery, ReservedDestination,
};
pub use view::{CommitSearch, NameLedgerView, MAX_COMMIT_PREVOUT_TRIALS};
