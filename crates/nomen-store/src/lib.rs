//! # Nomen Store
//!
//! Durable local wallet state for the registration kernel: the deferred
//! transaction queue, wallet transaction records, and coin locks.
//!
//! Two backends implement [`WalletStore`]:
//! - [`SqliteStore`] - the primary on-disk backend; the queue survives a
//!   restart.
//! - [`MemoryStore`] - same semantics, no persistence, for tests.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::WalletStore;
