//! Destination selection for name outputs.

use nomen_core::Destination;
use nomen_ledger::{DestinationSource, ReservedDestination};

use crate::error::Result;

/// Resolves the destination a name output pays to.
///
/// Either the caller supplied an override, or a fresh destination is
/// reserved from the keypool. A reservation is only kept once the
/// transaction using it has been sent or queued; every failure path must
/// call [`DestinationHelper::abort`] so the destination returns to the
/// pool.
pub struct DestinationHelper<'a> {
    source: &'a dyn DestinationSource,
    override_dest: Option<Destination>,
    reserved: Option<ReservedDestination>,
}

impl<'a> DestinationHelper<'a> {
    pub fn new(source: &'a dyn DestinationSource, override_dest: Option<Destination>) -> Self {
        Self {
            source,
            override_dest,
            reserved: None,
        }
    }

    /// The destination to pay. Reserves one lazily when no override was
    /// given.
    pub async fn destination(&mut self) -> Result<Destination> {
        if let Some(dest) = self.override_dest {
            return Ok(dest);
        }
        if let Some(reserved) = &self.reserved {
            return Ok(reserved.dest);
        }
        let reserved = self.source.reserve().await?;
        let dest = reserved.dest;
        self.reserved = Some(reserved);
        Ok(dest)
    }

    /// Commit the reservation after the transaction is durable.
    pub async fn finalize(self) -> Result<()> {
        if let Some(reserved) = self.reserved {
            self.source.keep(reserved).await?;
        }
        Ok(())
    }

    /// Return any reservation to the pool.
    pub async fn abort(self) -> Result<()> {
        if let Some(reserved) = self.reserved {
            self.source.release(reserved).await?;
        }
        Ok(())
    }
}
