//! Wallet transactions.
//!
//! A transaction spends a set of outpoints and creates a set of outputs,
//! at most one of which carries a [`NameOp`]. Once signed it is immutable;
//! its identity is the Blake3 hash of its canonical bytes.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_tx_bytes, unsigned_tx_bytes};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::nameop::NameOp;
use crate::types::{Destination, Outpoint, TxId};

/// The current transaction schema version.
pub const TX_VERSION: u8 = 0;

/// Sequence value for inputs with no maturity constraint.
pub const SEQUENCE_FINAL: u32 = u32::MAX;

/// A transaction input: the outpoint it spends plus a sequence marker.
///
/// A sequence below [`SEQUENCE_FINAL`] expresses a relative maturity
/// requirement on the spent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// The output being spent.
    pub prevout: Outpoint,
    /// Relative maturity marker.
    pub sequence: u32,
}

impl TxIn {
    /// An input with no maturity constraint.
    pub fn new(prevout: Outpoint) -> Self {
        Self {
            prevout,
            sequence: SEQUENCE_FINAL,
        }
    }

    /// An input with an explicit sequence marker.
    pub fn with_sequence(prevout: Outpoint, sequence: u32) -> Self {
        Self { prevout, sequence }
    }
}

/// A transaction output: an amount paid to a destination, optionally
/// carrying a name operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Amount in base units.
    pub amount: u64,
    /// The paying destination.
    pub dest: Destination,
    /// The name operation attached to this output, if any.
    pub name_op: Option<NameOp>,
}

impl TxOut {
    /// A plain payment output.
    pub fn payment(amount: u64, dest: Destination) -> Self {
        Self {
            amount,
            dest,
            name_op: None,
        }
    }

    /// An output carrying a name operation.
    pub fn name(amount: u64, dest: Destination, op: NameOp) -> Self {
        Self {
            amount,
            dest,
            name_op: Some(op),
        }
    }
}

/// The signing witness: who signed and the signature over the unsigned
/// canonical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxWitness {
    /// The signing key's public half.
    pub key: PublicKey,
    /// Ed25519 signature over the unsigned canonical encoding.
    pub signature: Signature,
}

/// A wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Schema version (currently 0).
    pub version: u8,
    /// Spent outpoints, in order.
    pub inputs: Vec<TxIn>,
    /// Created outputs, in order.
    pub outputs: Vec<TxOut>,
    /// Signing witness (None while unsigned).
    pub witness: Option<TxWitness>,
}

impl Transaction {
    /// Compute the transaction ID (Blake3 hash of canonical bytes).
    pub fn txid(&self) -> TxId {
        let bytes = canonical_tx_bytes(self);
        let hash = blake3::hash(&bytes);
        TxId(*hash.as_bytes())
    }

    /// Whether the transaction carries a witness.
    pub fn is_signed(&self) -> bool {
        self.witness.is_some()
    }

    /// The first output carrying a name operation, with its index.
    ///
    /// Consensus admits at most one name output per transaction; callers
    /// that care about anomalies should use [`Transaction::name_outputs`].
    pub fn name_output(&self) -> Option<(u32, &NameOp)> {
        self.name_outputs().next()
    }

    /// All outputs carrying a name operation, with their indices.
    pub fn name_outputs(&self) -> impl Iterator<Item = (u32, &NameOp)> {
        self.outputs
            .iter()
            .enumerate()
            .filter_map(|(i, out)| out.name_op.as_ref().map(|op| (i as u32, op)))
    }

    /// Sign in place with the given keypair, replacing any prior witness.
    pub fn sign(&mut self, keypair: &Keypair) {
        let message = unsigned_tx_bytes(self);
        self.witness = Some(TxWitness {
            key: keypair.public_key(),
            signature: keypair.sign(&message),
        });
    }
}

/// Builder for creating transactions.
pub struct TransactionBuilder {
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
}

impl TransactionBuilder {
    /// Start building a transaction.
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Spend an outpoint with no maturity constraint.
    pub fn input(mut self, prevout: Outpoint) -> Self {
        self.inputs.push(TxIn::new(prevout));
        self
    }

    /// Spend an outpoint with an explicit sequence marker.
    pub fn input_with_sequence(mut self, prevout: Outpoint, sequence: u32) -> Self {
        self.inputs.push(TxIn::with_sequence(prevout, sequence));
        self
    }

    /// Add a plain payment output.
    pub fn pay(mut self, amount: u64, dest: Destination) -> Self {
        self.outputs.push(TxOut::payment(amount, dest));
        self
    }

    /// Add an output carrying a name operation.
    pub fn name_output(mut self, amount: u64, dest: Destination, op: NameOp) -> Self {
        self.outputs.push(TxOut::name(amount, dest, op));
        self
    }

    /// Build unsigned.
    pub fn build(self) -> Transaction {
        Transaction {
            version: TX_VERSION,
            inputs: self.inputs,
            outputs: self.outputs,
            witness: None,
        }
    }

    /// Build and sign.
    pub fn sign(self, keypair: &Keypair) -> Transaction {
        let mut tx = self.build();
        tx.sign(keypair);
        tx
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Commitment, Salt};
    use crate::types::Name;
    use crate::NAME_AMOUNT;

    fn sample_op() -> NameOp {
        let salt = Salt::from_bytes([0x11; 20]);
        let name = Name::try_from("d/example").unwrap();
        NameOp::Commit {
            commitment: Commitment::of(&salt, &name),
        }
    }

    #[test]
    fn test_builder_and_txid_deterministic() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let dest = keypair.destination();

        let tx = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .name_output(NAME_AMOUNT, dest, sample_op())
            .sign(&keypair);

        assert!(tx.is_signed());
        assert_eq!(tx.txid(), tx.txid());
    }

    #[test]
    fn test_name_output_lookup() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let dest = keypair.destination();

        let tx = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .pay(500, dest)
            .name_output(NAME_AMOUNT, dest, sample_op())
            .sign(&keypair);

        let (vout, op) = tx.name_output().unwrap();
        assert_eq!(vout, 1);
        assert!(op.is_commit());
        assert_eq!(tx.name_outputs().count(), 1);
    }

    #[test]
    fn test_plain_payment_has_no_name_output() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let tx = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .pay(500, keypair.destination())
            .sign(&keypair);

        assert!(tx.name_output().is_none());
    }

    #[test]
    fn test_sequence_marker_changes_txid() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let prevout = Outpoint::new(TxId::from_bytes([0xaa; 32]), 0);

        let a = TransactionBuilder::new()
            .input(prevout)
            .pay(500, keypair.destination())
            .sign(&keypair);
        let b = TransactionBuilder::new()
            .input_with_sequence(prevout, 13)
            .pay(500, keypair.destination())
            .sign(&keypair);

        assert_ne!(a.txid(), b.txid());
    }
}
