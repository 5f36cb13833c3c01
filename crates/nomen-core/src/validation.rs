//! Structural validation of names, values, and transactions.
//!
//! These checks are purely local. Ledger-dependent rules (does the name
//! exist, has the commit matured) live with the callers that can see the
//! ledger.

use crate::canonical::unsigned_tx_bytes;
use crate::error::CoreError;
use crate::tx::Transaction;
use crate::{MAX_NAME_LEN, MAX_VALUE_LEN};

/// Check that a candidate name is within bounds.
///
/// Names are opaque bytes; no character restrictions apply beyond length.
pub fn check_name(name: &[u8]) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::MalformedTransaction("empty name".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::NameTooLong(name.len()));
    }
    Ok(())
}

/// Check that a candidate value is within bounds. Empty values are allowed.
pub fn check_value(value: &[u8]) -> Result<(), CoreError> {
    if value.len() > MAX_VALUE_LEN {
        return Err(CoreError::ValueTooLong(value.len()));
    }
    Ok(())
}

/// Verify the structural integrity of a signed transaction.
///
/// Checks:
/// - At least one input and one output
/// - At most one output carries a name operation
/// - A witness is present and its signature covers the unsigned bytes
pub fn verify_transaction(tx: &Transaction) -> Result<(), CoreError> {
    if tx.inputs.is_empty() {
        return Err(CoreError::MalformedTransaction("no inputs".into()));
    }
    if tx.outputs.is_empty() {
        return Err(CoreError::MalformedTransaction("no outputs".into()));
    }
    if tx.name_outputs().count() > 1 {
        return Err(CoreError::MalformedTransaction(
            "multiple name outputs".into(),
        ));
    }
    for (_, op) in tx.name_outputs() {
        if let Some(name) = op.name() {
            check_name(name.as_bytes())?;
        }
        if let Some(value) = op.value() {
            check_value(value.as_bytes())?;
        }
    }

    let witness = tx.witness.as_ref().ok_or(CoreError::Unsigned)?;
    let message = unsigned_tx_bytes(tx);
    witness.key.verify(&message, &witness.signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Commitment, Keypair, Salt};
    use crate::nameop::NameOp;
    use crate::tx::TransactionBuilder;
    use crate::types::{Name, Outpoint, TxId, Value};
    use crate::{NAME_AMOUNT, SALT_LEN};

    fn commit_op() -> NameOp {
        let salt = Salt::from_bytes([0x11; SALT_LEN]);
        let name = Name::try_from("d/example").unwrap();
        NameOp::Commit {
            commitment: Commitment::of(&salt, &name),
        }
    }

    #[test]
    fn test_check_name_bounds() {
        assert!(check_name(b"d/example").is_ok());
        assert!(check_name(b"").is_err());
        assert!(check_name(&[b'a'; MAX_NAME_LEN]).is_ok());
        assert!(check_name(&[b'a'; MAX_NAME_LEN + 1]).is_err());
    }

    #[test]
    fn test_check_value_bounds() {
        assert!(check_value(b"").is_ok());
        assert!(check_value(&[0u8; MAX_VALUE_LEN]).is_ok());
        assert!(check_value(&[0u8; MAX_VALUE_LEN + 1]).is_err());
    }

    #[test]
    fn test_verify_signed_transaction() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let tx = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .name_output(NAME_AMOUNT, keypair.destination(), commit_op())
            .sign(&keypair);
        assert!(verify_transaction(&tx).is_ok());
    }

    #[test]
    fn test_verify_rejects_unsigned() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let tx = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .pay(100, keypair.destination())
            .build();
        assert!(matches!(verify_transaction(&tx), Err(CoreError::Unsigned)));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let mut tx = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .pay(100, keypair.destination())
            .sign(&keypair);
        tx.outputs[0].amount = 100_000;
        assert!(verify_transaction(&tx).is_err());
    }

    #[test]
    fn test_verify_rejects_multiple_name_outputs() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let name = Name::try_from("d/example").unwrap();
        let tx = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .name_output(NAME_AMOUNT, keypair.destination(), commit_op())
            .name_output(
                NAME_AMOUNT,
                keypair.destination(),
                NameOp::Update {
                    name,
                    value: Value::empty(),
                },
            )
            .sign(&keypair);
        assert!(verify_transaction(&tx).is_err());
    }

    #[test]
    fn test_verify_rejects_empty_inputs() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let tx = TransactionBuilder::new()
            .pay(100, keypair.destination())
            .sign(&keypair);
        assert!(verify_transaction(&tx).is_err());
    }
}
