//! Proptest strategies over the protocol's primitive types.

use proptest::prelude::*;

use nomen_core::{
    Commitment, Name, NameOp, Outpoint, Salt, TxId, Value, MAX_NAME_LEN, MAX_VALUE_LEN,
};

/// Conventionally-shaped names: a `d/` or `id/` namespace and a short
/// lowercase label.
pub fn name() -> impl Strategy<Value = Name> {
    ("(d|id)/", "[a-z0-9][a-z0-9-]{0,30}")
        .prop_map(|(ns, label)| Name::new(format!("{ns}{label}").into_bytes()).unwrap())
}

/// Arbitrary non-empty names up to the length bound, including
/// non-UTF-8 ones.
pub fn raw_name() -> impl Strategy<Value = Name> {
    proptest::collection::vec(any::<u8>(), 1..=MAX_NAME_LEN).prop_map(|b| Name::new(b).unwrap())
}

/// Arbitrary values up to the length bound, the empty value included.
pub fn value() -> impl Strategy<Value = Value> {
    proptest::collection::vec(any::<u8>(), 0..=MAX_VALUE_LEN.min(64))
        .prop_map(|b| Value::new(b).unwrap())
}

/// Uniform salts.
pub fn salt() -> impl Strategy<Value = Salt> {
    any::<[u8; 20]>().prop_map(Salt::from_bytes)
}

/// Key seeds.
pub fn seed() -> impl Strategy<Value = [u8; 32]> {
    any::<[u8; 32]>()
}

/// Arbitrary outpoints.
pub fn outpoint() -> impl Strategy<Value = Outpoint> {
    (any::<[u8; 32]>(), 0u32..16).prop_map(|(txid, vout)| Outpoint::new(TxId::from_bytes(txid), vout))
}

/// Any of the three name operations, built from generated parts.
pub fn name_op() -> impl Strategy<Value = NameOp> {
    (name(), value(), salt(), 0u8..3).prop_map(|(name, value, salt, which)| match which {
        0 => NameOp::Commit {
            commitment: Commitment::of(&salt, &name),
        },
        1 => NameOp::Reveal { name, value, salt },
        _ => NameOp::Update { name, value },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomen_core::{decode_transaction, Keypair, TransactionBuilder, NAME_AMOUNT};

    proptest! {
        #[test]
        fn prop_commitment_verifies_only_with_its_salt(
            name in raw_name(),
            salt_a in salt(),
            salt_b in salt(),
        ) {
            let commitment = Commitment::of(&salt_a, &name);
            prop_assert!(commitment.verify(&salt_a, &name));
            if salt_a != salt_b {
                prop_assert!(!commitment.verify(&salt_b, &name));
            }
        }

        #[test]
        fn prop_salt_derivation_is_deterministic(seed in seed(), name in raw_name()) {
            let keypair = Keypair::from_seed(&seed);
            prop_assert_eq!(
                Salt::derive(&keypair, &name),
                Salt::derive(&keypair, &name)
            );
        }

        #[test]
        fn prop_distinct_names_derive_distinct_salts(
            seed in seed(),
            a in raw_name(),
            b in raw_name(),
        ) {
            if a != b {
                let keypair = Keypair::from_seed(&seed);
                prop_assert_ne!(Salt::derive(&keypair, &a), Salt::derive(&keypair, &b));
            }
        }

        #[test]
        fn prop_signed_transactions_roundtrip(
            seed in seed(),
            prevout in outpoint(),
            op in name_op(),
        ) {
            let keypair = Keypair::from_seed(&seed);
            let tx = TransactionBuilder::new()
                .input(prevout)
                .name_output(NAME_AMOUNT, keypair.destination(), op)
                .sign(&keypair);

            let bytes = nomen_core::canonical_tx_bytes(&tx);
            let decoded = decode_transaction(&bytes).unwrap();
            prop_assert_eq!(decoded.txid(), tx.txid());
            prop_assert_eq!(decoded, tx);
        }
    }
}
