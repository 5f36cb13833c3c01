//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! The canonical encoding is critical: it ensures that the same transaction
//! produces identical bytes (and thus an identical txid) across all
//! platforms, and that queued raw bytes round-trip through storage exactly.

use ciborium::value::Value;

use crate::crypto::{Commitment, PublicKey, Salt, Signature};
use crate::error::CoreError;
use crate::nameop::NameOp;
use crate::tx::{Transaction, TxIn, TxOut, TxWitness};
use crate::types::{Destination, Name, Outpoint, TxId, Value as NameValue};
use crate::{COMMITMENT_LEN, SALT_LEN};

/// Transaction field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const INPUTS: u64 = 1;
    pub const OUTPUTS: u64 = 2;
    pub const WITNESS: u64 = 3;
}

/// Encode a transaction to canonical CBOR bytes.
pub fn canonical_tx_bytes(tx: &Transaction) -> Vec<u8> {
    let value = tx_to_cbor_value(tx, true);
    encode_cbor_value_canonical(&value)
}

/// Encode a transaction with the witness omitted.
///
/// These are the bytes the signing key commits to.
pub fn unsigned_tx_bytes(tx: &Transaction) -> Vec<u8> {
    let value = tx_to_cbor_value(tx, false);
    encode_cbor_value_canonical(&value)
}

/// Convert a transaction to a CBOR Value (map with integer keys).
fn tx_to_cbor_value(tx: &Transaction, with_witness: bool) -> Value {
    let mut entries = Vec::with_capacity(4);

    entries.push((
        Value::Integer(keys::VERSION.into()),
        Value::Integer(tx.version.into()),
    ));

    let inputs: Vec<Value> = tx
        .inputs
        .iter()
        .map(|input| {
            Value::Array(vec![
                Value::Bytes(input.prevout.txid.0.to_vec()),
                Value::Integer(input.prevout.vout.into()),
                Value::Integer(input.sequence.into()),
            ])
        })
        .collect();
    entries.push((Value::Integer(keys::INPUTS.into()), Value::Array(inputs)));

    let outputs: Vec<Value> = tx
        .outputs
        .iter()
        .map(|out| {
            let op = match &out.name_op {
                Some(op) => name_op_to_cbor_value(op),
                None => Value::Null,
            };
            Value::Array(vec![
                Value::Integer(out.amount.into()),
                Value::Bytes(out.dest.0.to_vec()),
                op,
            ])
        })
        .collect();
    entries.push((Value::Integer(keys::OUTPUTS.into()), Value::Array(outputs)));

    let witness = match (&tx.witness, with_witness) {
        (Some(w), true) => Value::Array(vec![
            Value::Bytes(w.key.0.to_vec()),
            Value::Bytes(w.signature.0.to_vec()),
        ]),
        _ => Value::Null,
    };
    entries.push((Value::Integer(keys::WITNESS.into()), witness));

    Value::Map(entries)
}

/// Convert a name operation to a tagged CBOR array.
fn name_op_to_cbor_value(op: &NameOp) -> Value {
    match op {
        NameOp::Commit { commitment } => Value::Array(vec![
            Value::Integer(u64::from(op.tag()).into()),
            Value::Bytes(commitment.0.to_vec()),
        ]),
        NameOp::Reveal { name, value, salt } => Value::Array(vec![
            Value::Integer(u64::from(op.tag()).into()),
            Value::Bytes(name.as_bytes().to_vec()),
            Value::Bytes(value.as_bytes().to_vec()),
            Value::Bytes(salt.0.to_vec()),
        ]),
        NameOp::Update { name, value } => Value::Array(vec![
            Value::Integer(u64::from(op.tag()).into()),
            Value::Bytes(name.as_bytes().to_vec()),
            Value::Bytes(value.as_bytes().to_vec()),
        ]),
    }
}

/// Encode a CBOR Value to canonical bytes.
///
/// This function ensures:
/// - Map keys are sorted by encoded byte comparison
/// - Integers use smallest encoding
/// - Definite lengths only
fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => {
            encode_integer(buf, *i);
        }
        Value::Bytes(b) => {
            encode_bytes(buf, b);
        }
        Value::Text(s) => {
            encode_text(buf, s);
        }
        Value::Array(arr) => {
            encode_array(buf, arr);
        }
        Value::Map(entries) => {
            encode_map_canonical(buf, entries);
        }
        Value::Bool(b) => {
            buf.push(if *b { 0xf5 } else { 0xf4 });
        }
        Value::Null => {
            buf.push(0xf6);
        }
        Value::Float(_) => {
            panic!("floats not supported in canonical encoding");
        }
        _ => {
            panic!("unsupported CBOR value type");
        }
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        // Major type 0: unsigned integer
        encode_uint(buf, 0, n as u64);
    } else {
        // Major type 1: negative integer
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);

    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Decode a transaction from canonical bytes.
pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, CoreError> {
    let cursor = std::io::Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(cursor).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    cbor_value_to_tx(&value)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => {
            let n: i128 = (*i).into();
            u64::try_from(n).ok()
        }
        _ => None,
    }
}

fn as_array20(value: &Value) -> Option<[u8; 20]> {
    match value {
        Value::Bytes(b) if b.len() == 20 => {
            let mut arr = [0u8; 20];
            arr.copy_from_slice(b);
            Some(arr)
        }
        _ => None,
    }
}

fn as_array32(value: &Value) -> Option<[u8; 32]> {
    match value {
        Value::Bytes(b) if b.len() == 32 => {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(b);
            Some(arr)
        }
        _ => None,
    }
}

/// Convert a CBOR Value (map) back to a Transaction.
fn cbor_value_to_tx(value: &Value) -> Result<Transaction, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedTransaction("expected map".into())),
    };

    // Helper to get a value by integer key
    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| as_u64(k) == Some(key))
            .map(|(_, v)| v)
    };

    let version = get(keys::VERSION)
        .and_then(as_u64)
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| CoreError::MalformedTransaction("missing version".into()))?;

    let inputs = match get(keys::INPUTS) {
        Some(Value::Array(arr)) => {
            let mut inputs = Vec::with_capacity(arr.len());
            for item in arr {
                inputs.push(cbor_value_to_input(item)?);
            }
            inputs
        }
        _ => return Err(CoreError::MalformedTransaction("invalid inputs".into())),
    };

    let outputs = match get(keys::OUTPUTS) {
        Some(Value::Array(arr)) => {
            let mut outputs = Vec::with_capacity(arr.len());
            for item in arr {
                outputs.push(cbor_value_to_output(item)?);
            }
            outputs
        }
        _ => return Err(CoreError::MalformedTransaction("invalid outputs".into())),
    };

    let witness = match get(keys::WITNESS) {
        Some(Value::Array(arr)) if arr.len() == 2 => {
            let key = as_array32(&arr[0])
                .ok_or_else(|| CoreError::MalformedTransaction("invalid witness key".into()))?;
            let sig = match &arr[1] {
                Value::Bytes(b) if b.len() == 64 => {
                    let mut out = [0u8; 64];
                    out.copy_from_slice(b);
                    out
                }
                _ => {
                    return Err(CoreError::MalformedTransaction(
                        "invalid witness signature".into(),
                    ))
                }
            };
            Some(TxWitness {
                key: PublicKey(key),
                signature: Signature(sig),
            })
        }
        Some(Value::Null) | None => None,
        _ => return Err(CoreError::MalformedTransaction("invalid witness".into())),
    };

    Ok(Transaction {
        version,
        inputs,
        outputs,
        witness,
    })
}

fn cbor_value_to_input(value: &Value) -> Result<TxIn, CoreError> {
    let arr = match value {
        Value::Array(a) if a.len() == 3 => a,
        _ => return Err(CoreError::MalformedTransaction("invalid input".into())),
    };
    let txid = as_array32(&arr[0])
        .ok_or_else(|| CoreError::MalformedTransaction("invalid input txid".into()))?;
    let vout = as_u64(&arr[1])
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| CoreError::MalformedTransaction("invalid input vout".into()))?;
    let sequence = as_u64(&arr[2])
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| CoreError::MalformedTransaction("invalid input sequence".into()))?;
    Ok(TxIn {
        prevout: Outpoint::new(TxId(txid), vout),
        sequence,
    })
}

fn cbor_value_to_output(value: &Value) -> Result<TxOut, CoreError> {
    let arr = match value {
        Value::Array(a) if a.len() == 3 => a,
        _ => return Err(CoreError::MalformedTransaction("invalid output".into())),
    };
    let amount = as_u64(&arr[0])
        .ok_or_else(|| CoreError::MalformedTransaction("invalid output amount".into()))?;
    let dest = as_array20(&arr[1])
        .ok_or_else(|| CoreError::MalformedTransaction("invalid output dest".into()))?;
    let name_op = match &arr[2] {
        Value::Null => None,
        op => Some(cbor_value_to_name_op(op)?),
    };
    Ok(TxOut {
        amount,
        dest: Destination(dest),
        name_op,
    })
}

fn cbor_value_to_name_op(value: &Value) -> Result<NameOp, CoreError> {
    let arr = match value {
        Value::Array(a) if !a.is_empty() => a,
        _ => return Err(CoreError::MalformedTransaction("invalid name op".into())),
    };
    let tag = as_u64(&arr[0])
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| CoreError::MalformedTransaction("invalid name op tag".into()))?;

    let name_at = |idx: usize| -> Result<Name, CoreError> {
        match arr.get(idx) {
            Some(Value::Bytes(b)) => Name::new(b.clone()),
            _ => Err(CoreError::MalformedTransaction("invalid op name".into())),
        }
    };
    let value_at = |idx: usize| -> Result<NameValue, CoreError> {
        match arr.get(idx) {
            Some(Value::Bytes(b)) => NameValue::new(b.clone()),
            _ => Err(CoreError::MalformedTransaction("invalid op value".into())),
        }
    };

    match (tag, arr.len()) {
        (t, 2) if t == NameOp::COMMIT_TAG => {
            let bytes = match &arr[1] {
                Value::Bytes(b) if b.len() == COMMITMENT_LEN => {
                    let mut out = [0u8; COMMITMENT_LEN];
                    out.copy_from_slice(b);
                    out
                }
                _ => return Err(CoreError::MalformedTransaction("invalid commitment".into())),
            };
            Ok(NameOp::Commit {
                commitment: Commitment(bytes),
            })
        }
        (t, 4) if t == NameOp::REVEAL_TAG => {
            let salt = match &arr[3] {
                Value::Bytes(b) if b.len() == SALT_LEN => {
                    let mut out = [0u8; SALT_LEN];
                    out.copy_from_slice(b);
                    out
                }
                _ => return Err(CoreError::MalformedTransaction("invalid salt".into())),
            };
            Ok(NameOp::Reveal {
                name: name_at(1)?,
                value: value_at(2)?,
                salt: Salt(salt),
            })
        }
        (t, 3) if t == NameOp::UPDATE_TAG => Ok(NameOp::Update {
            name: name_at(1)?,
            value: value_at(2)?,
        }),
        _ => Err(CoreError::MalformedTransaction(format!(
            "unknown name op tag: {}",
            tag
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::tx::TransactionBuilder;
    use crate::NAME_AMOUNT;

    fn sample_tx() -> Transaction {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let salt = Salt::from_bytes([0x11; SALT_LEN]);
        let name = Name::try_from("d/example").unwrap();
        TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xaa; 32]), 0))
            .name_output(
                NAME_AMOUNT,
                keypair.destination(),
                NameOp::Commit {
                    commitment: Commitment::of(&salt, &name),
                },
            )
            .pay(777, keypair.destination())
            .sign(&keypair)
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let tx = sample_tx();
        assert_eq!(canonical_tx_bytes(&tx), canonical_tx_bytes(&tx));
    }

    #[test]
    fn test_unsigned_bytes_differ_from_signed() {
        let tx = sample_tx();
        assert_ne!(canonical_tx_bytes(&tx), unsigned_tx_bytes(&tx));
    }

    #[test]
    fn test_transaction_roundtrip() {
        let tx = sample_tx();
        let bytes = canonical_tx_bytes(&tx);
        let decoded = decode_transaction(&bytes).unwrap();
        assert_eq!(tx, decoded);
        assert_eq!(tx.txid(), decoded.txid());
    }

    #[test]
    fn test_reveal_and_update_ops_roundtrip() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let name = Name::try_from("d/example").unwrap();
        let value = NameValue::try_from("{\"ip\":\"1.2.3.4\"}").unwrap();
        let salt = Salt::from_bytes([0x33; SALT_LEN]);

        let reveal = TransactionBuilder::new()
            .input(Outpoint::new(TxId::from_bytes([0xbb; 32]), 1))
            .name_output(
                NAME_AMOUNT,
                keypair.destination(),
                NameOp::Reveal {
                    name: name.clone(),
                    value: value.clone(),
                    salt,
                },
            )
            .sign(&keypair);
        let update = TransactionBuilder::new()
            .input(Outpoint::new(reveal.txid(), 0))
            .name_output(
                NAME_AMOUNT,
                keypair.destination(),
                NameOp::Update { name, value },
            )
            .sign(&keypair);

        for tx in [reveal, update] {
            let decoded = decode_transaction(&canonical_tx_bytes(&tx)).unwrap();
            assert_eq!(tx, decoded);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_transaction(&[0xff, 0x00, 0x13]).is_err());
        assert!(decode_transaction(b"not cbor at all").is_err());
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        // 0-23: single byte
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        // 24-255: two bytes
        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 255);
        assert_eq!(buf, vec![0x18, 255]);

        // 256-65535: three bytes
        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(8.into()), Value::Integer(80.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(5.into()), Value::Integer(50.into())),
        ];
        encode_map_canonical(&mut buf, &entries);

        // Map header (3 entries), keys in order 0, 5, 8
        assert_eq!(buf[0], 0xa3);
        assert_eq!(buf[1], 0x00);
        assert_eq!(buf[2], 0x00);
        assert_eq!(buf[3], 0x05);
        assert_eq!(buf[4], 0x18);
        assert_eq!(buf[5], 50);
        assert_eq!(buf[6], 0x08);
        assert_eq!(buf[7], 0x18);
        assert_eq!(buf[8], 80);
    }
}
