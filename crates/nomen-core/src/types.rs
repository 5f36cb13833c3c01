//! Strong type definitions for nomen.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::{MAX_NAME_LEN, MAX_VALUE_LEN};

/// A registered name: an opaque byte string, at most [`MAX_NAME_LEN`] bytes.
///
/// Names are the primary key of a registration and immutable once chosen
/// for a given attempt. Conventionally they carry a namespace prefix such
/// as `d/` or `id/`, but the core treats them as raw bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name(Vec<u8>);

impl Name {
    /// Create a name, rejecting oversized input.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_NAME_LEN {
            return Err(CoreError::NameTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the name is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The namespace prefix up to and including the first `/`, if any.
    ///
    /// `d/example` yields `d/`; a name with no slash yields `None`.
    pub fn namespace(&self) -> Option<&[u8]> {
        self.0
            .iter()
            .position(|&b| b == b'/')
            .map(|idx| &self.0[..=idx])
    }

    /// The label after the first `/`, or the whole name if there is none.
    pub fn label(&self) -> &[u8] {
        match self.0.iter().position(|&b| b == b'/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Name({})", s),
            Err(_) => write!(f, "Name(0x{})", hex::encode(&self.0)),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&str> for Name {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s.as_bytes().to_vec())
    }
}

/// A value associated with a name: opaque bytes, at most [`MAX_VALUE_LEN`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value(Vec<u8>);

impl Value {
    /// Create a value, rejecting oversized input.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_VALUE_LEN {
            return Err(CoreError::ValueTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// The empty value, used when a registration omits one.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Value({})", s),
            Err(_) => write!(f, "Value(0x{})", hex::encode(&self.0)),
        }
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&str> for Value {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s.as_bytes().to_vec())
    }
}

/// A 32-byte transaction identifier, computed as Blake3(canonical tx bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    /// Create a new TxId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero transaction ID (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for TxId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for TxId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A reference to a spendable transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    /// The transaction carrying the output.
    pub txid: TxId,
    /// The output index within that transaction.
    pub vout: u32,
}

impl Outpoint {
    /// Create an outpoint.
    pub const fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A 20-byte payment destination, derived from a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination(pub [u8; 20]);

impl Destination {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Destination({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Destination {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_length_bound() {
        assert!(Name::new(vec![b'a'; MAX_NAME_LEN]).is_ok());
        assert!(matches!(
            Name::new(vec![b'a'; MAX_NAME_LEN + 1]),
            Err(CoreError::NameTooLong(_))
        ));
    }

    #[test]
    fn test_value_length_bound() {
        assert!(Value::new(vec![0u8; MAX_VALUE_LEN]).is_ok());
        assert!(matches!(
            Value::new(vec![0u8; MAX_VALUE_LEN + 1]),
            Err(CoreError::ValueTooLong(_))
        ));
    }

    #[test]
    fn test_name_namespace_and_label() {
        let name = Name::try_from("d/example").unwrap();
        assert_eq!(name.namespace(), Some(b"d/".as_slice()));
        assert_eq!(name.label(), b"example");

        let bare = Name::try_from("noslash").unwrap();
        assert_eq!(bare.namespace(), None);
        assert_eq!(bare.label(), b"noslash");
    }

    #[test]
    fn test_txid_hex_roundtrip() {
        let id = TxId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        let recovered = TxId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_txid_display() {
        let id = TxId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
    }

    #[test]
    fn test_outpoint_display() {
        let outp = Outpoint::new(TxId::from_bytes([0xcd; 32]), 3);
        assert_eq!(format!("{}", outp), "cdcdcdcdcdcdcdcd:3");
    }
}
