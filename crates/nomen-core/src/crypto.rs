//! Cryptographic primitives for nomen.
//!
//! Wraps Ed25519 signing, Blake3 hashing, and HKDF-SHA256 salt derivation
//! with strong types.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::error::CoreError;
use crate::types::{Destination, Name};
use crate::{COMMITMENT_LEN, SALT_LEN};

/// Domain label mixed into every commitment hash.
const COMMITMENT_DOMAIN: &[u8] = b"nomen-commitment-v0:";

/// HKDF info label for deterministic salt derivation.
const SALT_INFO: &[u8] = b"nomen registration salt";

/// A 20-byte registration salt.
///
/// Known only to the registrant until reveal; prevents front-running of the
/// name choice. Derived deterministically from a signing key where possible
/// so that it can be reconstructed later without storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    /// Derive a salt from a signing key and name via HKDF-SHA256.
    ///
    /// The key seed is the input keying material and the name bytes are the
    /// HKDF salt parameter, so distinct names yield unrelated salts under
    /// the same key. Deterministic: identical inputs yield identical salts.
    pub fn derive(keypair: &Keypair, name: &Name) -> Self {
        let seed = keypair.seed();
        let hk = Hkdf::<Sha256>::new(Some(name.as_bytes()), &seed);
        let mut okm = [0u8; 32];
        // Expand to 32 bytes never fails for output <= 255 * hash_len.
        hk.expand(SALT_INFO, &mut okm)
            .unwrap_or_else(|_| unreachable!("HKDF output length is fixed"));

        let mut out = [0u8; SALT_LEN];
        out.copy_from_slice(&okm[..SALT_LEN]);
        Self(out)
    }

    /// Draw a cryptographically random salt.
    ///
    /// Used when no single signing key controls the destination output;
    /// equally valid for commitment purposes but not reproducible.
    pub fn random() -> Self {
        let mut out = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut out);
        Self(out)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != SALT_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; SALT_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Salts are secret until reveal; show a prefix only.
        write!(f, "Salt({}...)", &self.to_hex()[..8])
    }
}

impl AsRef<[u8]> for Salt {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 20-byte commitment hash binding a salt to a name.
///
/// Published on-ledger in the commit phase, before the name itself is
/// disclosed. Never stored separately by the wallet: it is recomputed from
/// the salt and name whenever it needs checking.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub [u8; COMMITMENT_LEN]);

impl Commitment {
    /// Compute the commitment over salt || name.
    pub fn of(salt: &Salt, name: &Name) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(COMMITMENT_DOMAIN);
        hasher.update(salt.as_bytes());
        hasher.update(name.as_bytes());
        let hash = hasher.finalize();

        let mut out = [0u8; COMMITMENT_LEN];
        out.copy_from_slice(&hash.as_bytes()[..COMMITMENT_LEN]);
        Self(out)
    }

    /// Recompute and compare. Commitments are public, so this need not be
    /// constant-time.
    pub fn verify(&self, salt: &Salt, name: &Name) -> bool {
        Self::of(salt, name) == *self
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; COMMITMENT_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The zero commitment (sentinel, never valid for a real salt).
    pub const ZERO: Self = Self([0u8; COMMITMENT_LEN]);
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes.
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

    /// The destination this key pays to.
    pub fn destination(&self) -> Destination {
        let hash = blake3::hash(&self.0);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash.as_bytes()[..20]);
        Destination(out)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = DalekSignature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte Ed25519 signature.
///
/// Serde impls are written by hand: derived array support stops at 32
/// elements, and the wire shape should be a plain byte string anyway.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SignatureVisitor;

        impl<'de> serde::de::Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "64 signature bytes")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Signature, E> {
                let bytes: [u8; 64] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(Signature(bytes))
            }

            // Formats without a native byte string encode as a sequence.
            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Signature, A::Error> {
                let mut bytes = [0u8; 64];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                if seq.next_element::<u8>()?.is_some() {
                    return Err(serde::de::Error::invalid_length(65, &self));
                }
                Ok(Signature(bytes))
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A wallet signing keypair.
///
/// This wraps ed25519-dalek's SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// The destination this keypair receives to.
    pub fn destination(&self) -> Destination {
        self.public_key().destination()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature(sig.to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_derivation_deterministic() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let name = Name::try_from("d/example").unwrap();

        let s1 = Salt::derive(&keypair, &name);
        let s2 = Salt::derive(&keypair, &name);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_salt_varies_by_name_and_key() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let other = Keypair::from_seed(&[0x43; 32]);
        let name_a = Name::try_from("d/alpha").unwrap();
        let name_b = Name::try_from("d/beta").unwrap();

        assert_ne!(Salt::derive(&keypair, &name_a), Salt::derive(&keypair, &name_b));
        assert_ne!(Salt::derive(&keypair, &name_a), Salt::derive(&other, &name_a));
    }

    #[test]
    fn test_commitment_verify_roundtrip() {
        let salt = Salt::from_bytes([0x11; 20]);
        let name = Name::try_from("d/example").unwrap();
        let commitment = Commitment::of(&salt, &name);

        assert!(commitment.verify(&salt, &name));
    }

    #[test]
    fn test_commitment_rejects_wrong_salt() {
        let salt = Salt::from_bytes([0x11; 20]);
        let wrong = Salt::from_bytes([0x22; 20]);
        let name = Name::try_from("d/example").unwrap();
        let commitment = Commitment::of(&salt, &name);

        assert!(!commitment.verify(&wrong, &name));
    }

    #[test]
    fn test_commitment_rejects_wrong_name() {
        let salt = Salt::from_bytes([0x11; 20]);
        let name = Name::try_from("d/example").unwrap();
        let other = Name::try_from("d/other").unwrap();
        let commitment = Commitment::of(&salt, &name);

        assert!(!commitment.verify(&salt, &other));
    }

    #[test]
    fn test_random_salts_differ() {
        assert_ne!(Salt::random(), Salt::random());
    }

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"reveal d/example";
        let signature = keypair.sign(message);

        keypair
            .public_key()
            .verify(message, &signature)
            .expect("valid signature should verify");

        let tampered = b"reveal d/examplE";
        assert!(keypair.public_key().verify(tampered, &signature).is_err());
    }

    #[test]
    fn test_salt_hex_roundtrip() {
        let salt = Salt::from_bytes([0x5a; 20]);
        let recovered = Salt::from_hex(&salt.to_hex()).unwrap();
        assert_eq!(salt, recovered);
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let signature = keypair.sign(b"reveal d/example");

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&signature, &mut buf).unwrap();
        let recovered: Signature = ciborium::de::from_reader(buf.as_slice()).unwrap();
        assert_eq!(recovered, signature);
    }

    #[test]
    fn test_signature_serde_rejects_wrong_length() {
        let short = ciborium::value::Value::Bytes(vec![0u8; 63]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&short, &mut buf).unwrap();
        assert!(ciborium::de::from_reader::<Signature, _>(buf.as_slice()).is_err());
    }
}
