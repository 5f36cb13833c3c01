//! Name operations: the tagged variant attached to a ledger output.
//!
//! An output either carries no name operation (plain payment) or exactly
//! one of Commit, Reveal, or Update. The variant is decoded once at the
//! ledger boundary and matched exhaustively thereafter.

use serde::{Deserialize, Serialize};

use crate::crypto::{Commitment, Salt};
use crate::types::{Name, Value};

/// Tag values used in the canonical encoding.
mod tag {
    pub const COMMIT: u8 = 1;
    pub const REVEAL: u8 = 2;
    pub const UPDATE: u8 = 3;
}

/// A name operation carried by a transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameOp {
    /// Phase 1: publish a commitment to (salt, name) without disclosing
    /// the name.
    Commit {
        /// Hash of salt || name.
        commitment: Commitment,
    },

    /// Phase 2: disclose the name, its salt, and the initial value,
    /// consuming the commit output.
    Reveal {
        /// The name being registered.
        name: Name,
        /// The initial value.
        value: Value,
        /// The salt whose commitment was published in phase 1.
        salt: Salt,
    },

    /// Change a registered name's value, or transfer it, spending the
    /// previous reveal/update output.
    Update {
        /// The name being updated.
        name: Name,
        /// The new value.
        value: Value,
    },
}

impl NameOp {
    /// Tag byte for Commit in the canonical encoding.
    pub const COMMIT_TAG: u8 = tag::COMMIT;
    /// Tag byte for Reveal in the canonical encoding.
    pub const REVEAL_TAG: u8 = tag::REVEAL;
    /// Tag byte for Update in the canonical encoding.
    pub const UPDATE_TAG: u8 = tag::UPDATE;

    /// The tag byte for the canonical encoding.
    pub fn tag(&self) -> u8 {
        match self {
            NameOp::Commit { .. } => tag::COMMIT,
            NameOp::Reveal { .. } => tag::REVEAL,
            NameOp::Update { .. } => tag::UPDATE,
        }
    }

    /// The name this operation discloses, if any. Commits hide theirs.
    pub fn name(&self) -> Option<&Name> {
        match self {
            NameOp::Commit { .. } => None,
            NameOp::Reveal { name, .. } | NameOp::Update { name, .. } => Some(name),
        }
    }

    /// The value this operation assigns, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            NameOp::Commit { .. } => None,
            NameOp::Reveal { value, .. } | NameOp::Update { value, .. } => Some(value),
        }
    }

    /// The commitment, for Commit operations.
    pub fn commitment(&self) -> Option<&Commitment> {
        match self {
            NameOp::Commit { commitment } => Some(commitment),
            _ => None,
        }
    }

    /// Whether this is a Commit.
    pub fn is_commit(&self) -> bool {
        matches!(self, NameOp::Commit { .. })
    }

    /// Whether this operation discloses a name and value (Reveal or
    /// Update). Mirrors the distinction between the hidden commit phase
    /// and everything after it.
    pub fn is_update_like(&self) -> bool {
        matches!(self, NameOp::Reveal { .. } | NameOp::Update { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_name() -> Name {
        Name::try_from("d/example").unwrap()
    }

    #[test]
    fn test_commit_hides_name() {
        let salt = Salt::from_bytes([0x11; 20]);
        let op = NameOp::Commit {
            commitment: Commitment::of(&salt, &sample_name()),
        };
        assert!(op.is_commit());
        assert!(op.name().is_none());
        assert!(op.value().is_none());
        assert!(!op.is_update_like());
    }

    #[test]
    fn test_reveal_discloses_name_and_value() {
        let op = NameOp::Reveal {
            name: sample_name(),
            value: Value::try_from("v1").unwrap(),
            salt: Salt::from_bytes([0x11; 20]),
        };
        assert_eq!(op.name(), Some(&sample_name()));
        assert_eq!(op.value().unwrap().as_bytes(), b"v1");
        assert!(op.is_update_like());
        assert!(!op.is_commit());
    }

    #[test]
    fn test_update_is_update_like() {
        let op = NameOp::Update {
            name: sample_name(),
            value: Value::empty(),
        };
        assert!(op.is_update_like());
        assert!(op.commitment().is_none());
    }

    #[test]
    fn test_tags_are_distinct() {
        let salt = Salt::from_bytes([0x11; 20]);
        let commit = NameOp::Commit {
            commitment: Commitment::of(&salt, &sample_name()),
        };
        let reveal = NameOp::Reveal {
            name: sample_name(),
            value: Value::empty(),
            salt,
        };
        let update = NameOp::Update {
            name: sample_name(),
            value: Value::empty(),
        };
        assert_ne!(commit.tag(), reveal.tag());
        assert_ne!(reveal.tag(), update.tag());
        assert_ne!(commit.tag(), update.tag());
    }
}
