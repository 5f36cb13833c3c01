//! Delegated-name planning for auto-registration.
//!
//! A delegated registration points a parent name at a second name that
//! holds the actual data, so the parent's value can stay a stable
//! one-line import. Parent `d/example` delegates to `dd/example`,
//! `id/example` to `idd/example`.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use tracing::debug;

use nomen_core::{Name, Value, MAX_NAME_LEN};
use nomen_ledger::NameLedgerView;

use crate::error::{ProtocolError, Result};

/// Retry bound for the random-suffix fallback.
const MAX_FALLBACK_TRIALS: u32 = 100;

/// A planned delegated name and the import value its parent will carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedName {
    /// The delegated name, unregistered at planning time.
    pub name: Name,
    /// Parent value: `{"import":"<delegated>"}`.
    pub import_value: Value,
}

/// Plans collision-free delegated names.
pub struct DelegationPlanner;

impl DelegationPlanner {
    /// Pick a delegated name for `parent` that is free and within bounds.
    ///
    /// The bare candidate is tried first, then candidates with random
    /// decimal digits appended one per attempt while length allows, then
    /// a fixed-width random hex suffix.
    pub async fn plan(&self, parent: &Name, view: &NameLedgerView<'_>) -> Result<DelegatedName> {
        let parent_str = std::str::from_utf8(parent.as_bytes())
            .map_err(|_| ProtocolError::InvalidInput("parent name is not UTF-8".into()))?;

        let (namespace, label) = parent_str
            .split_once('/')
            .ok_or_else(|| ProtocolError::InvalidInput("parent name has no namespace".into()))?;
        let delegated_ns = match namespace {
            "d" => "dd",
            "id" => "idd",
            other => {
                return Err(ProtocolError::InvalidInput(format!(
                    "namespace {}/ cannot be delegated",
                    other
                )))
            }
        };

        let mut candidate = format!("{}/{}", delegated_ns, label);
        while candidate.len() <= MAX_NAME_LEN {
            let name = Name::new(candidate.as_bytes().to_vec())?;
            if !view.exists(&name).await? {
                debug!(delegated = %candidate, "planned delegated name");
                return Ok(DelegatedName {
                    import_value: import_value(&candidate)?,
                    name,
                });
            }
            candidate.push(char::from(b'0' + OsRng.gen_range(0..10u8)));
        }

        // Digit suffixes ran out of room; fall back to a fixed-width
        // random suffix on the bare namespace.
        for _ in 0..MAX_FALLBACK_TRIALS {
            let candidate = format!("{}/{:08x}", delegated_ns, OsRng.next_u32());
            let name = Name::new(candidate.as_bytes().to_vec())?;
            if !view.exists(&name).await? {
                debug!(delegated = %candidate, "planned delegated name via fallback");
                return Ok(DelegatedName {
                    import_value: import_value(&candidate)?,
                    name,
                });
            }
        }

        Err(ProtocolError::TransientLookupFailure(
            "no free delegated name found".into(),
        ))
    }
}

fn import_value(delegated: &str) -> Result<Value> {
    let json = serde_json::json!({ "import": delegated });
    let bytes = serde_json::to_vec(&json)
        .map_err(|e| ProtocolError::InvalidInput(format!("import value: {}", e)))?;
    Ok(Value::new(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_value_shape() {
        let value = import_value("dd/example").unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(value.as_bytes()).unwrap();
        assert_eq!(parsed["import"], "dd/example");
    }
}
