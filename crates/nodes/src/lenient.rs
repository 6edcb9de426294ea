//! Field-by-field JSON decoding.
//!
//! Caller input and node configs are free-form objects. A key whose value
//! does not fit its typed field is dropped and reported instead of failing
//! the whole decode.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A key that was dropped, with the reason it did not fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub key: String,
    pub reason: String,
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ignored `{}`: {}", self.key, self.reason)
    }
}

/// Merge `fields` into `base` one key at a time, keeping each key only if
/// the merged object still decodes as `T`.
///
/// Keys are tried in map order. Fails only when `base` itself does not
/// decode.
pub fn decode_fields<T>(
    base: Map<String, Value>,
    fields: Map<String, Value>,
) -> Result<(T, Vec<Rejected>), serde_json::Error>
where
    T: DeserializeOwned,
{
    let mut accepted = base;
    let mut rejected = Vec::new();

    for (key, value) in fields {
        let mut candidate = accepted.clone();
        candidate.insert(key.clone(), value);
        match serde_json::from_value::<T>(Value::Object(candidate.clone())) {
            Ok(_) => accepted = candidate,
            Err(e) => rejected.push(Rejected {
                key,
                reason: e.to_string(),
            }),
        }
    }

    let decoded = serde_json::from_value(Value::Object(accepted))?;
    Ok((decoded, rejected))
}
