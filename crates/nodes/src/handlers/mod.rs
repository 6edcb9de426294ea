//! One module per node kind.
//!
//! Every handler has the same shape: a `Config` decoded from the node's
//! `config` block, and an async `run` that takes the accumulated
//! [`ExecutionContext`](crate::ExecutionContext) by value and returns the
//! extended copy.
//!
//! Configs decode two ways. `from_value` is strict and backs validation;
//! `from_value_lenient` is what a run uses, falling back to the default for
//! any field that does not fit.

pub mod generation;
pub mod knowledge_retrieval;
pub mod output_format;
pub mod query_intake;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::lenient::decode_fields;
use crate::NodeError;

/// Decode a node config block; `null` yields the defaults.
pub(crate) fn parse_config<T>(kind: &'static str, value: &Value) -> Result<T, NodeError>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    T::deserialize(value).map_err(|e| NodeError::InvalidConfig {
        kind,
        message: e.to_string(),
    })
}

/// Decode a node config block field by field. Returns the config plus one
/// warning per field that was replaced by its default.
pub(crate) fn parse_config_lenient<T>(kind: &'static str, value: &Value) -> (T, Vec<String>)
where
    T: DeserializeOwned + Serialize + Default,
{
    let fields = match value {
        Value::Null => return (T::default(), Vec::new()),
        Value::Object(fields) => fields.clone(),
        _ => {
            return (
                T::default(),
                vec![format!("{kind} config is not an object; using defaults")],
            )
        }
    };

    let base = match serde_json::to_value(T::default()) {
        Ok(Value::Object(base)) => base,
        _ => Map::new(),
    };

    match decode_fields::<T>(base, fields) {
        Ok((config, rejected)) => (
            config,
            rejected
                .iter()
                .map(|r| format!("{kind} config {r}"))
                .collect(),
        ),
        Err(e) => (T::default(), vec![format!("{kind} config: {e}; using defaults")]),
    }
}
