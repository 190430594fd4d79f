//! Topology extraction from `terraform output -json`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ProvisionError;

pub const PRIMARY_OUTPUT: &str = "primary_postgresql_ip";
pub const REPLICA_OUTPUT: &str = "replica_postgresql_ips";

/// Host addresses produced by a successful infrastructure apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub primary_address: String,
    pub replica_addresses: Vec<String>,
}

impl Topology {
    pub fn new(primary_address: impl Into<String>, replica_addresses: Vec<String>) -> Self {
        Self {
            primary_address: primary_address.into(),
            replica_addresses,
        }
    }

    /// The apply must have produced exactly the requested number of replicas.
    pub fn ensure_replica_count(&self, expected: usize) -> Result<(), ProvisionError> {
        let got = self.replica_addresses.len();
        if got != expected {
            return Err(ProvisionError::parse(format!(
                "{REPLICA_OUTPUT}: expected {expected} replica address(es), got {got}"
            )));
        }
        Ok(())
    }
}

/// Parse the captured apply-tool output into a [`Topology`].
///
/// Only the two well-known outputs are looked at; other outputs are ignored.
pub fn extract(raw_output_json: &str) -> Result<Topology, ProvisionError> {
    let root: Value = serde_json::from_str(raw_output_json)
        .map_err(|e| ProvisionError::parse(format!("output is not valid JSON: {e}")))?;
    let outputs = root
        .as_object()
        .ok_or_else(|| ProvisionError::parse("output is not a JSON object"))?;

    let primary = output_value(outputs, PRIMARY_OUTPUT)?;
    let primary_address = match primary {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::String(_) => {
            return Err(ProvisionError::parse(format!("{PRIMARY_OUTPUT} is empty")));
        }
        other => {
            return Err(ProvisionError::parse(format!(
                "{PRIMARY_OUTPUT} must be a string, got {}",
                type_name(other)
            )));
        }
    };

    let replicas = output_value(outputs, REPLICA_OUTPUT)?;
    let Value::Array(items) = replicas else {
        return Err(ProvisionError::parse(format!(
            "{REPLICA_OUTPUT} must be an array, got {}",
            type_name(replicas)
        )));
    };
    let replica_addresses = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
            other => Err(ProvisionError::parse(format!(
                "{REPLICA_OUTPUT}[{i}] must be a non-empty string, got {}",
                type_name(other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Topology {
        primary_address,
        replica_addresses,
    })
}

fn output_value<'a>(
    outputs: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a Value, ProvisionError> {
    outputs
        .get(key)
        .ok_or_else(|| ProvisionError::parse(format!("missing output {key}")))?
        .get("value")
        .ok_or_else(|| ProvisionError::parse(format!("output {key} has no value")))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
