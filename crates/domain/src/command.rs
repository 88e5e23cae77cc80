//! Outbound commands and the batches they are grouped into.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::local_strategy::{DpId, DpStrategy, DpValueType};

/// A `{code, value}` command addressed to one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub code: String,
    pub value: Value,
}

impl Command {
    #[must_use]
    pub fn new(code: impl Into<String>, value: Value) -> Self {
        Self {
            code: code.into(),
            value,
        }
    }
}

/// A property write keyed by data-point id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub dp_id: DpId,
    pub value: Value,
}

impl PropertyUpdate {
    #[must_use]
    pub fn new(dp_id: DpId, value: Value) -> Self {
        Self { dp_id, value }
    }

    /// Wire shape: `{"<dp_id>": value}`.
    #[must_use]
    pub fn as_object(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert(self.dp_id.to_string(), self.value.clone());
        object
    }
}

/// Which backend call a group of commands turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    VirtualFunction,
    PushNative,
    ApiNative,
    ApiPropertyUpdate,
}

impl BatchKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VirtualFunction => "virtual_function",
            Self::PushNative => "push_native",
            Self::ApiNative => "api_native",
            Self::ApiPropertyUpdate => "api_property_update",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coerce a command value into the form the property-update call expects for
/// the data point's declared type.
///
/// Values that cannot be coerced, and data points without a declared type or
/// declared as `Json`/`Raw`, are passed through unchanged.
#[must_use]
pub fn normalize_property_value(strategy: &DpStrategy, value: &Value) -> Value {
    let normalized = match strategy.value_type {
        Some(DpValueType::Boolean) => to_bool(value).map(Value::Bool),
        Some(DpValueType::Integer) => to_integer(value).map(Value::from),
        Some(DpValueType::Bitmap) => {
            to_integer(value).and_then(|n| u64::try_from(n).ok().map(Value::from))
        }
        Some(DpValueType::Enum | DpValueType::String) => Some(to_text(value)),
        Some(DpValueType::Json | DpValueType::Raw) | None => None,
    };
    normalized.unwrap_or_else(|| value.clone())
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => number_to_integer(n),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .and_then(|n| number_to_integer(&n))
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_integer(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?.round();
    // f64 → i64 saturates; reject values outside the representable range.
    (f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn to_text(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    }
}
