//! Lenient readers for instance configuration values.
//!
//! Agent configuration files are hand-written; flags show up as `true`,
//! `"yes"` or `1`, and ports as `161` or `"161"`. These helpers accept all
//! of those spellings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Whether a configuration value reads as "enabled".
///
/// Accepts booleans, non-zero numbers, and the strings `yes`, `true`, `1`,
/// `y` and `on` (any case).
pub fn is_affirmative(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "1" | "y" | "on"
        ),
        _ => false,
    }
}

/// Read an integer that may have been written as a string.
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a float that may have been written as a string.
pub fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Serde adapter for flags read with [`is_affirmative`].
pub fn deserialize_affirmative<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_null()).map(|v| is_affirmative(&v)))
}

/// Serde adapter for integers read with [`as_int`].
pub fn deserialize_lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_int(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid integer: {}", v))),
    }
}
