//! Loose field access for gateway and dashboard JSON.
//!
//! Both sides send identifiers and quantities as strings or numbers
//! interchangeably.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// String form of a scalar; `None` for null, arrays and objects.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn scalar_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First present alias of a field, as a string.
pub fn first_string(object: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|key| object.get(*key).and_then(scalar_string))
}

/// Field as string, empty when missing.
pub fn string_or_empty(object: &Value, key: &str) -> String {
    object.get(key).and_then(scalar_string).unwrap_or_default()
}

/// Accepts `"abc"`, `123` or `null`.
pub fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_string))
}

/// Accepts `true`, `1` or `"1"`.
pub fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

/// Non-blank value or `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
