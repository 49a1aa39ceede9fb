//! Loose value coercion for remote records
//!
//! Remote change records are untyped JSON documents where any field may be
//! missing, null, or carry the wrong JSON type. These helpers never fail:
//! every accessor returns either a coerced value or the caller's default.

use serde_json::Value;

/// Look up a field on a record, treating non-object records as empty
pub fn field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    record.as_object().and_then(|map| map.get(name))
}

/// First present, non-null field among `names`
pub fn first_field<'a>(record: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| field(record, name))
        .find(|value| !value.is_null())
}

/// String value, or empty string when absent
///
/// Numbers and booleans are rendered with their JSON text. Arrays and
/// objects have no sensible string form and become empty.
pub fn to_string_or_empty(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Optional string; absent, null and empty strings all map to `None`
pub fn to_optional_string(value: Option<&Value>) -> Option<String> {
    let s = to_string_or_empty(value);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Integer value accepting JSON numbers and numeric strings
///
/// Fractional input is rounded to the nearest integer. Booleans are not
/// numbers and fall back to `default`.
pub fn to_i64_or(value: Option<&Value>, default: i64) -> i64 {
    to_optional_i64(value).unwrap_or(default)
}

/// Optional integer; anything that does not coerce maps to `None`
pub fn to_optional_i64(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| round_finite(n.as_f64())),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| round_finite(trimmed.parse::<f64>().ok()))
        }
        _ => None,
    }
}

fn round_finite(value: Option<f64>) -> Option<i64> {
    value.filter(|f| f.is_finite()).map(|f| f.round() as i64)
}

/// List of strings; non-array input yields an empty list
///
/// Null and structured elements are dropped, scalar elements are rendered
/// as strings.
pub fn to_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| to_optional_string(Some(item)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Raw list elements; non-array input yields an empty list
pub fn to_value_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
