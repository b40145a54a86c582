//! Cell-level type recovery for values read back from the fact store.
//!
//! The store keeps composite values as JSON text, so every text cell is first
//! offered to the JSON parser ([`cast_value`]). Whatever is still text after
//! that gets one more chance as a plain number ([`coerce_numeric`]). Neither
//! step ever fails: a value that does not fit is returned unchanged.

use crate::data::Value;

/// Reinterprets JSON-encoded text as structured data; other values pass through.
///
/// A JSON string literal is not unwrapped, which keeps the cast idempotent.
pub fn cast_value(value: Value) -> Value {
    match value {
        Value::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::String(_)) | Err(_) => Value::Text(text),
            Ok(parsed) => Value::from(parsed),
        },
        other => other,
    }
}

/// Reads text as an integer or float when it parses as one.
pub fn coerce_numeric(value: Value) -> Value {
    match value {
        Value::Text(text) => parse_number(&text).unwrap_or(Value::Text(text)),
        other => other,
    }
}

/// Strict variant: anything that is not a number afterwards becomes null.
pub fn force_numeric(value: Value) -> Value {
    match coerce_numeric(value) {
        number @ (Value::Integer(_) | Value::Float(_)) => number,
        _ => Value::Null,
    }
}

pub fn coerce_column(cells: &mut [Option<Value>]) {
    for cell in cells.iter_mut() {
        if let Some(value) = cell.take() {
            *cell = Some(coerce_numeric(value));
        }
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Value::Integer(integer));
    }
    // Rust accepts "inf"/"nan" spellings that are words, not numbers, in a report.
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E')) {
        return None;
    }
    trimmed.parse::<f64>().ok().map(Value::Float)
}
