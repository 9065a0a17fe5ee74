//! JSON <-> Value and Message conversion utilities

use chrono::DateTime;

use super::CliError;
use crate::{Message, Value};

/// Convert serde_json::Value to Value
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Long)
            .or_else(|| n.as_f64().map(Value::Double))
            .unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::List(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => {
            Value::Map(obj.into_iter().map(|(k, v)| (k, json_to_value(v))).collect())
        }
    }
}

/// Convert Value to serde_json::Value
///
/// Dates, periods and durations become their ISO-8601 strings; non-finite
/// doubles become null.
pub fn value_to_json(v: Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::Long(i) => serde_json::Value::Number(i.into()),
        Value::Double(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::List(items) => serde_json::Value::Array(items.into_iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
        other => serde_json::Value::String(other.to_string()),
    }
}

/// Build a message from a JSON object.
///
/// A string `timestamp` in RFC 3339 format is read as a datetime.
pub fn json_to_message(v: serde_json::Value) -> Result<Message, CliError> {
    let serde_json::Value::Object(obj) = v else {
        return Err(CliError::NotAnObject(json_kind(&v)));
    };

    let mut message = Message::new();
    for (name, value) in obj {
        let value = match (name.as_str(), value) {
            ("timestamp", serde_json::Value::String(s)) => match DateTime::parse_from_rfc3339(&s) {
                Ok(dt) => Value::DateTime(dt),
                Err(_) => Value::String(s),
            },
            (_, value) => json_to_value(value),
        };
        message.add_field(name, value);
    }
    Ok(message)
}

/// Fields of a message as a JSON object
pub fn message_to_json(message: &Message) -> serde_json::Value {
    value_to_json(message.to_value())
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
