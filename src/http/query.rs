//! JSON body to query string encoding.
//!
//! Only flat objects are accepted. Nested objects and arrays have no single
//! canonical query form, so they are rejected instead of being stringified.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// A body field whose value cannot be expressed as one query parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{key}' holds {kind}; only strings, numbers, booleans and null can be sent as query parameters")]
pub struct UnsupportedValueShape {
    pub key: String,
    pub kind: &'static str,
}

/// Canonical string form of a scalar JSON value.
pub fn scalar_to_string(key: &str, value: &Value) -> Result<String, UnsupportedValueShape> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) => Err(UnsupportedValueShape {
            key: key.to_string(),
            kind: "an array",
        }),
        Value::Object(_) => Err(UnsupportedValueShape {
            key: key.to_string(),
            kind: "an object",
        }),
    }
}

/// Encode a flat JSON object as an `application/x-www-form-urlencoded` query.
///
/// Keys keep the body's order. The leading `?` is not included.
pub fn encode(fields: &Map<String, Value>) -> Result<String, UnsupportedValueShape> {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, &scalar_to_string(key, value)?);
    }
    Ok(serializer.finish())
}
