//! Bridge between [`Value`] and serde.
//!
//! Lets callers send and receive their own `Serialize` / `Deserialize`
//! types. Conversion goes through `serde_json::Value`, so anything
//! `serde_json` rejects (for example maps keyed by structs) surfaces as
//! [`CodecError::Unsupported`].

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value as Json};

use crate::error::{CodecError, Result};

use super::value::{DateText, Value};

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ============================================================================
// Value <-> serde
// ============================================================================

impl Value {
    /// Converts any serializable value.
    ///
    /// # Errors
    ///
    /// [`CodecError::Unsupported`] if the type has no JSON-like shape.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> std::result::Result<Self, CodecError> {
        serde_json::to_value(value)
            .map(Self::from)
            .map_err(|e| CodecError::unsupported(e.to_string()))
    }

    /// Deserializes this value into `T`.
    ///
    /// # Errors
    ///
    /// [`Error::Json`](crate::Error::Json) if the shape does not match `T`.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// Renders this value as JSON.
    ///
    /// `undefined` and non-finite numbers become `null`, dates become ISO
    /// strings, blobs become base64 strings and typed arrays become arrays
    /// of numbers.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Null | Self::Undefined => Json::Null,
            Self::Boolean(b) => Json::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Json::String(s.clone()),
            Self::Date(d) => Json::String(DateText(d).to_string()),
            Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Blob(blob) => Json::String(STANDARD.encode(&blob.bytes)),
            Self::TypedArray(array) => {
                Json::Array(array.elements().into_iter().map(number_to_json).collect())
            }
        }
    }
}

fn number_to_json(n: f64) -> Json {
    // Integral values go out as integers so they deserialize into int types
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Json::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Json::Null, Json::Number)
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Boolean(b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use chrono::DateTime;
    use serde::Deserialize;
    use serde_json::json;

    use crate::codec::{Blob, TypedArray};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct FileMeta {
        name: String,
        size: u32,
        tags: Vec<String>,
    }

    #[test]
    fn test_struct_round_trip() {
        let meta = FileMeta {
            name: "photo.png".into(),
            size: 2048,
            tags: vec!["a".into()],
        };
        let value = Value::from_serialize(&meta).unwrap();
        assert_eq!(value.get("size"), Some(&Value::Number(2048.0)));
        assert_eq!(value.deserialize_into::<FileMeta>().unwrap(), meta);
    }

    #[test]
    fn test_non_string_keys_are_unsupported() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        let err = Value::from_serialize(&map).unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { .. }));
    }

    #[test]
    fn test_to_json_special_kinds() {
        let date = DateTime::from_timestamp_millis(0).unwrap();
        assert_eq!(Value::Date(date).to_json(), json!("1970-01-01T00:00:00.000Z"));
        assert_eq!(Value::Undefined.to_json(), Json::Null);
        assert_eq!(Value::Number(f64::NAN).to_json(), Json::Null);
        assert_eq!(Value::Number(1.5).to_json(), json!(1.5));
        assert_eq!(
            Value::Blob(Blob::new("text/plain", b"hi".to_vec())).to_json(),
            json!("aGk=")
        );
        assert_eq!(
            Value::TypedArray(TypedArray::int32(&[1, -2])).to_json(),
            json!([1, -2])
        );
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"ok": true, "n": [1, null]}));
        assert_eq!(value.get("ok"), Some(&Value::Boolean(true)));
        assert_eq!(
            value.get("n"),
            Some(&Value::Array(vec![Value::Number(1.0), Value::Null]))
        );
    }
}
