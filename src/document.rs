use std::fmt::Debug;

use serde_json::{Map, Value};

/// A document: field order is preserved and keys are unique.
pub type Document = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Corrupt document payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Stored payload is a JSON {kind}, not a document")]
    NotADocument { kind: &'static str },
}

/// Converts documents to and from the text stored in the payload column.
///
/// Implementations must round-trip: `decode(encode(d)) == d` for every
/// document they accept.
pub trait DocumentCodec: Send + Sync + Debug {
    fn encode(&self, document: &Document) -> Result<String, CodecError>;

    fn decode(&self, payload: &str) -> Result<Document, CodecError>;
}

/// Plain compact JSON text
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl DocumentCodec for JsonCodec {
    fn encode(&self, document: &Document) -> Result<String, CodecError> {
        serde_json::to_string(document).map_err(CodecError::Encode)
    }

    fn decode(&self, payload: &str) -> Result<Document, CodecError> {
        match serde_json::from_str(payload).map_err(CodecError::Decode)? {
            Value::Object(document) => Ok(document),
            other => Err(CodecError::NotADocument {
                kind: value_kind(&other),
            }),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Textual form of a single identifier value, used as the bound parameter
/// when comparing against the stored JSON. This is the canonical compact JSON
/// text, so values of different types never collide (`"1"` vs `1`).
pub fn to_query_value(value: &Value) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Look up a (possibly dotted) field path inside a document
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(inner) => inner.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Byte length of the encoded document, as tracked by the size accounting
pub fn encoded_size(
    codec: &dyn DocumentCodec,
    document: &Document,
) -> Result<i64, CodecError> {
    Ok(codec.encode(document)?.len() as i64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutils::document;

    #[test]
    fn test_json_codec_round_trip_keeps_field_order() {
        let original = document(json!({
            "_id": "order-1",
            "zeta": 1,
            "alpha": {"nested": [1, 2.5, null, "x"]},
            "flag": true
        }));

        let encoded = JsonCodec.encode(&original).unwrap();
        assert_eq!(
            encoded,
            r#"{"_id":"order-1","zeta":1,"alpha":{"nested":[1,2.5,null,"x"]},"flag":true}"#
        );

        let decoded = JsonCodec.decode(&encoded).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(
            decoded.keys().collect::<Vec<_>>(),
            vec!["_id", "zeta", "alpha", "flag"]
        );
    }

    #[test]
    fn test_json_codec_rejects_corrupt_payloads() {
        assert!(matches!(
            JsonCodec.decode("{\"_id\": 1"),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            JsonCodec.decode("[1, 2]"),
            Err(CodecError::NotADocument { kind: "array" })
        ));
    }

    #[test]
    fn test_query_values_are_distinct_across_types() {
        assert_eq!(to_query_value(&json!("1")).unwrap(), "\"1\"");
        assert_eq!(to_query_value(&json!(1)).unwrap(), "1");
        assert_eq!(
            to_query_value(&json!({"a": 1, "b": "c"})).unwrap(),
            r#"{"a":1,"b":"c"}"#
        );
    }

    #[test]
    fn test_get_path() {
        let doc = document(json!({"a": {"b": [{"c": 3}]}, "d": null}));

        assert_eq!(get_path(&doc, "a.b.0.c"), Some(&json!(3)));
        assert_eq!(get_path(&doc, "d"), Some(&Value::Null));
        assert_eq!(get_path(&doc, "a.missing"), None);
        assert_eq!(get_path(&doc, "a.b.x"), None);
        assert_eq!(get_path(&doc, "d.e"), None);
    }
}
