use serde_json::Value;

use crate::document::Document;

/// Turn a `json!({...})` literal into a document
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(document) => document,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Documents 0..count, with `_id` = "doc-<n>" and `rank` = n
pub fn ranked_documents(count: i64) -> Vec<Document> {
    (0..count)
        .map(|n| {
            document(serde_json::json!({
                "_id": format!("doc-{n}"),
                "rank": n,
                "parity": if n % 2 == 0 { "even" } else { "odd" },
            }))
        })
        .collect()
}
