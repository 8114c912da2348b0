use std::fmt::Debug;

use serde_json::Value;

use crate::document::{get_path, Document};

/// Decides whether a decoded document satisfies a query. Called once per
/// scanned row, so implementations must be pure.
pub trait QueryMatcher: Send + Sync + Debug {
    fn matches(&self, document: &Document, query: &Document) -> bool;
}

/// Every query field (dotted paths allowed) must be equal to the document's
/// value. A `null` in the query also matches a missing field, and an empty
/// query matches everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct EqualityMatcher;

impl QueryMatcher for EqualityMatcher {
    fn matches(&self, document: &Document, query: &Document) -> bool {
        query
            .iter()
            .all(|(path, expected)| match get_path(document, path) {
                Some(actual) => actual == expected,
                None => expected == &Value::Null,
            })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::testutils::document;

    #[rstest]
    #[case::empty_query(json!({}), true)]
    #[case::top_level(json!({"status": "open"}), true)]
    #[case::top_level_mismatch(json!({"status": "closed"}), false)]
    #[case::nested(json!({"customer.name": "ada"}), true)]
    #[case::several_fields(json!({"status": "open", "total": 12}), true)]
    #[case::one_field_off(json!({"status": "open", "total": 13}), false)]
    #[case::null_matches_missing(json!({"discount": null}), true)]
    #[case::missing_field(json!({"discount": 5}), false)]
    #[case::type_sensitive(json!({"total": "12"}), false)]
    fn test_equality_matcher(#[case] query: Value, #[case] expected: bool) {
        let doc = document(json!({
            "_id": 1,
            "status": "open",
            "total": 12,
            "customer": {"name": "ada"}
        }));

        assert_eq!(EqualityMatcher.matches(&doc, &document(query)), expected);
    }
}
