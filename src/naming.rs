//! Translation of logical database/collection/field names into SQL identifiers
//! and expressions.
//!
//! Identifiers can't be sent as bound parameters, so everything produced here
//! is spliced into statements verbatim. That's only safe because every name is
//! validated against a restricted character class first.

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

use crate::data_types::METADATA_TABLE;

lazy_static! {
    static ref COLLECTION_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_.-]+$").unwrap();
    static ref DATABASE_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    static ref FIELD_SEGMENT: Regex = Regex::new(r"^[a-zA-Z0-9_$-]+$").unwrap();
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("Illegal database name: {name:?}")]
    IllegalDatabaseName { name: String },

    #[error("Illegal collection name: {name:?}")]
    IllegalCollectionName { name: String },

    #[error("Illegal field name: {name:?}")]
    IllegalFieldName { name: String },

    #[error("Collection name {name:?} maps to the reserved table {table:?}")]
    ReservedName { name: String, table: &'static str },
}

/// Physical schema of a logical database
pub fn schema_name(database_name: &str) -> Result<String, NamingError> {
    if !DATABASE_NAME.is_match(database_name) {
        return Err(NamingError::IllegalDatabaseName {
            name: database_name.to_string(),
        });
    }
    Ok(database_name.to_string())
}

/// Physical table of a collection. Dots separate namespaces upstream and
/// aren't allowed in table names, so they become underscores.
pub fn table_name(collection_name: &str) -> Result<String, NamingError> {
    if !COLLECTION_NAME.is_match(collection_name) {
        return Err(NamingError::IllegalCollectionName {
            name: collection_name.to_string(),
        });
    }

    let table = collection_name.replace('.', "_");
    if table == METADATA_TABLE {
        return Err(NamingError::ReservedName {
            name: collection_name.to_string(),
            table: METADATA_TABLE,
        });
    }
    Ok(table)
}

/// Split a dotted field path into its validated segments
pub fn field_path(field: &str) -> Result<Vec<&str>, NamingError> {
    let segments: Vec<&str> = field.split('.').collect();
    if segments.iter().all(|s| FIELD_SEGMENT.is_match(s)) {
        Ok(segments)
    } else {
        Err(NamingError::IllegalFieldName {
            name: field.to_string(),
        })
    }
}

pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Name of the primary key constraint of a collection table
pub fn primary_key_name(table: &str) -> String {
    quote_identifier(&format!("pk_{table}"))
}

/// SQL engine flavour; decides how names and JSON accesses are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Join an already validated schema and table name.
    ///
    /// SQLite has no schemas, so the pair is folded into a single quoted
    /// identifier. Neither part can contain a dot, which keeps it unambiguous.
    pub fn qualify(&self, schema: &str, table: &str) -> String {
        match self {
            Dialect::Postgres => {
                format!("{}.{}", quote_identifier(schema), quote_identifier(table))
            }
            Dialect::Sqlite => quote_identifier(&format!("{schema}.{table}")),
        }
    }

    /// The new name as it has to appear in `ALTER TABLE .. RENAME TO`
    pub fn rename_target(&self, schema: &str, table: &str) -> String {
        match self {
            Dialect::Postgres => quote_identifier(table),
            Dialect::Sqlite => self.qualify(schema, table),
        }
    }

    pub fn qualified_table_name(
        &self,
        database_name: &str,
        collection_name: &str,
    ) -> Result<String, NamingError> {
        Ok(self.qualify(
            &schema_name(database_name)?,
            &table_name(collection_name)?,
        ))
    }

    pub fn metadata_table_name(&self, database_name: &str) -> Result<String, NamingError> {
        Ok(self.qualify(&schema_name(database_name)?, METADATA_TABLE))
    }

    /// Expression addressing a field inside the payload column, used for
    /// ordering. A JSON `null` and a missing field both come out as SQL NULL.
    pub fn data_key(&self, field: &str) -> Result<String, NamingError> {
        let path = field_path(field)?;
        Ok(match self {
            Dialect::Postgres => format!(
                "NULLIF(CAST(data AS jsonb) #> '{}', 'null')",
                postgres_path(&path)
            ),
            Dialect::Sqlite => format!("json_extract(data, '{}')", sqlite_path(&path)),
        })
    }

    /// Predicate comparing a stored field with the JSON text bound at `param`
    pub fn data_key_equals(&self, field: &str, param: &str) -> Result<String, NamingError> {
        let path = field_path(field)?;
        Ok(match self {
            Dialect::Postgres => format!(
                "CAST(data AS jsonb) #> '{}' = CAST({param} AS jsonb)",
                postgres_path(&path)
            ),
            Dialect::Sqlite => format!("data -> '{}' = {param}", sqlite_path(&path)),
        })
    }

    /// Placeholder for a payload value being written
    pub fn payload_param(&self, param: &str) -> String {
        match self {
            Dialect::Postgres => format!("CAST({param} AS json)"),
            Dialect::Sqlite => format!("json({param})"),
        }
    }

    /// Payload column as text when reading it back
    pub fn payload_column(&self) -> &'static str {
        match self {
            Dialect::Postgres => "CAST(data AS text) AS data",
            Dialect::Sqlite => "data",
        }
    }
}

/// Text array literal; quoted elements so that e.g. `null` isn't read as NULL
fn postgres_path(segments: &[&str]) -> String {
    format!("{{{}}}", segments.iter().map(|s| format!("\"{s}\"")).join(","))
}

fn sqlite_path(segments: &[&str]) -> String {
    format!("${}", segments.iter().map(|s| format!(".\"{s}\"")).join(""))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("orders", "orders")]
    #[case("system.indexes", "system_indexes")]
    #[case("a.b.c", "a_b_c")]
    #[case("with-dash_and_9", "with-dash_and_9")]
    fn test_table_name(#[case] collection: &str, #[case] expected: &str) {
        assert_eq!(table_name(collection).unwrap(), expected);
    }

    #[rstest]
    #[case("with space")]
    #[case("with/slash")]
    #[case("quote\"d")]
    #[case("semi;colon")]
    #[case("")]
    fn test_table_name_rejects_unsafe_names(#[case] collection: &str) {
        assert_eq!(
            table_name(collection),
            Err(NamingError::IllegalCollectionName {
                name: collection.to_string()
            })
        );
    }

    #[test]
    fn test_table_name_rejects_metadata_table() {
        assert!(matches!(
            table_name("_meta"),
            Err(NamingError::ReservedName { .. })
        ));
    }

    #[test]
    fn test_schema_name() {
        assert_eq!(schema_name("testdb").unwrap(), "testdb");
        assert!(schema_name("test.db").is_err());
        assert!(schema_name("test db").is_err());
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("plain"), "\"plain\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_qualified_table_name() {
        assert_eq!(
            Dialect::Postgres
                .qualified_table_name("testdb", "orders.2024")
                .unwrap(),
            "\"testdb\".\"orders_2024\""
        );
        assert_eq!(
            Dialect::Sqlite
                .qualified_table_name("testdb", "orders.2024")
                .unwrap(),
            "\"testdb.orders_2024\""
        );
        assert_eq!(
            Dialect::Postgres.metadata_table_name("testdb").unwrap(),
            "\"testdb\".\"_meta\""
        );
        assert!(matches!(
            Dialect::Postgres.qualified_table_name("testdb", "bad name"),
            Err(NamingError::IllegalCollectionName { .. })
        ));
    }

    #[test]
    fn test_rename_target() {
        assert_eq!(
            Dialect::Postgres.rename_target("testdb", "archived"),
            "\"archived\""
        );
        assert_eq!(
            Dialect::Sqlite.rename_target("testdb", "archived"),
            "\"testdb.archived\""
        );
    }

    #[test]
    fn test_data_key() {
        assert_eq!(
            Dialect::Postgres.data_key("customer.name").unwrap(),
            "NULLIF(CAST(data AS jsonb) #> '{\"customer\",\"name\"}', 'null')"
        );
        assert_eq!(
            Dialect::Sqlite.data_key("customer.name").unwrap(),
            "json_extract(data, '$.\"customer\".\"name\"')"
        );
        assert!(matches!(
            Dialect::Sqlite.data_key("a'); DROP TABLE x; --"),
            Err(NamingError::IllegalFieldName { .. })
        ));
        assert!(Dialect::Postgres.data_key("a..b").is_err());
    }

    #[rstest]
    #[case("null")]
    #[case("NULL")]
    fn test_data_key_quotes_null_segments(#[case] field: &str) {
        assert_eq!(
            Dialect::Postgres.data_key(&format!("{field}.x")).unwrap(),
            format!("NULLIF(CAST(data AS jsonb) #> '{{\"{field}\",\"x\"}}', 'null')")
        );
        assert_eq!(
            Dialect::Postgres.data_key_equals(field, "$1").unwrap(),
            format!("CAST(data AS jsonb) #> '{{\"{field}\"}}' = CAST($1 AS jsonb)")
        );
    }

    #[test]
    fn test_data_key_equals() {
        assert_eq!(
            Dialect::Postgres.data_key_equals("_id", "$2").unwrap(),
            "CAST(data AS jsonb) #> '{\"_id\"}' = CAST($2 AS jsonb)"
        );
        assert_eq!(
            Dialect::Sqlite.data_key_equals("_id", "$2").unwrap(),
            "data -> '$.\"_id\"' = $2"
        );
    }
}
