use std::str::FromStr;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use crate::{implement_backend, naming::Dialect};

use super::{
    default::BackendQueries,
    interface::{Collection, CollectionOptions, Error, Operation},
};

#[derive(Debug)]
pub struct SqliteBackend {
    pub executor: Pool<Sqlite>,
    pub options: CollectionOptions,
}

#[derive(Debug)]
pub struct SqliteCollection {
    executor: Pool<Sqlite>,
    options: CollectionOptions,
    database_name: String,
    collection_name: String,
    table_name: String,
    metadata_table: String,
}

impl SqliteBackend {
    pub const DIALECT: Dialect = Dialect::Sqlite;
    pub const QUERIES: BackendQueries = BackendQueries {
        // No schemas: the database name is folded into each table name
        create_schema: None,
        create_metadata_table: r#"CREATE TABLE IF NOT EXISTS {metadata_table} (
            collection_name TEXT PRIMARY KEY,
            datasize INTEGER NOT NULL DEFAULT 0
        )"#,
        // AUTOINCREMENT keeps the highest position from being handed out again
        // after it's deleted
        create_collection_table: r#"CREATE TABLE {table} (
            id INTEGER CONSTRAINT {primary_key} PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL CHECK (json_valid(data))
        )"#,
        // Constraint names aren't schema objects in SQLite
        rename_constraint: None,
    };

    pub async fn try_new(
        dsn: String,
        journal_mode: SqliteJournalMode,
    ) -> std::result::Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&dsn)?
            .create_if_missing(true)
            .journal_mode(journal_mode);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self {
            executor: pool,
            options: CollectionOptions::default(),
        })
    }

    pub fn with_options(self, options: CollectionOptions) -> Self {
        Self { options, ..self }
    }

    pub fn interpret_error(error: sqlx::Error, operation: Operation, target: &str) -> Error {
        // Reference: https://www.sqlite.org/rescode.html
        // Missing and duplicate tables are both plain SQLITE_ERROR, so go by the message
        let message = match &error {
            sqlx::Error::Database(d) => d.message().to_string(),
            _ => String::new(),
        };
        let target = target.to_string();

        if message.contains("no such table") {
            Error::CollectionDoesNotExist {
                operation,
                target,
                source: error,
            }
        } else if message.contains("already exists") {
            Error::CollectionAlreadyExists {
                operation,
                target,
                source: error,
            }
        } else {
            Error::Persistence {
                operation,
                target,
                source: error,
            }
        }
    }
}

implement_backend!(SqliteBackend, SqliteCollection);
