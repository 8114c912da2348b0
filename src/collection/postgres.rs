use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::{
    migrate::MigrateDatabase, postgres::PgPoolOptions, PgPool, Postgres, Row,
};

use crate::{implement_backend, naming::Dialect};

use super::{
    default::BackendQueries,
    interface::{Collection, CollectionOptions, Error, Operation},
};

#[derive(Debug)]
pub struct PostgresBackend {
    pub executor: PgPool,
    pub options: CollectionOptions,
}

#[derive(Debug)]
pub struct PostgresCollection {
    executor: PgPool,
    options: CollectionOptions,
    database_name: String,
    collection_name: String,
    table_name: String,
    metadata_table: String,
}

impl PostgresBackend {
    pub const DIALECT: Dialect = Dialect::Postgres;
    pub const QUERIES: BackendQueries = BackendQueries {
        create_schema: Some("CREATE SCHEMA IF NOT EXISTS {schema}"),
        create_metadata_table: r#"CREATE TABLE IF NOT EXISTS {metadata_table} (
            collection_name TEXT PRIMARY KEY,
            datasize BIGINT NOT NULL DEFAULT 0
        )"#,
        // The constraint is named after the table so that it can follow renames
        create_collection_table: r#"CREATE TABLE {table} (
            id BIGSERIAL CONSTRAINT {primary_key} PRIMARY KEY,
            data JSON NOT NULL
        )"#,
        rename_constraint: Some(
            "ALTER TABLE {table} RENAME CONSTRAINT {old_primary_key} TO {new_primary_key}",
        ),
    };

    pub async fn try_new(
        dsn: String,
        max_connections: u32,
    ) -> std::result::Result<Self, sqlx::Error> {
        if !Postgres::database_exists(&dsn).await? {
            let _ = Postgres::create_database(&dsn).await;
        }

        PostgresBackend::connect(dsn, max_connections).await
    }

    pub async fn connect(
        dsn: String,
        max_connections: u32,
    ) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .idle_timeout(Duration::from_millis(30000))
            .test_before_acquire(true)
            .connect(&dsn)
            .await?;

        Ok(Self {
            executor: pool,
            options: CollectionOptions::default(),
        })
    }

    pub fn with_options(self, options: CollectionOptions) -> Self {
        Self { options, ..self }
    }

    pub fn interpret_error(error: sqlx::Error, operation: Operation, target: &str) -> Error {
        // Reference: https://www.postgresql.org/docs/current/errcodes-appendix.html
        let code = match &error {
            sqlx::Error::Database(d) => d.code().map(|code| code.into_owned()),
            _ => None,
        };
        let target = target.to_string();

        match code.as_deref() {
            // undefined_table
            Some("42P01") => Error::CollectionDoesNotExist {
                operation,
                target,
                source: error,
            },
            // duplicate_table
            Some("42P07") => Error::CollectionAlreadyExists {
                operation,
                target,
                source: error,
            },
            _ => Error::Persistence {
                operation,
                target,
                source: error,
            },
        }
    }
}

implement_backend!(PostgresBackend, PostgresCollection);

pub mod testutils {
    use rand::Rng;

    use super::PostgresBackend;

    pub fn get_random_schema() -> String {
        // Generate a random schema (taken from IOx)
        let mut rng = rand::thread_rng();
        (&mut rng)
            .sample_iter(rand::distributions::Alphanumeric)
            .filter(|c| c.is_ascii_alphabetic())
            .take(20)
            .map(char::from)
            .collect::<String>()
            .to_lowercase()
    }

    pub async fn make_backend(dsn: &str) -> PostgresBackend {
        PostgresBackend::try_new(dsn.to_string(), 4)
            .await
            .expect("Error setting up the database")
    }
}
