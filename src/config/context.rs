use std::sync::Arc;

use tracing::info;

#[cfg(feature = "backend-postgres")]
use crate::collection::postgres::PostgresBackend;
use crate::collection::{
    interface::{Backend, CollectionOptions},
    sqlite::SqliteBackend,
};

use super::schema;

/// Connect to the configured engine and wrap it in a backend that hands out
/// collections with the configured options
pub async fn build_backend(
    config: &schema::DocsqlConfig,
) -> Result<Arc<dyn Backend>, sqlx::Error> {
    let options = CollectionOptions {
        id_field: config.collections.id_field.clone(),
        ..Default::default()
    };

    let backend: Arc<dyn Backend> = match &config.backend {
        #[cfg(feature = "backend-postgres")]
        schema::Backend::Postgres(schema::Postgres {
            dsn,
            max_connections,
        }) => Arc::new(
            PostgresBackend::try_new(dsn.to_string(), *max_connections)
                .await?
                .with_options(options),
        ),
        schema::Backend::Sqlite(schema::Sqlite { dsn, journal_mode }) => Arc::new(
            SqliteBackend::try_new(dsn.to_string(), (*journal_mode).into())
                .await?
                .with_options(options),
        ),
    };

    info!("Connected to the {} backend", backend.dialect());
    Ok(backend)
}
