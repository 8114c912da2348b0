pub mod commands;

use std::io::Write;
use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::Value;
use tracing::debug;

use crate::collection::interface::{Backend, Collection, Error};
use crate::document::{encoded_size, get_path, CodecError, Document, DocumentCodec, JsonCodec};
use crate::sort::SortSpec;

use commands::{Command, Target};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Collection(#[from] Error),

    #[error("Invalid {what}: {source}")]
    InvalidInput {
        what: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("No document in {target} has {id_field} = {value}")]
    NotFound {
        target: String,
        id_field: String,
        value: Value,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

fn parse_document(what: &'static str, text: &str) -> Result<Document> {
    JsonCodec
        .decode(text)
        .map_err(|source| CliError::InvalidInput { what, source })
}

fn byte_size(document: &Document) -> Result<i64> {
    encoded_size(&JsonCodec, document).map_err(|source| CliError::InvalidInput {
        what: "document",
        source,
    })
}

pub struct DocsqlCli {
    backend: Arc<dyn Backend>,
}

impl DocsqlCli {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        DocsqlCli { backend }
    }

    // Run a single command, writing its results to `out`
    pub async fn run<W: Write>(&self, command: Command, out: &mut W) -> Result<()> {
        debug!("Running {command:?}");

        match command {
            Command::CreateDatabase { database } => {
                self.backend.create_database(&database).await?;
                writeln!(out, "Created database {database}")?;
            }
            Command::Create { target } => {
                let collection = self
                    .backend
                    .create_collection(&target.database, &target.collection)
                    .await?;
                writeln!(out, "Created collection {}", collection.full_name())?;
            }
            Command::Count { target } => {
                let count = self.open(&target)?.count().await?;
                writeln!(out, "{count}")?;
            }
            Command::Insert { target, documents } => {
                let documents = documents
                    .iter()
                    .map(|text| parse_document("document", text))
                    .collect::<Result<Vec<_>>>()?;

                let collection = self.open(&target)?;
                for document in documents {
                    let position = collection.insert(&document).await?;
                    collection
                        .update_stored_byte_size(byte_size(&document)?)
                        .await?;
                    writeln!(out, "{position}")?;
                }
            }
            Command::Find {
                target,
                query,
                sort,
                skip,
                limit,
            } => {
                let query = parse_document("query", &query)?;
                let sort = match sort {
                    Some(sort) => SortSpec::from_document(&parse_document("sort", &sort)?)?,
                    None => SortSpec::natural(),
                };

                let mut documents = self.open(&target)?.scan(&query, &sort, skip, limit).await?;
                while let Some(document) = documents.try_next().await? {
                    let text = JsonCodec
                        .encode(&document)
                        .map_err(|source| CliError::InvalidInput {
                            what: "document",
                            source,
                        })?;
                    writeln!(out, "{text}")?;
                }
            }
            Command::Remove { target, document } => {
                let probe = parse_document("document", &document)?;
                let collection = self.open(&target)?;

                let position = collection.find_position_by_identifier(&probe).await?;
                // Found by identifier, so the probe has one
                let id_value = get_path(&probe, collection.id_field())
                    .cloned()
                    .unwrap_or(Value::Null);

                let Some(position) = position else {
                    return Err(CliError::NotFound {
                        target: collection.full_name(),
                        id_field: collection.id_field().to_string(),
                        value: id_value,
                    });
                };

                // The stored version decides how many bytes are given back
                let mut query = Document::new();
                query.insert(collection.id_field().to_string(), id_value);
                let stored = collection
                    .scan(&query, &SortSpec::default(), 0, 1)
                    .await?
                    .try_next()
                    .await?;

                collection.delete_by_position(position).await?;
                if let Some(stored) = stored {
                    collection
                        .update_stored_byte_size(-byte_size(&stored)?)
                        .await?;
                }
                writeln!(out, "Removed document at position {position}")?;
            }
            Command::Rename {
                target,
                new_collection,
                new_database,
            } => {
                let mut collection = self.open(&target)?;
                let new_database = new_database.unwrap_or_else(|| target.database.clone());
                collection.rename_to(&new_database, &new_collection).await?;
                writeln!(
                    out,
                    "Renamed {}.{} to {}",
                    target.database,
                    target.collection,
                    collection.full_name()
                )?;
            }
            Command::Size { target } => {
                let size = self.open(&target)?.stored_byte_size().await?;
                writeln!(out, "{size}")?;
            }
            Command::Drop { target } => {
                let collection = self.open(&target)?;
                collection.drop_collection().await?;
                writeln!(out, "Dropped collection {}", collection.full_name())?;
            }
        }

        Ok(())
    }

    fn open(&self, target: &Target) -> Result<Box<dyn Collection>> {
        Ok(self.backend.collection(&target.database, &target.collection)?)
    }
}
