use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::data_types::{DataSize, Position, DEFAULT_ID_FIELD};
use crate::document::{CodecError, Document, DocumentCodec, JsonCodec};
use crate::matcher::{EqualityMatcher, QueryMatcher};
use crate::naming::{Dialect, NamingError};
use crate::sort::SortSpec;

/// What was being attempted when an error happened, phrased to read as
/// "Failed to <operation> <target>"
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Operation {
    #[strum(serialize = "count")]
    Count,
    #[strum(serialize = "drop")]
    Drop,
    #[strum(serialize = "query")]
    Scan,
    #[strum(serialize = "insert into")]
    Insert,
    #[strum(serialize = "update document in")]
    Update,
    #[strum(serialize = "remove document from")]
    Delete,
    #[strum(serialize = "find document position in")]
    FindPosition,
    #[strum(serialize = "get document from")]
    GetDocument,
    #[strum(serialize = "update datasize of")]
    UpdateDataSize,
    #[strum(serialize = "retrieve datasize of")]
    GetDataSize,
    #[strum(serialize = "rename")]
    Rename,
    #[strum(serialize = "create database")]
    CreateDatabase,
    #[strum(serialize = "create")]
    CreateCollection,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Failed to {operation} {target}: collection doesn't exist")]
    CollectionDoesNotExist {
        operation: Operation,
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to {operation} {target}: collection already exists")]
    CollectionAlreadyExists {
        operation: Operation,
        target: String,
        #[source]
        source: sqlx::Error,
    },

    // All other engine errors
    #[error("Failed to {operation} {target}: {source}")]
    Persistence {
        operation: Operation,
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to {operation} {target}: {source}")]
    Serialization {
        operation: Operation,
        target: String,
        #[source]
        source: CodecError,
    },

    #[error("Failed to {operation} {target}: {reason}")]
    Consistency {
        operation: Operation,
        target: String,
        reason: &'static str,
    },

    #[error("Cannot {operation} {target}: {reason} is not supported")]
    Unsupported {
        operation: Operation,
        target: String,
        reason: &'static str,
    },
}

impl Error {
    /// Whether this marks a deliberately unimplemented path rather than a fault
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lazy, single-pass sequence of matching documents
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// Knobs shared by every collection handed out by a backend
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub id_field: String,
    pub codec: Arc<dyn DocumentCodec>,
    pub matcher: Arc<dyn QueryMatcher>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            codec: Arc::new(JsonCodec),
            matcher: Arc::new(EqualityMatcher),
        }
    }
}

/// A document collection backed by one relational table.
///
/// Every call borrows its own connection and gives it back before returning
/// (a scan gives it back once its stream ends or is dropped); nothing is cached
/// between calls.
#[async_trait]
pub trait Collection: Send + Sync + Debug {
    fn database_name(&self) -> &str;

    fn collection_name(&self) -> &str;

    fn id_field(&self) -> &str;

    fn full_name(&self) -> String {
        format!("{}.{}", self.database_name(), self.collection_name())
    }

    async fn count(&self) -> Result<u64>;

    /// Drop the backing table. Indexes and the metadata record are the
    /// caller's to clean up.
    async fn drop_collection(&self) -> Result<()>;

    /// Scan the whole table in `sort` order and yield the documents matching
    /// `query`. `skip` and `limit` count matches, not rows; a `limit` of zero
    /// or less means no limit.
    ///
    /// Name and sort errors are returned straight away. Engine and payload
    /// errors arrive through the stream, which ends after the first one.
    async fn scan(
        &self,
        query: &Document,
        sort: &SortSpec,
        skip: i64,
        limit: i64,
    ) -> Result<DocumentStream>;

    async fn scan_positions(
        &self,
        _query: &Document,
        _positions: &[Position],
        _sort: &SortSpec,
        _skip: i64,
        _limit: i64,
    ) -> Result<DocumentStream> {
        Err(Error::Unsupported {
            operation: Operation::Scan,
            target: self.full_name(),
            reason: "restricting a scan to known positions",
        })
    }

    async fn get_document(&self, _position: Position) -> Result<Document> {
        Err(Error::Unsupported {
            operation: Operation::GetDocument,
            target: self.full_name(),
            reason: "loading a document by position",
        })
    }

    async fn insert(&self, document: &Document) -> Result<Position>;

    /// Overwrite the stored document whose identifier equals the one in
    /// `document`. Does nothing if there is no such document.
    async fn update_by_identifier(&self, document: &Document) -> Result<()>;

    async fn delete_by_position(&self, position: Position) -> Result<()>;

    async fn find_position_by_identifier(
        &self,
        document: &Document,
    ) -> Result<Option<Position>>;

    async fn update_stored_byte_size(&self, delta: DataSize) -> Result<()>;

    async fn stored_byte_size(&self) -> Result<DataSize>;

    /// Rename the table (and its primary key) in place, keeping every row and
    /// position. Moving to another database isn't supported.
    async fn rename_to(
        &mut self,
        new_database_name: &str,
        new_collection_name: &str,
    ) -> Result<()>;
}

#[async_trait]
pub trait Backend: Send + Sync + Debug {
    fn dialect(&self) -> Dialect;

    /// Handle to an existing collection; validates the names without touching
    /// the database
    fn collection(
        &self,
        database_name: &str,
        collection_name: &str,
    ) -> Result<Box<dyn Collection>>;

    /// Create the schema and metadata table of a database if they're missing
    async fn create_database(&self, database_name: &str) -> Result<()>;

    /// Create the table and metadata record of a new collection
    async fn create_collection(
        &self,
        database_name: &str,
        collection_name: &str,
    ) -> Result<Box<dyn Collection>>;
}
