/// Default implementation of a `Backend` and its `Collection` that factors out
/// the statements shared between Postgres and SQLite.
///
/// Usage:
///
/// The structs have to have certain fields, since this macro relies on them:
///
/// ```ignore
/// pub struct MyBackend {
///     pub executor: sqlx::Pool<sqlx::SqlxDatabaseType>,
///     pub options: CollectionOptions,
/// }
///
/// pub struct MyCollection {
///     executor: sqlx::Pool<sqlx::SqlxDatabaseType>,
///     options: CollectionOptions,
///     database_name: String,
///     collection_name: String,
///     // Quoted, schema-qualified names
///     table_name: String,
///     metadata_table: String,
/// }
///
/// impl MyBackend {
///     pub const DIALECT: Dialect = Dialect::...;
///     pub const QUERIES: BackendQueries = BackendQueries { ... };
///     pub fn interpret_error(error: sqlx::Error, operation: Operation, target: &str) -> Error {
///         // Turn database-specific error codes into CollectionDoesNotExist etc.
///     }
/// }
///
/// implement_backend!(MyBackend, MyCollection);
/// ```
///
/// The expanding module has to import `async_trait`, `futures::StreamExt`,
/// `sqlx::Row`, `Collection`, `Error` and `Operation`.

/// DDL that differs between SQLite and PG. Placeholders in braces are replaced
/// with quoted identifiers.
pub struct BackendQueries {
    /// `{schema}`
    pub create_schema: Option<&'static str>,
    /// `{metadata_table}`
    pub create_metadata_table: &'static str,
    /// `{table}`, `{primary_key}`
    pub create_collection_table: &'static str,
    /// `{table}`, `{old_primary_key}`, `{new_primary_key}`
    pub rename_constraint: Option<&'static str>,
}

#[macro_export]
macro_rules! implement_backend {
    ($backend: ident, $collection: ident) => {
impl $backend {
    fn open_collection(
        &self,
        database_name: &str,
        collection_name: &str,
    ) -> $crate::collection::interface::Result<$collection> {
        Ok($collection {
            executor: self.executor.clone(),
            options: self.options.clone(),
            database_name: database_name.to_string(),
            collection_name: collection_name.to_string(),
            table_name: $backend::DIALECT.qualified_table_name(database_name, collection_name)?,
            metadata_table: $backend::DIALECT.metadata_table_name(database_name)?,
        })
    }
}

#[async_trait]
impl $crate::collection::interface::Backend for $backend {
    fn dialect(&self) -> $crate::naming::Dialect {
        $backend::DIALECT
    }

    fn collection(
        &self,
        database_name: &str,
        collection_name: &str,
    ) -> $crate::collection::interface::Result<Box<dyn Collection>> {
        Ok(Box::new(self.open_collection(database_name, collection_name)?))
    }

    async fn create_database(&self, database_name: &str) -> $crate::collection::interface::Result<()> {
        let schema = $crate::naming::schema_name(database_name)?;
        let metadata_table = $backend::DIALECT.metadata_table_name(database_name)?;
        let fail = |source| $backend::interpret_error(source, Operation::CreateDatabase, database_name);

        if let Some(create_schema) = $backend::QUERIES.create_schema {
            let query = create_schema.replace("{schema}", &$crate::naming::quote_identifier(&schema));
            sqlx::query(&query).execute(&self.executor).await.map_err(fail)?;
        }

        let query = $backend::QUERIES
            .create_metadata_table
            .replace("{metadata_table}", &metadata_table);
        sqlx::query(&query).execute(&self.executor).await.map_err(fail)?;

        tracing::info!("Set up database {database_name}");
        Ok(())
    }

    async fn create_collection(
        &self,
        database_name: &str,
        collection_name: &str,
    ) -> $crate::collection::interface::Result<Box<dyn Collection>> {
        let collection = self.open_collection(database_name, collection_name)?;
        let table = $crate::naming::table_name(collection_name)?;
        let target = collection.full_name();
        let fail = |source| $backend::interpret_error(source, Operation::CreateCollection, &target);

        // Table and metadata record appear together or not at all
        let mut tx = self.executor.begin().await.map_err(fail)?;

        let query = $backend::QUERIES
            .create_collection_table
            .replace("{table}", &collection.table_name)
            .replace("{primary_key}", &$crate::naming::primary_key_name(&table));
        sqlx::query(&query).execute(&mut *tx).await.map_err(fail)?;

        // A leftover record (e.g. from a renamed collection) belongs to another table
        let query = format!(
            "INSERT INTO {} (collection_name, datasize) VALUES ($1, 0) \
            ON CONFLICT (collection_name) DO UPDATE SET datasize = 0",
            collection.metadata_table
        );
        sqlx::query(&query)
            .bind(collection_name)
            .execute(&mut *tx)
            .await
            .map_err(fail)?;

        tx.commit().await.map_err(fail)?;

        tracing::info!("Created collection {target}");
        Ok(Box::new(collection))
    }
}

impl $collection {
    fn fail(&self, operation: Operation) -> impl Fn(sqlx::Error) -> Error + '_ {
        move |source| $backend::interpret_error(source, operation, &self.full_name())
    }

    fn serialization(&self, operation: Operation) -> impl Fn($crate::document::CodecError) -> Error + '_ {
        move |source| Error::Serialization {
            operation,
            target: self.full_name(),
            source,
        }
    }

    fn inconsistent(&self, operation: Operation, reason: &'static str) -> Error {
        Error::Consistency {
            operation,
            target: self.full_name(),
            reason,
        }
    }

    /// Exactly one row is expected back
    fn single_row<R>(&self, rows: Vec<R>, operation: Operation) -> $crate::collection::interface::Result<R> {
        let mut rows = rows.into_iter();
        match (rows.next(), rows.next()) {
            (Some(row), None) => Ok(row),
            (None, _) => Err(self.inconsistent(operation, "got no result")),
            (Some(_), Some(_)) => Err(self.inconsistent(operation, "got more than one result")),
        }
    }

    /// Bound parameter for the identifier of `document`
    fn identifier_value(
        &self,
        document: &$crate::document::Document,
        operation: Operation,
    ) -> $crate::collection::interface::Result<String> {
        let value = $crate::document::get_path(document, &self.options.id_field).ok_or_else(|| {
            Error::Unsupported {
                operation,
                target: self.full_name(),
                reason: "addressing a document without its identifier field",
            }
        })?;
        $crate::document::to_query_value(value).map_err(self.serialization(operation))
    }
}

#[async_trait]
impl Collection for $collection {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn id_field(&self) -> &str {
        &self.options.id_field
    }

    async fn count(&self) -> $crate::collection::interface::Result<u64> {
        let query = format!("SELECT COUNT(*) AS count FROM {}", self.table_name);
        let rows = sqlx::query(&query)
            .fetch_all(&self.executor)
            .await
            .map_err(self.fail(Operation::Count))?;

        let count: i64 = self
            .single_row(rows, Operation::Count)?
            .try_get("count")
            .map_err(self.fail(Operation::Count))?;
        u64::try_from(count).map_err(|_| self.inconsistent(Operation::Count, "got a negative count"))
    }

    async fn drop_collection(&self) -> $crate::collection::interface::Result<()> {
        let query = format!("DROP TABLE {}", self.table_name);
        sqlx::query(&query)
            .execute(&self.executor)
            .await
            .map_err(self.fail(Operation::Drop))?;

        tracing::info!("Dropped collection {}", self.full_name());
        Ok(())
    }

    async fn scan(
        &self,
        query: &$crate::document::Document,
        sort: &$crate::sort::SortSpec,
        skip: i64,
        limit: i64,
    ) -> $crate::collection::interface::Result<$crate::collection::interface::DocumentStream> {
        use $crate::collection::scan;

        let order_by = $crate::sort::order_by_clause($backend::DIALECT, sort)?;
        let sql = format!(
            "SELECT {} FROM {} {order_by}",
            $backend::DIALECT.payload_column(),
            self.table_name
        );
        tracing::debug!("Scanning {}: {sql}", self.full_name());

        let task = scan::ScanTask {
            query: query.clone(),
            codec: self.options.codec.clone(),
            matcher: self.options.matcher.clone(),
            window: scan::MatchWindow::new(skip, limit),
            target: self.full_name(),
            interpret_error: $backend::interpret_error,
        };
        let executor = self.executor.clone();
        let (tx, documents) = scan::channel();

        tokio::spawn(async move {
            let payloads = sqlx::query(&sql)
                .fetch(&executor)
                .map(|row| row.and_then(|row| row.try_get::<String, _>("data")));
            scan::forward_matches(payloads, task, tx).await;
        });

        Ok(documents)
    }

    async fn insert(
        &self,
        document: &$crate::document::Document,
    ) -> $crate::collection::interface::Result<$crate::data_types::Position> {
        let payload = self
            .options
            .codec
            .encode(document)
            .map_err(self.serialization(Operation::Insert))?;

        let query = format!(
            "INSERT INTO {} (data) VALUES ({}) RETURNING id",
            self.table_name,
            $backend::DIALECT.payload_param("$1")
        );
        let rows = sqlx::query(&query)
            .bind(payload)
            .fetch_all(&self.executor)
            .await
            .map_err(self.fail(Operation::Insert))?;

        let position: $crate::data_types::Position = self
            .single_row(rows, Operation::Insert)?
            .try_get("id")
            .map_err(self.fail(Operation::Insert))?;

        tracing::debug!("Inserted document at position {position} into {}", self.full_name());
        Ok(position)
    }

    async fn update_by_identifier(
        &self,
        document: &$crate::document::Document,
    ) -> $crate::collection::interface::Result<()> {
        let id_value = self.identifier_value(document, Operation::Update)?;
        let payload = self
            .options
            .codec
            .encode(document)
            .map_err(self.serialization(Operation::Update))?;

        let query = format!(
            "UPDATE {} SET data = {} WHERE {}",
            self.table_name,
            $backend::DIALECT.payload_param("$1"),
            $backend::DIALECT.data_key_equals(&self.options.id_field, "$2")?
        );
        let result = sqlx::query(&query)
            .bind(payload)
            .bind(id_value)
            .execute(&self.executor)
            .await
            .map_err(self.fail(Operation::Update))?;

        tracing::debug!("Updated {} row(s) in {}", result.rows_affected(), self.full_name());
        Ok(())
    }

    async fn delete_by_position(
        &self,
        position: $crate::data_types::Position,
    ) -> $crate::collection::interface::Result<()> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table_name);
        sqlx::query(&query)
            .bind(position)
            .execute(&self.executor)
            .await
            .map_err(self.fail(Operation::Delete))?;

        Ok(())
    }

    async fn find_position_by_identifier(
        &self,
        document: &$crate::document::Document,
    ) -> $crate::collection::interface::Result<Option<$crate::data_types::Position>> {
        let id_value = self.identifier_value(document, Operation::FindPosition)?;

        // Two rows are enough to tell that the identifier isn't unique
        let query = format!(
            "SELECT id FROM {} WHERE {} LIMIT 2",
            self.table_name,
            $backend::DIALECT.data_key_equals(&self.options.id_field, "$1")?
        );
        let rows = sqlx::query(&query)
            .bind(id_value)
            .fetch_all(&self.executor)
            .await
            .map_err(self.fail(Operation::FindPosition))?;

        let mut rows = rows.into_iter();
        match (rows.next(), rows.next()) {
            (None, _) => Ok(None),
            (Some(row), None) => Ok(Some(
                row.try_get("id").map_err(self.fail(Operation::FindPosition))?,
            )),
            (Some(_), Some(_)) => Err(self.inconsistent(Operation::FindPosition, "got more than one id")),
        }
    }

    async fn update_stored_byte_size(
        &self,
        delta: $crate::data_types::DataSize,
    ) -> $crate::collection::interface::Result<()> {
        let query = format!(
            "UPDATE {} SET datasize = datasize + $1 WHERE collection_name = $2",
            self.metadata_table
        );
        let result = sqlx::query(&query)
            .bind(delta)
            .bind(self.collection_name.as_str())
            .execute(&self.executor)
            .await
            .map_err(self.fail(Operation::UpdateDataSize))?;

        if result.rows_affected() != 1 {
            return Err(self.inconsistent(Operation::UpdateDataSize, "no metadata record"));
        }
        Ok(())
    }

    async fn stored_byte_size(
        &self,
    ) -> $crate::collection::interface::Result<$crate::data_types::DataSize> {
        let query = format!(
            "SELECT datasize FROM {} WHERE collection_name = $1",
            self.metadata_table
        );
        let rows = sqlx::query(&query)
            .bind(self.collection_name.as_str())
            .fetch_all(&self.executor)
            .await
            .map_err(self.fail(Operation::GetDataSize))?;

        self.single_row(rows, Operation::GetDataSize)?
            .try_get("datasize")
            .map_err(self.fail(Operation::GetDataSize))
    }

    async fn rename_to(
        &mut self,
        new_database_name: &str,
        new_collection_name: &str,
    ) -> $crate::collection::interface::Result<()> {
        // Checked before anything runs, so the table is never half-renamed
        if new_database_name != self.database_name {
            return Err(Error::Unsupported {
                operation: Operation::Rename,
                target: self.full_name(),
                reason: "moving a collection to another database",
            });
        }

        let schema = $crate::naming::schema_name(&self.database_name)?;
        let old_table = $crate::naming::table_name(&self.collection_name)?;
        let new_table = $crate::naming::table_name(new_collection_name)?;

        if new_collection_name != self.collection_name {
            let fail = self.fail(Operation::Rename);
            let mut tx = self.executor.begin().await.map_err(&fail)?;

            if old_table != new_table {
                if let Some(rename_constraint) = $backend::QUERIES.rename_constraint {
                    let query = rename_constraint
                        .replace("{table}", &self.table_name)
                        .replace("{old_primary_key}", &$crate::naming::primary_key_name(&old_table))
                        .replace("{new_primary_key}", &$crate::naming::primary_key_name(&new_table));
                    sqlx::query(&query).execute(&mut *tx).await.map_err(&fail)?;
                }

                let query = format!(
                    "ALTER TABLE {} RENAME TO {}",
                    self.table_name,
                    $backend::DIALECT.rename_target(&schema, &new_table)
                );
                sqlx::query(&query).execute(&mut *tx).await.map_err(&fail)?;
            }

            // A record left behind by a dropped collection of the new name is stale
            let query = format!(
                "DELETE FROM {} WHERE collection_name = $1",
                self.metadata_table
            );
            sqlx::query(&query)
                .bind(new_collection_name)
                .execute(&mut *tx)
                .await
                .map_err(&fail)?;

            let query = format!(
                "UPDATE {} SET collection_name = $1 WHERE collection_name = $2",
                self.metadata_table
            );
            let result = sqlx::query(&query)
                .bind(new_collection_name)
                .bind(self.collection_name.as_str())
                .execute(&mut *tx)
                .await
                .map_err(&fail)?;
            if result.rows_affected() != 1 {
                // Dropping `tx` rolls the table rename back
                return Err(self.inconsistent(Operation::Rename, "no metadata record"));
            }

            tx.commit().await.map_err(&fail)?;
        }

        tracing::info!(
            "Renamed collection {} to {new_database_name}.{new_collection_name}",
            self.full_name()
        );
        self.collection_name = new_collection_name.to_string();
        self.table_name = $backend::DIALECT.qualify(&schema, &new_table);
        Ok(())
    }
}
    };
}
