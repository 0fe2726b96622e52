use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{SearchConfig, StoreConfig};
use crate::connection::{ConnectionManager, StoreConnection};
use crate::error::{Result, VectorStoreError};
use crate::mapper::{check_dimension, ResultMapper};
use crate::query;
use crate::schema::{SchemaInitializer, SchemaStatus};
use crate::statement::Statement;
use crate::types::{MetadataFilter, NewVector, VectorRecord};
use crate::TRACING_TARGET;

/// Collections of embeddings in the `vector_store` table.
///
/// # Thread safety
///
/// `VectorStore` holds an immutable dimension, the schema status recorded at
/// construction, and a [`StoreConnection`] that is itself safe for concurrent
/// use. No method keeps mutable state between calls, so a single store can be
/// shared (e.g. behind an `Arc`) and called from many tasks at once.
///
/// # Lifecycle
///
/// Construction bootstraps the schema and always ends Ready; a failed
/// bootstrap is logged and recorded as [`SchemaStatus::Degraded`]. After
/// [`close`](Self::close) every operation fails with
/// [`VectorStoreError::Connection`].
pub struct VectorStore<C = ConnectionManager> {
    conn: C,
    dimension: usize,
    mapper: ResultMapper,
    schema: SchemaStatus,
}

impl VectorStore<ConnectionManager> {
    /// Connect to PostgreSQL and bootstrap the schema.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let conn = ConnectionManager::connect(&config.connection).await?;
        Self::open(conn, config.dimension).await
    }
}

impl<C: StoreConnection> VectorStore<C> {
    /// Build a store over an existing connection. Schema bootstrap is best
    /// effort: its failure never fails construction.
    pub async fn open(conn: C, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::Config("dimension must be > 0".to_string()));
        }
        let schema = SchemaInitializer::new(dimension).bootstrap(&conn).await;
        Ok(Self {
            conn,
            dimension,
            mapper: ResultMapper::new(dimension),
            schema,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn schema_status(&self) -> &SchemaStatus {
        &self.schema
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Insert one embedding and return the stored row with its generated id.
    pub async fn add_vector(&self, new: NewVector) -> Result<VectorRecord> {
        check_dimension(&new.embedding, self.dimension)?;
        if new.document.is_empty() {
            return Err(VectorStoreError::Validation(
                "document must not be empty".to_string(),
            ));
        }

        let stmt = query::insert(&new)?;
        let row = self
            .conn
            .query_row(&stmt)
            .await?
            .ok_or_else(|| VectorStoreError::Query("insert returned no row".to_string()))?;
        let record = self.mapper.record(&row)?;
        debug!(
            target: TRACING_TARGET,
            id = record.id,
            collection = %record.collection,
            "vector added"
        );
        Ok(record)
    }

    /// Nearest neighbours of `query` in `collection`, ascending by distance.
    pub async fn search_vector(
        &self,
        collection: &str,
        query: &[f32],
        config: &SearchConfig,
    ) -> Result<Vec<VectorRecord>> {
        check_dimension(query, self.dimension)?;
        config.validate()?;

        let stmt = query::similarity_search(collection, query, config);
        let rows = self.conn.query(&stmt).await?;
        let records = self.mapper.records(&rows)?;
        debug!(
            target: TRACING_TARGET,
            collection,
            metric = ?config.metric,
            results = records.len(),
            "similarity search"
        );
        Ok(records)
    }

    /// Every record of `collection` matching `filter`. An empty filter
    /// matches the whole collection.
    pub async fn fetch_vector_by_metadata(
        &self,
        collection: &str,
        filter: &MetadataFilter,
    ) -> Result<Vec<VectorRecord>> {
        let stmt = query::fetch_by_metadata(collection, filter);
        let rows = self.conn.query(&stmt).await?;
        self.mapper.records(&rows)
    }

    /// Whether any record of `collection` matches `filter`. No match is
    /// `Ok(false)`, never an error.
    pub async fn exists_by_metadata(
        &self,
        collection: &str,
        filter: &MetadataFilter,
    ) -> Result<bool> {
        let stmt = query::exists_by_metadata(collection, filter);
        let row = self.conn.query_row(&stmt).await?;
        ResultMapper::boolean(row.as_ref())
    }

    /// Delete matching records and return how many were removed.
    pub async fn delete_vectors_by_metadata(
        &self,
        collection: &str,
        filter: &MetadataFilter,
    ) -> Result<u64> {
        let stmt = query::delete_by_metadata(collection, filter);
        let removed = self.conn.query(&stmt).await?.len() as u64;
        debug!(target: TRACING_TARGET, collection, removed, "vectors deleted");
        Ok(removed)
    }

    /// Set `field` to `value` in the metadata of every matching record,
    /// keeping all other keys, and return the updated records.
    ///
    /// This is a best-effort batch, not a transaction: matching ids are
    /// fetched first and each row is then updated on its own. Writers racing
    /// between the fetch and a row's update are not isolated from it. A row
    /// deleted in that window is skipped. If an update fails after some rows
    /// were written, those rows stay written and the error is
    /// [`VectorStoreError::PartialUpdate`].
    pub async fn update_metadata_field(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        field: &str,
        value: Value,
    ) -> Result<Vec<VectorRecord>> {
        if field.is_empty() {
            return Err(VectorStoreError::Validation(
                "field name must not be empty".to_string(),
            ));
        }

        let ids = self
            .conn
            .query(&query::select_ids(collection, filter))
            .await?
            .iter()
            .map(ResultMapper::id)
            .collect::<Result<Vec<i64>>>()?;
        let total = ids.len();

        let mut updated = Vec::with_capacity(total);
        for id in ids {
            let stmt = query::update_metadata_field(id, field, &value);
            let result = self
                .conn
                .query_row(&stmt)
                .await
                .and_then(|row| row.map(|r| self.mapper.record(&r)).transpose());
            match result {
                Ok(Some(record)) => updated.push(record),
                Ok(None) => debug!(target: TRACING_TARGET, id, "row vanished before update"),
                Err(e) if updated.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        target: TRACING_TARGET,
                        collection,
                        applied = updated.len(),
                        total,
                        error = %e,
                        "metadata update stopped part-way"
                    );
                    return Err(VectorStoreError::PartialUpdate {
                        applied: updated.len(),
                        total,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(updated)
    }

    /// Run a pre-built statement and return the rows it affected.
    pub async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.conn.execute(statement).await
    }

    /// Release the connection. Safe to call more than once.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }
}
