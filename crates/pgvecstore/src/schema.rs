use tracing::{info, warn};

use crate::connection::StoreConnection;
use crate::error::{Result, VectorStoreError};
use crate::query::TABLE;
use crate::statement::{Param, Statement};
use crate::TRACING_TARGET;

/// Outcome of the schema bootstrap run at store construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Extension, table and indexes exist (or were created).
    Ready,
    /// Bootstrap failed. The store still serves requests against whatever
    /// schema already exists, for example when the role may not run DDL.
    Degraded(String),
}

impl SchemaStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Advisory lock key serializing concurrent bootstraps against one database.
pub const SCHEMA_LOCK_KEY: i64 = 0x7067_7665_6373_746f;

/// Idempotent DDL for the `vector_store` table and its three indexes.
#[derive(Debug, Clone, Copy)]
pub struct SchemaInitializer {
    dimension: usize,
}

impl SchemaInitializer {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// The bootstrap script. It starts by taking a transaction-scoped advisory
    /// lock, so concurrent `IF NOT EXISTS` DDL from several processes cannot
    /// race on the catalogs.
    pub fn statements(&self) -> Vec<Statement> {
        vec![
            Statement::new("SELECT pg_advisory_xact_lock($1)")
                .with_param(Param::Int(SCHEMA_LOCK_KEY)),
            Statement::new("CREATE EXTENSION IF NOT EXISTS vector"),
            Statement::new(format!(
                r#"CREATE TABLE IF NOT EXISTS {TABLE} (
                id SERIAL PRIMARY KEY,
                collection_name TEXT NOT NULL,
                embedding VECTOR({dims}),
                document TEXT NOT NULL,
                metadata JSONB,
                created_at TIMESTAMPTZ DEFAULT now(),
                updated_at TIMESTAMPTZ DEFAULT now()
            )"#,
                dims = self.dimension,
            )),
            Statement::new(format!(
                "CREATE INDEX IF NOT EXISTS {TABLE}_collection_idx ON {TABLE} (collection_name)"
            )),
            Statement::new(format!(
                "CREATE INDEX IF NOT EXISTS {TABLE}_metadata_idx ON {TABLE} \
                 USING gin (metadata jsonb_path_ops)"
            )),
            Statement::new(format!(
                "CREATE INDEX IF NOT EXISTS {TABLE}_embedding_idx ON {TABLE} \
                 USING hnsw (embedding vector_cosine_ops) WITH (m = 24, ef_construction = 100)"
            )),
        ]
    }

    /// Run the script in one transaction, stopping at the first failure.
    pub async fn run(&self, conn: &dyn StoreConnection) -> Result<()> {
        conn.execute_batch(&self.statements())
            .await
            .map_err(|e| VectorStoreError::SchemaInit(e.to_string()))?;
        info!(target: TRACING_TARGET, dimension = self.dimension, "schema ready");
        Ok(())
    }

    /// Like [`run`](Self::run), but a failure is logged and reported as
    /// [`SchemaStatus::Degraded`] instead of an error.
    pub async fn bootstrap(&self, conn: &dyn StoreConnection) -> SchemaStatus {
        match self.run(conn).await {
            Ok(()) => SchemaStatus::Ready,
            Err(e) => {
                warn!(
                    target: TRACING_TARGET,
                    error = %e,
                    "schema bootstrap failed, continuing with existing schema"
                );
                SchemaStatus::Degraded(e.to_string())
            }
        }
    }
}
