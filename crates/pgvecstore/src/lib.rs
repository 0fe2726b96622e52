//! Typed, metadata-aware vector collections on PostgreSQL + pgvector.
//!
//! All embeddings live in one `vector_store` table; a *collection* is just a
//! string tag on each row. [`VectorStore`] turns typed inputs (an embedding,
//! a collection name, a [`MetadataFilter`], a [`SimilarityMetric`]) into
//! parameterized statements and maps the rows that come back into
//! [`VectorRecord`]s.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pgvecstore::{
//!     ConnectionConfig, MetadataFilter, NewVector, SearchConfig, SimilarityMetric, StoreConfig,
//!     VectorStore,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::new(ConnectionConfig::from_env()?, 3);
//! let store = VectorStore::connect(config).await?;
//!
//! store
//!     .add_vector(NewVector::new("docs", vec![0.1, 0.2, 0.3], "hello"))
//!     .await?;
//!
//! let hits = store
//!     .search_vector(
//!         "docs",
//!         &[0.1, 0.2, 0.3],
//!         &SearchConfig::new(SimilarityMetric::Cosine).with_limit(1),
//!     )
//!     .await?;
//! assert_eq!(hits.len(), 1);
//!
//! let any = store
//!     .exists_by_metadata("docs", &MetadataFilter::new().where_eq("lang", "en"))
//!     .await?;
//! # let _ = any;
//! store.close().await;
//! # Ok(())
//! # }
//! ```

mod clause;
mod config;
mod connection;
mod error;
mod mapper;
pub mod query;
mod schema;
#[doc(hidden)]
pub mod scripted;
mod statement;
mod store;
mod types;

/// `tracing` target used by every event this crate emits.
pub const TRACING_TARGET: &str = "pgvecstore";

pub use clause::{push_where, Clause, ClauseBuilder};
pub use config::{
    ConnectionConfig, SearchConfig, SimilarityMetric, SslMode, StoreConfig, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_PORT, DEFAULT_SEARCH_LIMIT,
};
pub use connection::{Cell, ConnectionManager, RawRow, StoreConnection};
pub use error::{Result, VectorStoreError};
pub use mapper::{
    check_dimension, decode_embedding, decode_metadata, encode_embedding, encode_metadata,
    ResultMapper,
};
pub use schema::{SchemaInitializer, SchemaStatus, SCHEMA_LOCK_KEY};
pub use statement::{Param, Statement};
pub use store::VectorStore;
pub use types::{Metadata, MetadataFilter, NewVector, VectorRecord};
