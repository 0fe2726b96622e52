use thiserror::Error;

/// Errors surfaced by every fallible operation in this crate.
///
/// Nothing is retried internally. A store-level failure is never reported as
/// an empty result; the one defined exception is
/// [`exists_by_metadata`](crate::VectorStore::exists_by_metadata), where "no
/// rows" is the valid answer `false`.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// The connection handle is unavailable or already closed.
    #[error("connection error: {0}")]
    Connection(String),
    /// Schema bootstrap failed. Only produced by [`SchemaInitializer`](crate::SchemaInitializer);
    /// the store logs it and starts degraded instead of propagating it.
    #[error("schema init error: {0}")]
    SchemaInit(String),
    /// Malformed statement or constraint violation reported by the server.
    #[error("query error: {0}")]
    Query(String),
    /// Embedding or metadata could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// An input constraint was violated before any I/O happened.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("config error: {0}")]
    Config(String),
    /// A multi-row metadata update stopped after `applied` of `total` rows.
    /// The rows already written stay written.
    #[error("partial update: {applied} of {total} rows updated before failure: {reason}")]
    PartialUpdate {
        applied: usize,
        total: usize,
        reason: String,
    },
}

impl VectorStoreError {
    /// Classify a driver error, prefixing it with the operation that failed.
    pub(crate) fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => Self::Connection(format!("{context}: {err}")),
            other => Self::Query(format!("{context}: {other}")),
        }
    }

    /// Whether this error means the connection itself is unusable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

pub type Result<T, E = VectorStoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_is_a_connection_error() {
        let err = VectorStoreError::from_sqlx("fetch", sqlx::Error::PoolClosed);
        assert!(err.is_connection());
        assert!(err.to_string().starts_with("connection error: fetch:"));
    }

    #[test]
    fn row_not_found_is_a_query_error() {
        let err = VectorStoreError::from_sqlx("insert", sqlx::Error::RowNotFound);
        assert!(matches!(err, VectorStoreError::Query(_)));
    }

    #[test]
    fn partial_update_message_names_progress() {
        let err = VectorStoreError::PartialUpdate {
            applied: 2,
            total: 5,
            reason: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "partial update: 2 of 5 rows updated before failure: boom"
        );
    }
}
