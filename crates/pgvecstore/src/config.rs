use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorStoreError};
use crate::types::MetadataFilter;

/// TLS policy for the server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Prefer,
    #[default]
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub(crate) fn to_pg(self) -> sqlx::postgres::PgSslMode {
        use sqlx::postgres::PgSslMode;
        match self {
            Self::Disable => PgSslMode::Disable,
            Self::Prefer => PgSslMode::Prefer,
            Self::Require => PgSslMode::Require,
            Self::VerifyCa => PgSslMode::VerifyCa,
            Self::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

impl FromStr for SslMode {
    type Err = VectorStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(VectorStoreError::Config(format!(
                "unknown ssl mode '{other}'"
            ))),
        }
    }
}

/// Connection settings, owned by the [`ConnectionManager`](crate::ConnectionManager)
/// and never mutated once the pool is built.
///
/// | option | default | effect |
/// |---|---|---|
/// | `host` | `localhost` | server host |
/// | `port` | `5432` | server port |
/// | `user` | `postgres` | role to log in as |
/// | `password` | empty | role password |
/// | `database` | `postgres` | database name |
/// | `ssl_mode` | [`SslMode::Require`] | TLS policy |
/// | `connect_timeout` | 10 s | how long to wait for a connection |
/// | `max_connections` | 5 | pool size |
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: SslMode,
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    pub max_connections: u32,
}

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            ssl_mode: SslMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_connections: 5,
        }
    }
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Build a config from the libpq environment variables (`PGHOST`,
    /// `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`, `PGSSLMODE`).
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup("PGHOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PGPORT") {
            config.port = port
                .parse()
                .map_err(|e| VectorStoreError::Config(format!("invalid PGPORT '{port}': {e}")))?;
        }
        if let Some(user) = lookup("PGUSER") {
            config.user = user;
        }
        if let Some(password) = lookup("PGPASSWORD") {
            config.password = password;
        }
        if let Some(database) = lookup("PGDATABASE") {
            config.database = database;
        }
        if let Some(mode) = lookup("PGSSLMODE") {
            config.ssl_mode = mode.parse()?;
        }
        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(VectorStoreError::Config("host must not be empty".to_string()));
        }
        if self.database.is_empty() {
            return Err(VectorStoreError::Config(
                "database must not be empty".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(VectorStoreError::Config(
                "max_connections must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Configuration for a [`VectorStore`](crate::VectorStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub connection: ConnectionConfig,
    /// Length every stored and queried embedding must have.
    pub dimension: usize,
}

impl StoreConfig {
    pub fn new(connection: ConnectionConfig, dimension: usize) -> Self {
        Self {
            connection,
            dimension,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VectorStoreError::Config("dimension must be > 0".to_string()));
        }
        self.connection.validate()
    }
}

/// Distance function used to rank embeddings.
///
/// Results are always ordered ascending by the operator's output, so smaller
/// is closer for every metric. For [`NegativeInnerProduct`](Self::NegativeInnerProduct)
/// that means a larger raw inner product ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Euclidean,
    #[default]
    Cosine,
    NegativeInnerProduct,
}

impl SimilarityMetric {
    /// The pgvector operator selecting this metric.
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Euclidean => "<->",
            Self::Cosine => "<=>",
            Self::NegativeInnerProduct => "<#>",
        }
    }
}

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Options for [`VectorStore::search_vector`](crate::VectorStore::search_vector).
///
/// | option | default | effect |
/// |---|---|---|
/// | `metric` | [`SimilarityMetric::Cosine`] | distance operator |
/// | `limit` | 10 | maximum rows returned, must be > 0 |
/// | `threshold` | none | keep rows with `distance <= threshold` |
/// | `metadata_filter` | empty | equality filter on metadata |
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub metric: SimilarityMetric,
    pub limit: usize,
    pub threshold: Option<f64>,
    pub metadata_filter: MetadataFilter,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::default(),
            limit: DEFAULT_SEARCH_LIMIT,
            threshold: None,
            metadata_filter: MetadataFilter::new(),
        }
    }
}

impl SearchConfig {
    pub fn new(metric: SimilarityMetric) -> Self {
        Self {
            metric,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.metadata_filter = filter;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(VectorStoreError::Validation("limit must be > 0".to_string()));
        }
        if i64::try_from(self.limit).is_err() {
            return Err(VectorStoreError::Validation(format!(
                "limit must be at most {}, got {}",
                i64::MAX,
                self.limit
            )));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() {
                return Err(VectorStoreError::Validation(format!(
                    "threshold must be finite, got {t}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn connection_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn debug_redacts_password() {
        let config = ConnectionConfig::new("db", "app", "hunter2", "vectors");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn from_lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("PGHOST", "db.internal"),
            ("PGPORT", "6543"),
            ("PGSSLMODE", "disable"),
        ]
        .into_iter()
        .collect();
        let config =
            ConnectionConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.ssl_mode, SslMode::Disable);
        assert_eq!(config.user, "postgres");
    }

    #[test]
    fn from_lookup_rejects_bad_port() {
        let err = ConnectionConfig::from_lookup(|k| (k == "PGPORT").then(|| "abc".to_string()))
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Config(_)));
    }

    #[test]
    fn store_config_rejects_zero_dimension() {
        let config = StoreConfig::new(ConnectionConfig::default(), 0);
        assert!(matches!(config.validate(), Err(VectorStoreError::Config(_))));
    }

    #[test]
    fn metric_operators_are_fixed() {
        assert_eq!(SimilarityMetric::Euclidean.operator(), "<->");
        assert_eq!(SimilarityMetric::Cosine.operator(), "<=>");
        assert_eq!(SimilarityMetric::NegativeInnerProduct.operator(), "<#>");
    }

    #[test]
    fn metric_serializes_snake_case() {
        let json = serde_json::to_string(&SimilarityMetric::NegativeInnerProduct).unwrap();
        assert_eq!(json, "\"negative_inner_product\"");
    }

    #[test]
    fn search_config_defaults_and_validation() {
        let config = SearchConfig::default();
        assert_eq!(config.limit, 10);
        assert!(config.threshold.is_none());
        assert!(config.metadata_filter.is_empty());
        assert!(config.validate().is_ok());

        assert!(SearchConfig::default().with_limit(0).validate().is_err());
        assert!(SearchConfig::default()
            .with_threshold(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn search_limit_must_fit_a_bigint() {
        let err = SearchConfig::default()
            .with_limit(usize::MAX)
            .validate()
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        assert!(SearchConfig::default()
            .with_limit(i64::MAX as usize)
            .validate()
            .is_ok());
    }
}
