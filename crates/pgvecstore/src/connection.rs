//! The store primitives the rest of the crate is written against, and their
//! PostgreSQL implementation.

use async_trait::async_trait;
use futures::TryStreamExt;
use pgvector::Vector;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{Result, VectorStoreError};
use crate::statement::{Param, Statement};
use crate::TRACING_TARGET;

/// One decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(Value),
    Vector(Vec<f32>),
}

/// A result row as ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: Vec<(String, Cell)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, cell: Cell) -> Self {
        self.columns.push((name.into(), cell));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cell)| cell)
    }

    pub fn first(&self) -> Option<&Cell> {
        self.columns.first().map(|(_, cell)| cell)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Cell)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Parameterized-statement primitives over a shared, concurrency-safe handle.
///
/// Implementations must allow concurrent calls; callers do no locking of
/// their own. Every method fails with [`VectorStoreError::Connection`] once
/// [`close`](StoreConnection::close) has run.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Run a statement and return the number of rows it affected.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Run `statements` in order inside one transaction and return the total
    /// number of rows affected. The first failure rolls everything back.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64>;

    /// Run a statement and return its first row, if any.
    async fn query_row(&self, statement: &Statement) -> Result<Option<RawRow>>;

    /// Run a statement and drain every row it streams back.
    ///
    /// The server-side cursor is released on every exit path, including a
    /// failure part-way through the stream.
    async fn query(&self, statement: &Statement) -> Result<Vec<RawRow>>;

    /// Release the handle. Calling this more than once is a no-op.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// [`StoreConnection`] over a `sqlx` PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    pool: PgPool,
}

impl ConnectionManager {
    /// Build a pool from `config`. The pool connects eagerly so that bad
    /// credentials surface here rather than on the first query.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(config.ssl_mode.to_pg());

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| VectorStoreError::from_sqlx("connect", e))?;

        info!(
            target: TRACING_TARGET,
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn ensure_open(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(VectorStoreError::Connection(
                "connection is closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreConnection for ConnectionManager {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.ensure_open()?;
        trace_statement("execute", statement);
        let result = bind_params(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::from_sqlx("execute", e))?;
        Ok(result.rows_affected())
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
        self.ensure_open()?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::from_sqlx("begin", e))?;
        let mut affected = 0;
        for statement in statements {
            trace_statement("execute_batch", statement);
            let result = bind_params(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::from_sqlx("execute_batch", e))?;
            affected += result.rows_affected();
        }
        tx.commit()
            .await
            .map_err(|e| VectorStoreError::from_sqlx("commit", e))?;
        Ok(affected)
    }

    async fn query_row(&self, statement: &Statement) -> Result<Option<RawRow>> {
        self.ensure_open()?;
        trace_statement("query_row", statement);
        let row = bind_params(statement)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VectorStoreError::from_sqlx("query_row", e))?;
        row.as_ref().map(to_raw_row).transpose()
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<RawRow>> {
        self.ensure_open()?;
        trace_statement("query", statement);
        let mut stream = bind_params(statement).fetch(&self.pool);
        let mut rows = Vec::new();
        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| VectorStoreError::from_sqlx("query", e))?
        {
            rows.push(to_raw_row(&row)?);
        }
        Ok(rows)
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!(target: TRACING_TARGET, "postgres pool closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

fn trace_statement(kind: &str, statement: &Statement) {
    debug!(
        target: TRACING_TARGET,
        kind,
        sql = %statement.sql,
        params = statement.params.len(),
        "running statement"
    );
}

fn bind_params(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |q, param| match param {
            Param::Text(s) => q.bind(s.clone()),
            Param::Int(n) => q.bind(*n),
            Param::Float(f) => q.bind(*f),
            Param::Vector(v) => q.bind(Vector::from(v.clone())),
            Param::Json(v) => q.bind(v.clone()),
        })
}

fn to_raw_row(row: &PgRow) -> Result<RawRow> {
    row.columns()
        .iter()
        .map(|col| -> Result<(String, Cell)> {
            let cell = decode_cell(row, col.ordinal(), col.type_info().name())?;
            Ok((col.name().to_string(), cell))
        })
        .collect()
}

fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> Result<Cell> {
    let cell = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(Cell::Bool)),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map(|v| v.map(|n| Cell::Int(n.into()))),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map(|v| v.map(|n| Cell::Int(n.into()))),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Cell::Int)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| v.map(|f| Cell::Float(f.into()))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(|v| v.map(Cell::Float)),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx).map(|v| v.map(Cell::Json)),
        "vector" => row
            .try_get::<Option<Vector>, _>(idx)
            .map(|v| v.map(|v| Cell::Vector(v.to_vec()))),
        _ => row.try_get::<Option<String>, _>(idx).map(|v| v.map(Cell::Text)),
    };
    cell.map(|c| c.unwrap_or(Cell::Null))
        .map_err(|e| VectorStoreError::from_sqlx("decode column", e))
}
