//! WHERE-clause composition.
//!
//! Every user-supplied value, including metadata keys, is emitted as a bound
//! parameter. Clause order is deterministic: collection, threshold, then
//! metadata entries in filter insertion order.

use serde_json::Value;

use crate::statement::{Param, Statement};
use crate::types::MetadataFilter;

/// A single conjunctive predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `collection_name = $n`
    Collection(String),
    /// `distance <= $n`; only valid where a `distance` column is in scope.
    DistanceAtMost(f64),
    /// `metadata->>$k = $v`, for string values.
    MetadataEq { key: String, value: String },
    /// Exact jsonb equality for numbers, booleans, arrays and objects, so
    /// `1e20` matches a stored `100000000000000000000`. The containment test
    /// lets the GIN index narrow candidates; `->` keeps `["a"]` from
    /// matching `["a", "b"]`.
    MetadataJsonEq { key: String, value: Value },
    /// `metadata->>$k IS NULL`
    MetadataIsNull { key: String },
}

impl Clause {
    /// Bind this clause's values into `stmt` and return its SQL fragment.
    pub fn render(&self, stmt: &mut Statement) -> String {
        match self {
            Self::Collection(name) => {
                let p = stmt.bind(Param::Text(name.clone()));
                format!("collection_name = {p}")
            }
            Self::DistanceAtMost(threshold) => {
                let p = stmt.bind(Param::Float(*threshold));
                format!("distance <= {p}")
            }
            Self::MetadataEq { key, value } => {
                let k = stmt.bind(Param::Text(key.clone()));
                let v = stmt.bind(Param::Text(value.clone()));
                format!("metadata->>{k} = {v}")
            }
            Self::MetadataJsonEq { key, value } => {
                let k = stmt.bind(Param::Text(key.clone()));
                let v = stmt.bind(Param::Json(Some(value.clone())));
                format!(
                    "(metadata @> jsonb_build_object({k}::text, {v}::jsonb) \
                     AND metadata->{k} = {v}::jsonb)"
                )
            }
            Self::MetadataIsNull { key } => {
                let k = stmt.bind(Param::Text(key.clone()));
                format!("metadata->>{k} IS NULL")
            }
        }
    }
}

/// Turn one filter entry into a clause. Empty strings mean "no filter".
fn metadata_clause(key: &str, value: &Value) -> Option<Clause> {
    let key = key.to_string();
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(Clause::MetadataEq {
            key,
            value: s.clone(),
        }),
        Value::Null => Some(Clause::MetadataIsNull { key }),
        other => Some(Clause::MetadataJsonEq {
            key,
            value: other.clone(),
        }),
    }
}

/// Collects the predicates of one statement.
///
/// Holds only borrowed inputs and produces a fresh `Vec` per call, so a
/// builder is never shared between concurrent queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClauseBuilder<'a> {
    collection: Option<&'a str>,
    threshold: Option<f64>,
    filter: Option<&'a MetadataFilter>,
}

impl<'a> ClauseBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, collection: &'a str) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn threshold(mut self, threshold: Option<f64>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn metadata(mut self, filter: &'a MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> Vec<Clause> {
        let head = self
            .collection
            .map(|c| Clause::Collection(c.to_string()))
            .into_iter()
            .chain(self.threshold.map(Clause::DistanceAtMost));
        let metadata = self
            .filter
            .into_iter()
            .flat_map(|f| f.iter())
            .filter_map(|(k, v)| metadata_clause(k, v));
        head.chain(metadata).collect()
    }
}

/// Append ` WHERE a AND b ...` to `stmt`, or nothing when `clauses` is empty.
pub fn push_where(stmt: &mut Statement, clauses: &[Clause]) {
    if clauses.is_empty() {
        return;
    }
    let fragments: Vec<String> = clauses.iter().map(|c| c.render(stmt)).collect();
    stmt.push_sql(" WHERE ");
    stmt.push_sql(&fragments.join(" AND "));
}
