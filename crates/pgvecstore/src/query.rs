//! Statement assembly over the fixed `vector_store` schema.
//!
//! Each builder concatenates a static skeleton with [`ClauseBuilder`] output
//! and a trailing `ORDER BY`/`LIMIT` or `RETURNING` fragment.

use crate::clause::{push_where, Clause, ClauseBuilder};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::mapper;
use crate::statement::{Param, Statement};
use crate::types::{MetadataFilter, NewVector};

pub const TABLE: &str = "vector_store";

/// Projection shared by every statement that yields records. Vector and JSON
/// columns travel as text and are decoded by the result mapper.
const RECORD_COLUMNS: &str =
    "id, collection_name, embedding::text AS embedding, document, metadata::text AS metadata";

/// `INSERT ... RETURNING` the full row.
pub fn insert(new: &NewVector) -> Result<Statement> {
    let metadata = new
        .metadata
        .as_ref()
        .map(mapper::encode_metadata)
        .transpose()?;
    let stmt = Statement::new(format!(
        "INSERT INTO {TABLE} (collection_name, embedding, document, metadata) \
         VALUES ($1, $2::vector, $3, $4) RETURNING {RECORD_COLUMNS}"
    ))
    .with_param(Param::Text(new.collection.clone()))
    .with_param(Param::Vector(new.embedding.clone()))
    .with_param(Param::Text(new.document.clone()))
    .with_param(Param::Json(metadata));
    Ok(stmt)
}

/// Similarity search scoped to one collection.
///
/// The distance is computed inside a CTE so the outer query can filter on it.
/// Ordering is ascending for every metric.
pub fn similarity_search(collection: &str, query: &[f32], config: &SearchConfig) -> Statement {
    let mut stmt = Statement::new("");
    let vector = stmt.bind(Param::Vector(query.to_vec()));
    stmt.push_sql(&format!(
        "WITH ranked AS (SELECT id, collection_name, embedding, document, metadata, \
         embedding {op} {vector}::vector AS distance FROM {TABLE}",
        op = config.metric.operator(),
    ));
    push_where(&mut stmt, &ClauseBuilder::new().collection(collection).build());
    stmt.push_sql(&format!(") SELECT {RECORD_COLUMNS}, distance FROM ranked"));

    let outer = ClauseBuilder::new()
        .threshold(config.threshold)
        .metadata(&config.metadata_filter)
        .build();
    push_where(&mut stmt, &outer);

    let limit = stmt.bind(Param::Int(i64::try_from(config.limit).unwrap_or(i64::MAX)));
    stmt.push_sql(&format!(" ORDER BY distance ASC LIMIT {limit}"));
    stmt
}

/// All records of `collection` matching `filter`.
pub fn fetch_by_metadata(collection: &str, filter: &MetadataFilter) -> Statement {
    let mut stmt = Statement::new(format!("SELECT {RECORD_COLUMNS} FROM {TABLE}"));
    push_where(&mut stmt, &scoped(collection, filter));
    stmt.push_sql(" ORDER BY id ASC");
    stmt
}

/// Ids of the records of `collection` matching `filter`.
pub fn select_ids(collection: &str, filter: &MetadataFilter) -> Statement {
    let mut stmt = Statement::new(format!("SELECT id FROM {TABLE}"));
    push_where(&mut stmt, &scoped(collection, filter));
    stmt.push_sql(" ORDER BY id ASC");
    stmt
}

/// A single-row, single-column boolean.
pub fn exists_by_metadata(collection: &str, filter: &MetadataFilter) -> Statement {
    let mut stmt = Statement::new(format!("SELECT EXISTS (SELECT 1 FROM {TABLE}"));
    push_where(&mut stmt, &scoped(collection, filter));
    stmt.push_sql(") AS found");
    stmt
}

/// `DELETE ... RETURNING id`; the number of returned rows is the count removed.
pub fn delete_by_metadata(collection: &str, filter: &MetadataFilter) -> Statement {
    let mut stmt = Statement::new(format!("DELETE FROM {TABLE}"));
    push_where(&mut stmt, &scoped(collection, filter));
    stmt.push_sql(" RETURNING id");
    stmt
}

/// Merge `field = value` into one row's metadata, keeping its other keys.
pub fn update_metadata_field(id: i64, field: &str, value: &serde_json::Value) -> Statement {
    Statement::new(format!(
        "UPDATE {TABLE} SET metadata = COALESCE(metadata, '{{}}'::jsonb) || \
         jsonb_build_object($1::text, $2::jsonb), updated_at = now() \
         WHERE id = $3 RETURNING {RECORD_COLUMNS}"
    ))
    .with_param(Param::Text(field.to_string()))
    .with_param(Param::Json(Some(value.clone())))
    .with_param(Param::Int(id))
}

fn scoped(collection: &str, filter: &MetadataFilter) -> Vec<Clause> {
    ClauseBuilder::new()
        .collection(collection)
        .metadata(filter)
        .build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::SimilarityMetric;
    use crate::types::Metadata;

    #[test]
    fn insert_binds_all_values() {
        let new = NewVector::new("docs", vec![0.1, 0.2, 0.3], "hello")
            .with_metadata(Metadata::from([("cat".to_string(), json!("a"))]));
        let stmt = insert(&new).unwrap();
        assert!(stmt.sql.starts_with("INSERT INTO vector_store"));
        assert!(stmt.sql.contains("RETURNING id, collection_name"));
        assert_eq!(stmt.params.len(), 4);
        assert_eq!(stmt.params[0], Param::Text("docs".to_string()));
        assert_eq!(stmt.params[1], Param::Vector(vec![0.1, 0.2, 0.3]));
        assert_eq!(stmt.params[3], Param::Json(Some(json!({"cat": "a"}))));
    }

    #[test]
    fn insert_without_metadata_binds_null() {
        let stmt = insert(&NewVector::new("docs", vec![1.0], "x")).unwrap();
        assert_eq!(stmt.params[3], Param::Json(None));
    }

    #[test]
    fn search_without_outer_clauses() {
        let stmt = similarity_search("docs", &[1.0, 0.0], &SearchConfig::default().with_limit(3));
        assert_eq!(
            stmt.sql,
            "WITH ranked AS (SELECT id, collection_name, embedding, document, metadata, \
             embedding <=> $1::vector AS distance FROM vector_store WHERE collection_name = $2) \
             SELECT id, collection_name, embedding::text AS embedding, document, \
             metadata::text AS metadata, distance FROM ranked ORDER BY distance ASC LIMIT $3"
        );
        assert_eq!(
            stmt.params,
            vec![
                Param::Vector(vec![1.0, 0.0]),
                Param::Text("docs".to_string()),
                Param::Int(3),
            ]
        );
    }

    #[test]
    fn search_with_threshold_and_filter() {
        let config = SearchConfig::new(SimilarityMetric::Euclidean)
            .with_threshold(0.25)
            .with_filter(MetadataFilter::new().where_eq("cat", "a").where_eq("skip", ""));
        let stmt = similarity_search("docs", &[1.0], &config);
        assert!(stmt.sql.contains("embedding <-> $1::vector AS distance"));
        assert!(stmt
            .sql
            .contains("FROM ranked WHERE distance <= $3 AND metadata->>$4 = $5 ORDER BY distance ASC LIMIT $6"));
        assert_eq!(stmt.params[2], Param::Float(0.25));
        assert_eq!(stmt.params.len(), 6);
    }

    #[test]
    fn oversized_limit_clamps_instead_of_wrapping() {
        let config = SearchConfig::default().with_limit(usize::MAX);
        let stmt = similarity_search("docs", &[1.0], &config);
        assert_eq!(stmt.params.last(), Some(&Param::Int(i64::MAX)));
    }

    #[test]
    fn search_uses_metric_operator() {
        let stmt = similarity_search(
            "docs",
            &[1.0],
            &SearchConfig::new(SimilarityMetric::NegativeInnerProduct),
        );
        assert!(stmt.sql.contains("embedding <#> $1::vector"));
        assert!(stmt.sql.contains("ORDER BY distance ASC"));
    }

    #[test]
    fn fetch_with_empty_filter_scopes_to_collection_only() {
        let stmt = fetch_by_metadata("docs", &MetadataFilter::new());
        assert!(stmt
            .sql
            .ends_with("FROM vector_store WHERE collection_name = $1 ORDER BY id ASC"));
        assert_eq!(stmt.params, vec![Param::Text("docs".to_string())]);
    }

    #[test]
    fn exists_wraps_predicate() {
        let stmt = exists_by_metadata("docs", &MetadataFilter::new().where_eq("x", "y"));
        assert_eq!(
            stmt.sql,
            "SELECT EXISTS (SELECT 1 FROM vector_store WHERE collection_name = $1 \
             AND metadata->>$2 = $3) AS found"
        );
    }

    #[test]
    fn delete_returns_ids() {
        let stmt = delete_by_metadata("docs", &MetadataFilter::new().where_eq("cat", "b"));
        assert_eq!(
            stmt.sql,
            "DELETE FROM vector_store WHERE collection_name = $1 AND metadata->>$2 = $3 RETURNING id"
        );
    }

    #[test]
    fn update_merges_single_field() {
        let stmt = update_metadata_field(7, "status", &json!("done"));
        assert!(stmt
            .sql
            .contains("COALESCE(metadata, '{}'::jsonb) || jsonb_build_object($1::text, $2::jsonb)"));
        assert!(stmt.sql.contains("WHERE id = $3"));
        assert_eq!(
            stmt.params,
            vec![
                Param::Text("status".to_string()),
                Param::Json(Some(json!("done"))),
                Param::Int(7),
            ]
        );
    }
}
