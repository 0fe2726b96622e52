//! Conversion between typed values and what travels over the wire.
//!
//! Defaults are fixed: absent/`NULL` metadata decodes to an empty map and an
//! absent/`NULL` distance decodes to `0.0`. Anything else that does not
//! decode is a [`VectorStoreError::Serialization`].

use serde_json::Value;

use crate::connection::{Cell, RawRow};
use crate::error::{Result, VectorStoreError};
use crate::types::{Metadata, VectorRecord};

/// Render an embedding in pgvector's text form, e.g. `[0.1,0.2,0.3]`.
pub fn encode_embedding(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|f| f.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Parse pgvector's text form, requiring exactly `dimension` finite components.
pub fn decode_embedding(text: &str, dimension: usize) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| {
            VectorStoreError::Serialization(format!("malformed embedding '{text}'"))
        })?;

    let embedding = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner
            .split(',')
            .map(|part| {
                let value: f32 = part.trim().parse().map_err(|e| {
                    VectorStoreError::Serialization(format!(
                        "invalid embedding component '{part}': {e}"
                    ))
                })?;
                if !value.is_finite() {
                    return Err(VectorStoreError::Serialization(format!(
                        "non-finite embedding component '{part}'"
                    )));
                }
                Ok(value)
            })
            .collect::<Result<Vec<f32>>>()?
    };

    check_dimension(&embedding, dimension)
        .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
    Ok(embedding)
}

/// Fail with a validation error unless `embedding.len() == dimension`.
pub fn check_dimension(embedding: &[f32], dimension: usize) -> Result<()> {
    if embedding.len() != dimension {
        return Err(VectorStoreError::Validation(format!(
            "embedding has {} dimensions, expected {dimension}",
            embedding.len()
        )));
    }
    Ok(())
}

pub fn encode_metadata(metadata: &Metadata) -> Result<Value> {
    serde_json::to_value(metadata)
        .map_err(|e| VectorStoreError::Serialization(format!("failed to encode metadata: {e}")))
}

/// Decode a metadata column given as JSON, JSON text, or `NULL`.
pub fn decode_metadata(cell: Option<&Cell>) -> Result<Metadata> {
    let value = match cell {
        None | Some(Cell::Null) => return Ok(Metadata::new()),
        Some(Cell::Json(value)) => value.clone(),
        Some(Cell::Text(text)) => serde_json::from_str(text).map_err(|e| {
            VectorStoreError::Serialization(format!("failed to decode metadata: {e}"))
        })?,
        Some(other) => {
            return Err(VectorStoreError::Serialization(format!(
                "unexpected metadata cell {other:?}"
            )))
        }
    };
    match value {
        Value::Null => Ok(Metadata::new()),
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(VectorStoreError::Serialization(format!(
            "metadata must be a JSON object, got {other}"
        ))),
    }
}

/// Maps raw rows to [`VectorRecord`]s for a store of fixed dimension.
#[derive(Debug, Clone, Copy)]
pub struct ResultMapper {
    dimension: usize,
}

impl ResultMapper {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn record(&self, row: &RawRow) -> Result<VectorRecord> {
        let id = int_column(row, "id")?;
        let collection = text_column(row, "collection_name")?;
        let document = text_column(row, "document")?;
        let embedding = match required(row, "embedding")? {
            Cell::Text(text) => decode_embedding(text, self.dimension)?,
            Cell::Vector(v) => {
                check_dimension(v, self.dimension)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                v.clone()
            }
            other => {
                return Err(VectorStoreError::Serialization(format!(
                    "unexpected embedding cell {other:?}"
                )))
            }
        };
        let metadata = decode_metadata(row.get("metadata"))?;
        let distance = match row.get("distance") {
            None | Some(Cell::Null) => 0.0,
            Some(Cell::Float(f)) => *f,
            Some(Cell::Int(n)) => *n as f64,
            Some(other) => {
                return Err(VectorStoreError::Serialization(format!(
                    "unexpected distance cell {other:?}"
                )))
            }
        };

        Ok(VectorRecord {
            id,
            collection,
            embedding,
            document,
            metadata,
            distance,
        })
    }

    pub fn records(&self, rows: &[RawRow]) -> Result<Vec<VectorRecord>> {
        rows.iter().map(|row| self.record(row)).collect()
    }

    /// The first column of a single-row boolean result. No row reads as `false`.
    pub fn boolean(row: Option<&RawRow>) -> Result<bool> {
        match row.and_then(RawRow::first) {
            None | Some(Cell::Null) => Ok(false),
            Some(Cell::Bool(b)) => Ok(*b),
            Some(other) => Err(VectorStoreError::Serialization(format!(
                "expected a boolean, got {other:?}"
            ))),
        }
    }

    pub fn id(row: &RawRow) -> Result<i64> {
        int_column(row, "id")
    }
}

fn required<'r>(row: &'r RawRow, name: &str) -> Result<&'r Cell> {
    row.get(name)
        .ok_or_else(|| VectorStoreError::Serialization(format!("missing column '{name}'")))
}

fn int_column(row: &RawRow, name: &str) -> Result<i64> {
    match required(row, name)? {
        Cell::Int(n) => Ok(*n),
        other => Err(VectorStoreError::Serialization(format!(
            "column '{name}': expected an integer, got {other:?}"
        ))),
    }
}

fn text_column(row: &RawRow, name: &str) -> Result<String> {
    match required(row, name)? {
        Cell::Text(s) => Ok(s.clone()),
        other => Err(VectorStoreError::Serialization(format!(
            "column '{name}': expected text, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(embedding: &str, metadata: Cell) -> RawRow {
        RawRow::new()
            .with("id", Cell::Int(3))
            .with("collection_name", Cell::Text("docs".to_string()))
            .with("embedding", Cell::Text(embedding.to_string()))
            .with("document", Cell::Text("hello".to_string()))
            .with("metadata", metadata)
    }

    #[test]
    fn embedding_text_round_trips() {
        let v = vec![0.1f32, -2.5, 3.0e-7, 1234.5];
        let decoded = decode_embedding(&encode_embedding(&v), 4).unwrap();
        for (a, b) in v.iter().zip(&decoded) {
            assert!((a - b).abs() <= f32::EPSILON * a.abs().max(1.0));
        }
    }

    #[test]
    fn decode_rejects_wrong_dimension() {
        let err = decode_embedding("[1,2,3]", 2).unwrap_err();
        assert!(matches!(err, VectorStoreError::Serialization(_)));
    }

    #[test]
    fn decode_rejects_malformed_text() {
        assert!(decode_embedding("1,2", 2).is_err());
        assert!(decode_embedding("[1,abc]", 2).is_err());
        assert!(decode_embedding("[1,NaN]", 2).is_err());
    }

    #[test]
    fn check_dimension_is_a_validation_error() {
        let err = check_dimension(&[1.0], 3).unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
    }

    #[test]
    fn metadata_round_trips() {
        let metadata: Metadata = [
            ("source".to_string(), json!("test")),
            ("page".to_string(), json!(42)),
            ("tags".to_string(), json!(["a", "b"])),
        ]
        .into_iter()
        .collect();
        let encoded = encode_metadata(&metadata).unwrap();
        let as_text = Cell::Text(encoded.to_string());
        assert_eq!(decode_metadata(Some(&as_text)).unwrap(), metadata);
        assert_eq!(decode_metadata(Some(&Cell::Json(encoded))).unwrap(), metadata);
    }

    #[test]
    fn null_metadata_is_empty_map() {
        assert!(decode_metadata(None).unwrap().is_empty());
        assert!(decode_metadata(Some(&Cell::Null)).unwrap().is_empty());
        assert!(decode_metadata(Some(&Cell::Text("null".to_string())))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn non_object_metadata_is_rejected() {
        let err = decode_metadata(Some(&Cell::Text("[1,2]".to_string()))).unwrap_err();
        assert!(matches!(err, VectorStoreError::Serialization(_)));
    }

    #[test]
    fn record_defaults_distance_and_metadata() {
        let mapper = ResultMapper::new(3);
        let record = mapper.record(&row("[0.1,0.2,0.3]", Cell::Null)).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.collection, "docs");
        assert_eq!(record.embedding, vec![0.1, 0.2, 0.3]);
        assert!(record.metadata.is_empty());
        assert_eq!(record.distance, 0.0);
    }

    #[test]
    fn record_reads_distance_and_metadata() {
        let mapper = ResultMapper::new(3);
        let r = row("[1,0,0]", Cell::Text(r#"{"cat":"a"}"#.to_string()))
            .with("distance", Cell::Float(0.25));
        let record = mapper.record(&r).unwrap();
        assert_eq!(record.distance, 0.25);
        assert_eq!(record.metadata["cat"], json!("a"));
    }

    #[test]
    fn record_accepts_binary_vector_cell() {
        let mapper = ResultMapper::new(2);
        let r = RawRow::new()
            .with("id", Cell::Int(1))
            .with("collection_name", Cell::Text("c".to_string()))
            .with("embedding", Cell::Vector(vec![0.5, 0.5]))
            .with("document", Cell::Text("d".to_string()));
        assert_eq!(mapper.record(&r).unwrap().embedding, vec![0.5, 0.5]);
    }

    #[test]
    fn record_missing_column_fails() {
        let mapper = ResultMapper::new(1);
        let r = RawRow::new().with("id", Cell::Int(1));
        assert!(matches!(
            mapper.record(&r),
            Err(VectorStoreError::Serialization(_))
        ));
    }

    #[test]
    fn boolean_defaults_to_false_without_rows() {
        assert!(!ResultMapper::boolean(None).unwrap());
        let found = RawRow::new().with("found", Cell::Bool(true));
        assert!(ResultMapper::boolean(Some(&found)).unwrap());
    }
}
