use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form JSON metadata stored next to an embedding.
pub type Metadata = HashMap<String, Value>;

/// A row of the `vector_store` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: i64,
    pub collection: String,
    pub embedding: Vec<f32>,
    pub document: String,
    /// Empty when the stored metadata is `NULL`.
    #[serde(default)]
    pub metadata: Metadata,
    /// Distance to the query vector. `0.0` for rows not produced by a search.
    #[serde(default)]
    pub distance: f64,
}

/// Input for [`VectorStore::add_vector`](crate::VectorStore::add_vector).
#[derive(Debug, Clone, PartialEq)]
pub struct NewVector {
    pub collection: String,
    pub embedding: Vec<f32>,
    pub document: String,
    /// `None` is stored as SQL `NULL`.
    pub metadata: Option<Metadata>,
}

impl NewVector {
    pub fn new(
        collection: impl Into<String>,
        embedding: Vec<f32>,
        document: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            embedding,
            document: document.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Conjunction of `metadata[key] == value` predicates.
///
/// Entries keep insertion order so that the generated SQL has a stable
/// shape. Inserting an existing key replaces its value in place. An entry
/// whose value is the empty string means "no filter on this key".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    entries: Vec<(String, Value)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an equality constraint and return the filter.
    pub fn where_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MetadataFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filter = Self::new();
        for (k, v) in iter {
            filter.insert(k, v);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_keeps_insertion_order() {
        let filter = MetadataFilter::new().where_eq("b", "1").where_eq("a", "2").where_eq("c", 3);
        let keys: Vec<&str> = filter.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn filter_replaces_duplicate_key_in_place() {
        let filter: MetadataFilter = [("a", "x"), ("b", "y"), ("a", "z")].into_iter().collect();
        let entries: Vec<(&str, &Value)> = filter.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a", &json!("z")));
        assert_eq!(entries[1], ("b", &json!("y")));
    }

    #[test]
    fn new_vector_defaults_to_no_metadata() {
        let v = NewVector::new("docs", vec![0.1, 0.2], "hello");
        assert!(v.metadata.is_none());
        let v = v.with_metadata(Metadata::from([("k".to_string(), json!(1))]));
        assert_eq!(v.metadata.unwrap()["k"], json!(1));
    }

    #[test]
    fn record_deserializes_with_defaults() {
        let record: VectorRecord = serde_json::from_value(json!({
            "id": 1,
            "collection": "docs",
            "embedding": [0.5],
            "document": "hi",
        }))
        .unwrap();
        assert!(record.metadata.is_empty());
        assert_eq!(record.distance, 0.0);
    }
}
