//! Row storage behind the memory and graph engines
//!
//! A [`Table`] exposes the primitives the engines need: append rows, vector
//! search with a post-filter, filtered scan, filtered update of the edge
//! columns, and filtered delete. Two backends implement it:
//! [`RocksTable`] (persistent, HNSW-indexed) and [`InMemoryTable`].

mod memory;
mod rocks;

pub use memory::InMemoryTable;
pub use rocks::RocksTable;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{MemoryError, Result};
use crate::filter::Filter;
use crate::node::MemoryNode;

/// Column names in storage order
pub const COLUMNS: [&str; 7] = [
    "memory_id",
    "content",
    "bucket",
    "namespace",
    "connected_nodes",
    "relationship_types",
    "vector",
];

/// Fixed table schema; only the vector width varies between deployments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
    pub dimension: usize,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            dimension,
        }
    }

    /// Reject rows that do not fit the schema
    pub fn check_row(&self, row: &MemoryNode) -> Result<()> {
        if row.vector.len() != self.dimension {
            return Err(MemoryError::schema(format!(
                "vector for {} has {} dimensions, table {} expects {}",
                row.memory_id,
                row.vector.len(),
                self.name,
                self.dimension
            )));
        }
        if row.connected_nodes.len() != row.relationship_types.len() {
            return Err(MemoryError::schema(format!(
                "edge arrays for {} differ in length ({} targets, {} labels)",
                row.memory_id,
                row.connected_nodes.len(),
                row.relationship_types.len()
            )));
        }
        Ok(())
    }
}

/// New values for the edge columns, the only mutable part of a row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeUpdate {
    pub connected_nodes: Vec<String>,
    pub relationship_types: Vec<String>,
}

impl EdgeUpdate {
    /// Snapshot the edge arrays of `node`
    pub fn from_node(node: &MemoryNode) -> Self {
        Self {
            connected_nodes: node.connected_nodes.clone(),
            relationship_types: node.relationship_types.clone(),
        }
    }

    fn check(&self) -> Result<()> {
        if self.connected_nodes.len() != self.relationship_types.len() {
            return Err(MemoryError::argument_mismatch(format!(
                "{} targets but {} relationship types",
                self.connected_nodes.len(),
                self.relationship_types.len()
            )));
        }
        Ok(())
    }

    fn apply(&self, node: &mut MemoryNode) {
        node.connected_nodes = self.connected_nodes.clone();
        node.relationship_types = self.relationship_types.clone();
    }
}

/// Storage table
///
/// Implementations must be safe for concurrent readers and writers; the
/// engines add no locking of their own around individual primitives.
#[async_trait]
pub trait Table: Send + Sync {
    /// Table schema
    fn schema(&self) -> &TableSchema;

    /// Append fully assembled rows
    async fn insert(&self, rows: Vec<MemoryNode>) -> Result<()>;

    /// Up to `limit` rows matching `filter`, nearest first, with their
    /// cosine distance to `query`
    async fn vector_search(
        &self,
        query: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<(MemoryNode, f32)>>;

    /// All rows matching `filter`, in no particular order
    async fn scan(&self, filter: &Filter) -> Result<Vec<MemoryNode>>;

    /// Overwrite the edge columns of every matching row; returns rows touched
    async fn update(&self, filter: &Filter, update: EdgeUpdate) -> Result<usize>;

    /// Remove every matching row; returns rows removed
    async fn delete(&self, filter: &Filter) -> Result<usize>;

    /// Number of matching rows
    async fn count(&self, filter: &Filter) -> Result<usize> {
        Ok(self.scan(filter).await?.len())
    }
}

/// Calculate cosine similarity between two vectors
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Cosine distance, 0 for identical direction, 2 for opposite
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Exact nearest-first ranking of `rows` against `query`
pub(crate) fn rank_by_distance<I>(query: &[f32], rows: I, limit: usize) -> Vec<(MemoryNode, f32)>
where
    I: IntoIterator<Item = MemoryNode>,
{
    let mut scored: Vec<(MemoryNode, f32)> = rows
        .into_iter()
        .map(|row| {
            let distance = cosine_distance(query, &row.vector);
            (row, distance)
        })
        .collect();

    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MemoryId;

    fn row(vector: Vec<f32>) -> MemoryNode {
        MemoryNode {
            memory_id: MemoryId::new(),
            content: "x".to_string(),
            bucket: "default".to_string(),
            namespace: "default".to_string(),
            vector,
            connected_nodes: vec![],
            relationship_types: vec![],
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
    }

    #[test]
    fn test_cosine_distance_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_rank_by_distance() {
        let near = row(vec![1.0, 0.1]);
        let far = row(vec![0.0, 1.0]);
        let mid = row(vec![1.0, 1.0]);
        let ranked = rank_by_distance(&[1.0, 0.0], vec![far.clone(), near.clone(), mid.clone()], 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.memory_id, near.memory_id);
        assert_eq!(ranked[1].0.memory_id, mid.memory_id);
        assert!(ranked[0].1 <= ranked[1].1);
    }

    #[test]
    fn test_schema_check_row() {
        let schema = TableSchema::new("memory", 2);
        assert!(schema.check_row(&row(vec![1.0, 0.0])).is_ok());
        assert!(matches!(
            schema.check_row(&row(vec![1.0])),
            Err(MemoryError::Schema(_))
        ));

        let mut bad = row(vec![1.0, 0.0]);
        bad.connected_nodes.push("x".to_string());
        assert!(schema.check_row(&bad).is_err());
    }
}
