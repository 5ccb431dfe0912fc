//! Memory CRUD engine
//!
//! Add, search, delete and clear memories within a namespace, optionally
//! narrowed to a bucket. Every predicate is built through [`Filter`], so
//! namespace and bucket values are sanitized before any storage call.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::embedding::{EmbeddingGateway, EmbeddingIntent};
use crate::error::{MemoryError, Result};
use crate::filter::Filter;
use crate::manager::TableManager;
use crate::node::{MemoryId, MemoryNode, MemoryRecord, NewMemory, SearchHit};
use crate::sanitize::{parse_memory_id, sanitize};

/// Memory CRUD operations
pub struct MemoryEngine {
    tables: Arc<TableManager>,
    embeddings: Arc<EmbeddingGateway>,
    config: Arc<MemoryConfig>,
}

impl MemoryEngine {
    pub fn new(
        tables: Arc<TableManager>,
        embeddings: Arc<EmbeddingGateway>,
        config: Arc<MemoryConfig>,
    ) -> Self {
        Self {
            tables,
            embeddings,
            config,
        }
    }

    /// Store `memory` in `namespace` and return its new id.
    ///
    /// The row is written only after the document embedding succeeded.
    pub async fn add(&self, memory: NewMemory, namespace: &str) -> Result<MemoryId> {
        if memory.connected_nodes.len() != memory.relationship_types.len() {
            return Err(MemoryError::argument_mismatch(format!(
                "{} connected_nodes but {} relationship_types",
                memory.connected_nodes.len(),
                memory.relationship_types.len()
            )));
        }

        let namespace = sanitize(namespace, "namespace")?;
        let bucket = memory
            .bucket
            .as_deref()
            .unwrap_or(&self.config.default_bucket);
        let bucket = sanitize(bucket, "bucket")?;

        let connected_nodes = memory
            .connected_nodes
            .iter()
            .map(|target| parse_memory_id(target, "connected_nodes").map(|id| id.to_string()))
            .collect::<Result<Vec<_>>>()?;

        let table = self.tables.open_table().await?;
        let vector = self
            .embeddings
            .embed(&memory.content, EmbeddingIntent::Document)
            .await?;

        let memory_id = MemoryId::new();
        let row = MemoryNode {
            memory_id,
            content: memory.content,
            bucket: bucket.to_string(),
            namespace: namespace.to_string(),
            vector,
            connected_nodes,
            relationship_types: memory.relationship_types,
        };
        table.insert(vec![row]).await?;

        log::debug!("Added memory {} to {}/{}", memory_id, namespace, bucket);
        Ok(memory_id)
    }

    /// Up to `top_k` memories most similar to `query`, nearest first.
    ///
    /// An empty result is not an error.
    pub async fn search(
        &self,
        query: &str,
        bucket: Option<&str>,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 || top_k > self.config.max_top_k {
            return Err(MemoryError::invalid_input(
                "top_k",
                format!("must be between 1 and {}, got {}", self.config.max_top_k, top_k),
            ));
        }

        let filter = scope(namespace, bucket)?;
        let table = self.tables.open_table().await?;
        let query_vector = self.embeddings.embed(query, EmbeddingIntent::Query).await?;

        log::debug!("Vector search top {} where {}", top_k, filter);
        let hits = table.vector_search(&query_vector, &filter, top_k).await?;

        Ok(hits
            .into_iter()
            .map(|(row, distance)| SearchHit {
                record: row.into(),
                distance,
            })
            .collect())
    }

    /// Fetch one memory by id
    pub async fn get(&self, memory_id: MemoryId, namespace: &str) -> Result<Option<MemoryRecord>> {
        let filter = Filter::namespace(namespace)?.and_id(memory_id);
        let table = self.tables.open_table().await?;
        Ok(table
            .scan(&filter)
            .await?
            .into_iter()
            .next()
            .map(MemoryRecord::from))
    }

    /// Fetch one memory by its identifier string
    pub async fn get_by_str(
        &self,
        memory_id: &str,
        namespace: &str,
    ) -> Result<Option<MemoryRecord>> {
        self.get(parse_memory_id(memory_id, "memory_id")?, namespace).await
    }

    /// Delete a memory.
    ///
    /// Deleting an absent id succeeds; the return value says whether a row
    /// was removed. Edges in other rows that point at it are left in place.
    pub async fn delete(&self, memory_id: MemoryId, namespace: &str) -> Result<bool> {
        let filter = Filter::namespace(namespace)?.and_id(memory_id);
        let table = self.tables.open_table().await?;
        let removed = table.delete(&filter).await?;
        log::debug!("Delete where {} removed {} rows", filter, removed);
        Ok(removed > 0)
    }

    /// Remove every memory in `bucket` (the default bucket if `None`).
    ///
    /// Returns the number of removed rows.
    pub async fn clear(&self, bucket: Option<&str>, namespace: &str) -> Result<usize> {
        let bucket = bucket.unwrap_or(&self.config.default_bucket);
        let filter = scope(namespace, Some(bucket))?;
        let table = self.tables.open_table().await?;
        let removed = table.delete(&filter).await?;
        log::info!("Cleared {} memories where {}", removed, filter);
        Ok(removed)
    }

    /// Distinct bucket names in `namespace`
    pub async fn list_buckets(&self, namespace: &str) -> Result<HashSet<String>> {
        let filter = Filter::namespace(namespace)?;
        let table = self.tables.open_table().await?;
        Ok(table
            .scan(&filter)
            .await?
            .into_iter()
            .map(|row| row.bucket)
            .collect())
    }

    /// Number of memories in `namespace`
    pub async fn count(&self, namespace: &str) -> Result<usize> {
        let filter = Filter::namespace(namespace)?;
        self.tables.open_table().await?.count(&filter).await
    }
}

fn scope(namespace: &str, bucket: Option<&str>) -> Result<Filter> {
    let filter = Filter::namespace(namespace)?;
    match bucket {
        Some(bucket) => filter.and_bucket(bucket),
        None => Ok(filter),
    }
}
