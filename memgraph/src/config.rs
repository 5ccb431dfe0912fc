//! Process-wide configuration
//!
//! Defaults can be overridden with `MEMGRAPH_*` environment variables via
//! [`MemoryConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MemoryError, Result};

/// Sentinel used when a caller omits the namespace or bucket
pub const DEFAULT_PARTITION: &str = "default";

/// Where rows are kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StorageBackend {
    /// RocksDB directory
    RocksDb { path: PathBuf },
    /// Process-local, lost on exit
    InMemory,
}

/// Memory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub storage: StorageBackend,
    /// Name of the single memory table
    pub table_name: String,
    /// Embedding dimensionality, fixed for the lifetime of a table
    pub embedding_dimension: usize,
    pub default_namespace: String,
    pub default_bucket: String,
    /// Upper bound for `top_k` in searches
    pub max_top_k: usize,
    /// Upper bound for traversal depth
    pub max_traversal_depth: u32,
    /// Embedding cache entry lifetime in seconds
    pub embedding_cache_ttl_secs: u64,
    /// Maximum number of cached embeddings
    pub embedding_cache_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::RocksDb {
                path: PathBuf::from(".memgraph").join("memory"),
            },
            table_name: "memory".to_string(),
            embedding_dimension: 768,
            default_namespace: DEFAULT_PARTITION.to_string(),
            default_bucket: DEFAULT_PARTITION.to_string(),
            max_top_k: 100,
            max_traversal_depth: 10,
            embedding_cache_ttl_secs: 7 * 24 * 60 * 60,
            embedding_cache_capacity: 10_000,
        }
    }
}

impl MemoryConfig {
    /// In-memory configuration with the given dimension, mostly for tests
    pub fn in_memory(embedding_dimension: usize) -> Self {
        Self {
            storage: StorageBackend::InMemory,
            embedding_dimension,
            ..Default::default()
        }
    }

    /// RocksDB configuration rooted at `path`
    pub fn rocksdb(path: impl Into<PathBuf>, embedding_dimension: usize) -> Self {
        Self {
            storage: StorageBackend::RocksDb { path: path.into() },
            embedding_dimension,
            ..Default::default()
        }
    }

    /// Defaults overlaid with environment variables:
    ///
    /// - `MEMGRAPH_DB_PATH` (or `MEMGRAPH_STORAGE=memory` for the in-memory backend)
    /// - `MEMGRAPH_TABLE`
    /// - `MEMGRAPH_EMBEDDING_DIMENSION`
    /// - `MEMGRAPH_DEFAULT_NAMESPACE`, `MEMGRAPH_DEFAULT_BUCKET`
    /// - `MEMGRAPH_MAX_TOP_K`, `MEMGRAPH_MAX_DEPTH`
    /// - `MEMGRAPH_CACHE_TTL_SECS`, `MEMGRAPH_CACHE_CAPACITY`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("MEMGRAPH_DB_PATH") {
            config.storage = StorageBackend::RocksDb {
                path: PathBuf::from(path),
            };
        }
        if let Some(storage) = lookup("MEMGRAPH_STORAGE") {
            match storage.as_str() {
                "memory" | "in-memory" => config.storage = StorageBackend::InMemory,
                "rocksdb" => {}
                other => {
                    return Err(MemoryError::config(format!(
                        "MEMGRAPH_STORAGE must be 'rocksdb' or 'memory', got {:?}",
                        other
                    )))
                }
            }
        }
        if let Some(table) = lookup("MEMGRAPH_TABLE") {
            config.table_name = table;
        }
        if let Some(ns) = lookup("MEMGRAPH_DEFAULT_NAMESPACE") {
            config.default_namespace = ns;
        }
        if let Some(bucket) = lookup("MEMGRAPH_DEFAULT_BUCKET") {
            config.default_bucket = bucket;
        }

        parse_into(&lookup, "MEMGRAPH_EMBEDDING_DIMENSION", &mut config.embedding_dimension)?;
        parse_into(&lookup, "MEMGRAPH_MAX_TOP_K", &mut config.max_top_k)?;
        parse_into(&lookup, "MEMGRAPH_MAX_DEPTH", &mut config.max_traversal_depth)?;
        parse_into(&lookup, "MEMGRAPH_CACHE_TTL_SECS", &mut config.embedding_cache_ttl_secs)?;
        parse_into(&lookup, "MEMGRAPH_CACHE_CAPACITY", &mut config.embedding_cache_capacity)?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and that the default partitions are safe tags
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(MemoryError::config("embedding_dimension must be positive"));
        }
        if self.max_top_k == 0 {
            return Err(MemoryError::config("max_top_k must be positive"));
        }
        if self.max_traversal_depth == 0 {
            return Err(MemoryError::config("max_traversal_depth must be positive"));
        }
        crate::sanitize::sanitize(&self.default_namespace, "default_namespace")?;
        crate::sanitize::sanitize(&self.default_bucket, "default_bucket")?;
        crate::sanitize::sanitize(&self.table_name, "table_name")?;
        Ok(())
    }

    pub fn embedding_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.embedding_cache_ttl_secs)
    }
}

fn parse_into<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<()> {
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| MemoryError::config(format!("{} has invalid value {:?}", key, raw)))?;
    }
    Ok(())
}
