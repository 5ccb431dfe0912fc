//! Memory graph facade
//!
//! [`MemoryGraph`] wires one table manager, one embedding gateway and the
//! two engines together from a single [`MemoryConfig`]. Front ends only
//! talk to this type.

use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::embedding::{EmbeddingGateway, SharedProvider};
use crate::error::Result;
use crate::graph::GraphEngine;
use crate::manager::TableManager;
use crate::memory::MemoryEngine;

/// Namespaced memory store with a node-local knowledge graph
pub struct MemoryGraph {
    config: Arc<MemoryConfig>,
    tables: Arc<TableManager>,
    embeddings: Arc<EmbeddingGateway>,
    memories: MemoryEngine,
    graph: GraphEngine,
}

impl MemoryGraph {
    /// Build the store. The table itself is opened on first use.
    pub fn new(config: MemoryConfig, provider: SharedProvider) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let tables = Arc::new(TableManager::new(&config));
        let embeddings = Arc::new(EmbeddingGateway::new(
            provider,
            config.embedding_dimension,
            config.embedding_cache_capacity,
            config.embedding_cache_ttl(),
        ));

        let memories = MemoryEngine::new(tables.clone(), embeddings.clone(), config.clone());
        let graph = GraphEngine::new(tables.clone(), config.clone());

        Ok(Self {
            config,
            tables,
            embeddings,
            memories,
            graph,
        })
    }

    /// Open the underlying table now instead of on first use
    pub async fn open(&self) -> Result<()> {
        self.tables.open_table().await.map(|_| ())
    }

    pub fn memories(&self) -> &MemoryEngine {
        &self.memories
    }

    pub fn graph(&self) -> &GraphEngine {
        &self.graph
    }

    pub fn embeddings(&self) -> &EmbeddingGateway {
        &self.embeddings
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// `namespace`, or the configured default when absent
    pub fn namespace<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(&self.config.default_namespace)
    }
}
