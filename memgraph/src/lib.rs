//! memgraph: namespaced memory store
//!
//! Free-text memories are embedded, persisted in a single vector-indexed
//! table and retrieved by semantic similarity. Memories can be linked into
//! a directed, labelled knowledge graph whose edges live on the source row.
//!
//! ## Features
//!
//! - **Namespace and bucket isolation** - every predicate is built from sanitized tags
//! - **Semantic search** - query/document embeddings with a TTL cache
//! - **Knowledge graph** - connect, disconnect and breadth-first traversal
//! - **RocksDB persistence** - bincode rows with a lazily rebuilt HNSW index
//!
//! ## Example
//!
//! ```ignore
//! use memgraph::{HashEmbeddingProvider, MemoryConfig, MemoryGraph, NewMemory};
//!
//! let store = MemoryGraph::new(
//!     MemoryConfig::rocksdb(".memgraph/memory", 768),
//!     Arc::new(HashEmbeddingProvider::new()),
//! )?;
//!
//! let cat = store.memories().add(NewMemory::new("cat").bucket("animals"), "default").await?;
//! let lion = store.memories().add(NewMemory::new("lion").bucket("animals"), "default").await?;
//! store.graph().connect(cat, lion, "related_to", "default").await?;
//!
//! let hits = store.memories().search("big cat", Some("animals"), "default", 5).await?;
//! let related = store.graph().traverse(cat, None, 2, "default").await?;
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod graph;
pub mod manager;
pub mod memory;
pub mod node;
pub mod response;
pub mod sanitize;
pub mod store;
pub mod table;

// Re-exports for convenience
pub use config::{MemoryConfig, StorageBackend};
pub use embedding::{
    EmbeddingGateway, EmbeddingIntent, EmbeddingProvider, GeminiConfig, GeminiProvider,
    HashEmbeddingProvider,
};
pub use error::{MemoryError, Result};
pub use filter::Filter;
pub use graph::GraphEngine;
pub use memory::MemoryEngine;
pub use node::{Edge, MemoryId, MemoryNode, MemoryRecord, NewMemory, SearchHit, TraversalHit};
pub use response::{
    AddResponse, BucketsResponse, GetResponse, SearchResponse, Status, StatusResponse,
    TraverseResponse,
};
pub use store::MemoryGraph;
