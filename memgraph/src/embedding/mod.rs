//! Embedding module for semantic search
//!
//! Text is turned into vectors by an [`EmbeddingProvider`]; callers go
//! through the [`EmbeddingGateway`], which caches results per
//! (intent, text). Stored content is embedded with
//! [`EmbeddingIntent::Document`], search queries with
//! [`EmbeddingIntent::Query`].

mod cache;
mod gateway;
mod gemini;
mod hashing;

pub use cache::{cache_key, EmbeddingCache};
pub use gateway::EmbeddingGateway;
pub use gemini::{GeminiConfig, GeminiProvider};
pub use hashing::HashEmbeddingProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Role of the text being embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingIntent {
    /// Text that will be searched for
    Query,
    /// Text that will be stored and searched against
    Document,
}

impl EmbeddingIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Document => "document",
        }
    }
}

impl std::fmt::Display for EmbeddingIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External text-to-vector service
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts` with the given intent at `dimension` width.
    ///
    /// May return fewer vectors than texts, or empty vectors; the gateway
    /// treats both as unavailable.
    async fn embed(
        &self,
        texts: &[&str],
        intent: EmbeddingIntent,
        dimension: usize,
    ) -> Result<Vec<Vec<f32>>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// A provider shared across engines
pub type SharedProvider = Arc<dyn EmbeddingProvider>;
