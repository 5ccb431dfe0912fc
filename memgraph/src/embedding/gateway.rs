//! Embedding gateway
//!
//! High-level API for generating and caching embeddings.

use std::sync::Arc;
use std::time::Duration;

use super::{cache_key, EmbeddingCache, EmbeddingIntent, EmbeddingProvider};
use crate::error::{MemoryError, Result};

/// Cached access to an [`EmbeddingProvider`] at a fixed dimension
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    dimension: usize,
    ttl: Duration,
}

impl EmbeddingGateway {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        dimension: usize,
        cache_capacity: usize,
        ttl: Duration,
    ) -> Self {
        log::info!(
            "Embedding gateway ready ({}, {}d, cache {} entries)",
            provider.name(),
            dimension,
            cache_capacity
        );
        Self {
            provider,
            cache: EmbeddingCache::new(cache_capacity),
            dimension,
            ttl,
        }
    }

    /// Embed `text` for the given intent, consulting the cache first.
    ///
    /// Fails with `EmbeddingUnavailable` if the provider returns no vector,
    /// an empty vector, or a vector of the wrong width.
    pub async fn embed(&self, text: &str, intent: EmbeddingIntent) -> Result<Vec<f32>> {
        let key = cache_key(intent, text);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let vector = self
            .provider
            .embed(&[text], intent, self.dimension)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                MemoryError::embedding_unavailable(format!(
                    "{} returned no embeddings",
                    self.provider.name()
                ))
            })?;

        if vector.is_empty() {
            return Err(MemoryError::embedding_unavailable(format!(
                "{} returned an empty embedding",
                self.provider.name()
            )));
        }
        if vector.len() != self.dimension {
            return Err(MemoryError::embedding_unavailable(format!(
                "{} returned {} dimensions, expected {}",
                self.provider.name(),
                vector.len(),
                self.dimension
            )));
        }

        self.cache.set(key, vector.clone(), self.ttl);
        Ok(vector)
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}
