//! Offline feature-hashing embeddings
//!
//! Each lower-cased alphanumeric token is hashed into one of `dimension`
//! buckets with a hash-derived sign, and the result is L2-normalised. Texts
//! sharing words land close together, identical texts get identical vectors.
//! Query and document intents embed the same way.

use async_trait::async_trait;

use super::{EmbeddingIntent, EmbeddingProvider};
use crate::error::Result;

/// Deterministic provider for tests and offline use
#[derive(Debug, Clone, Default)]
pub struct HashEmbeddingProvider;

impl HashEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }

    /// Embed a single text at `dimension` width
    pub fn embed_text(text: &str, dimension: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dimension];
        if dimension == 0 {
            return vector;
        }

        for token in tokenize(text) {
            let hash = djb2(&token);
            let slot = (hash % dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(
        &self,
        texts: &[&str],
        _intent: EmbeddingIntent,
        dimension: usize,
    ) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| Self::embed_text(text, dimension))
            .collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn djb2(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    // Spread low-entropy short tokens across the high bits used for the sign
    hash ^ hash.rotate_left(29)
}
