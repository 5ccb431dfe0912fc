//! Bounded embedding cache with per-entry expiry

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use super::EmbeddingIntent;

/// Cache key for an (intent, text) pair
pub fn cache_key(intent: EmbeddingIntent, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(intent.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("embedding_{:x}", hasher.finalize())
}

#[derive(Clone)]
struct CachedEmbedding {
    vector: Vec<f32>,
    expires_at: Instant,
}

/// LRU of embeddings; entries past their TTL read as absent
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, CachedEmbedding>>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached vector for `key`, if present and not expired
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.vector.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Store `vector` under `key` for `ttl`
    pub fn set(&self, key: String, vector: Vec<f32>, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .put(key, CachedEmbedding { vector, expires_at });
    }

    /// Get cache size
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
