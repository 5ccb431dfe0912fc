//! Gemini embeddings API client
//!
//! Uses `batchEmbedContents`, mapping query intent to `RETRIEVAL_QUERY` and
//! document intent to `RETRIEVAL_DOCUMENT`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingIntent, EmbeddingProvider};
use crate::error::{MemoryError, Result};

/// Configuration for the Gemini embeddings API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Model to use for embeddings.
    pub model: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-embedding-001".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create config from `GEMINI_API_KEY`, with `MEMGRAPH_EMBEDDING_MODEL`
    /// and `MEMGRAPH_EMBEDDING_URL` as optional overrides.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| MemoryError::config("GEMINI_API_KEY environment variable not set"))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("MEMGRAPH_EMBEDDING_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("MEMGRAPH_EMBEDDING_URL") {
            config.base_url = url;
        }
        Ok(config)
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Gemini embeddings client.
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Create from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn batch_url(&self) -> String {
        format!(
            "{}/models/{}:batchEmbedContents",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

fn task_type(intent: EmbeddingIntent) -> &'static str {
    match intent {
        EmbeddingIntent::Query => "RETRIEVAL_QUERY",
        EmbeddingIntent::Document => "RETRIEVAL_DOCUMENT",
    }
}

fn build_request(
    model: &str,
    texts: &[&str],
    intent: EmbeddingIntent,
    dimension: usize,
) -> BatchRequest {
    BatchRequest {
        requests: texts
            .iter()
            .map(|text| EmbedRequest {
                model: format!("models/{}", model),
                content: Content {
                    parts: vec![Part {
                        text: text.to_string(),
                    }],
                },
                task_type: task_type(intent),
                output_dimensionality: dimension,
            })
            .collect(),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed(
        &self,
        texts: &[&str],
        intent: EmbeddingIntent,
        dimension: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let request = build_request(&self.config.model, texts, intent, dimension);

        let response = self
            .client
            .post(self.batch_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::embedding_unavailable(format!(
                "Embedding request failed: HTTP {} - {}",
                status, body
            )));
        }

        let result: BatchResponse = response.json().await?;
        Ok(result.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct BatchRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request =
            build_request("gemini-embedding-001", &["hello"], EmbeddingIntent::Query, 256);
        let json = serde_json::to_value(&request).unwrap();

        let first = &json["requests"][0];
        assert_eq!(first["model"], "models/gemini-embedding-001");
        assert_eq!(first["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(first["outputDimensionality"], 256);
        assert_eq!(first["content"]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_document_intent_task_type() {
        assert_eq!(task_type(EmbeddingIntent::Document), "RETRIEVAL_DOCUMENT");
    }

    #[test]
    fn test_response_without_embeddings() {
        let parsed: BatchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.embeddings.is_empty());

        let parsed: BatchResponse =
            serde_json::from_str(r#"{"embeddings":[{"values":[0.1,0.2]}]}"#).unwrap();
        assert_eq!(parsed.embeddings[0].values, vec![0.1, 0.2]);
    }

    #[test]
    fn test_batch_url() {
        let provider = GeminiProvider::new(
            GeminiConfig::new("key").with_base_url("http://localhost:9999/v1beta/"),
        )
        .unwrap();
        assert_eq!(
            provider.batch_url(),
            "http://localhost:9999/v1beta/models/gemini-embedding-001:batchEmbedContents"
        );
    }
}
