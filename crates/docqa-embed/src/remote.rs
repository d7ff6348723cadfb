//! Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
use async_trait::async_trait;
use serde::Deserialize;

use docqa_core::config::EmbeddingSettings;
use docqa_core::traits::Embedder;
use docqa_core::types::EmbeddingVector;
use docqa_core::{Error, Result};

pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    dim: usize,
    id: String,
}

#[derive(Deserialize)]
struct CreateEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: &str, dim: usize, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            dim,
            id: format!("remote:{}:d{}", model, dim),
        })
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = settings.resolve_api_key()?;
        Self::new(&settings.base_url, &settings.model, &api_key, settings.dimension, settings.timeout())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "input": texts, "model": self.model }))
            .send()
            .await
            .map_err(|e| Error::EmbeddingService(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| Error::EmbeddingService(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::EmbeddingService(format!("HTTP {}: {}", status, body)));
        }
        parse_embeddings(&body, texts.len(), self.dim)
    }
}

/// Decode an embeddings response, restoring input order and checking count and dimension.
pub(crate) fn parse_embeddings(body: &str, expected: usize, dim: usize) -> Result<Vec<EmbeddingVector>> {
    let mut response: CreateEmbeddingResponse =
        serde_json::from_str(body).map_err(|e| Error::EmbeddingService(format!("invalid response: {}", e)))?;
    response.data.sort_by_key(|d| d.index);
    if response.data.len() != expected || response.data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(Error::EmbeddingService(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }
    if let Some(bad) = response.data.iter().find(|d| d.embedding.len() != dim) {
        return Err(Error::EmbeddingService(format!("dim mismatch: got {} expected {}", bad.embedding.len(), dim)));
    }
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}
