use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EmbeddingVector, SamplingParams};

/// Maps texts to fixed-dimension vectors.
///
/// Implementations return exactly one vector of length `dim()` per input, in input order, and
/// report failures as `Error::EmbeddingService`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `fake:xxh64:d256`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;
}

/// Text generation behind a request/response contract. Failures are `Error::GenerationService`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String>;
}

/// Turns the raw bytes of an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, name: &str, content: &[u8]) -> Result<String>;
}
