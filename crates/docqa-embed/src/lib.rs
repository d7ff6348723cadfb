use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

use docqa_core::config::{EmbeddingSettings, Provider};
use docqa_core::traits::Embedder;
use docqa_core::types::EmbeddingVector;
use docqa_core::Result;

pub mod remote;

pub use remote::RemoteEmbedder;

/// Deterministic feature-hashing embedder for tests and offline development.
///
/// Tokens are lower-cased alphanumeric runs; each token adds 1.0 to bucket
/// `xxh64(token) % dim`. Output is L2-normalized, so cosine similarity reflects shared
/// vocabulary.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:d{}", dim) }
    }

    pub fn embed_text(&self, text: &str) -> EmbeddingVector {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Select the embedder described by `settings`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the `FakeEmbedder` regardless of the configured provider.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake || settings.provider == Provider::Fake {
        tracing::info!(dim = settings.dimension, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.dimension)));
    }
    let embedder = RemoteEmbedder::from_settings(settings)?;
    tracing::info!(model = %settings.model, base_url = %settings.base_url, dim = settings.dimension, "using remote embedder");
    Ok(Arc::new(embedder))
}
