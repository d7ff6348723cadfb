//! Question → query embedding → top-k chunks.
use std::time::Duration;

use docqa_core::service::{with_timeout, ServiceKind};
use docqa_core::traits::Embedder;
use docqa_core::types::RetrievalResult;
use docqa_core::{Error, Result};
use docqa_vector::VectorIndex;

#[derive(Debug, Clone)]
pub struct Retriever {
    k: usize,
    timeout: Option<Duration>,
}

impl Retriever {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1), timeout: None }
    }

    pub fn with_deadline(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn k(&self) -> usize { self.k }

    /// Embed `question` with `embedder` and return the `k` nearest chunks of `index`.
    ///
    /// The embedder must produce vectors of the index's dimension.
    pub async fn retrieve(&self, question: &str, index: &VectorIndex, embedder: &dyn Embedder) -> Result<RetrievalResult> {
        if index.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if embedder.dim() != index.dim() {
            return Err(Error::DimensionMismatch { index: index.dim(), query: embedder.dim() });
        }
        let mut vectors = with_timeout(ServiceKind::Embedding, self.timeout, embedder.embed_batch(&[question.to_string()])).await?;
        let query = match (vectors.pop(), vectors.is_empty()) {
            (Some(v), true) => v,
            _ => return Err(Error::EmbeddingService("expected exactly one query embedding".to_string())),
        };
        let result = index.search(&query, self.k)?;
        tracing::debug!(k = self.k, hits = result.len(), top = ?result.hits.first().map(|h| h.score), "retrieved");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::Chunk;
    use docqa_embed::FakeEmbedder;

    fn chunk(id: u64, text: &str) -> Chunk {
        Chunk { id, text: text.to_string(), source_offset: Some(0), source: None }
    }

    async fn index(embedder: &FakeEmbedder) -> VectorIndex {
        let chunks = vec![chunk(0, "Cats are mammals."), chunk(1, "Dogs are mammals too."), chunk(2, "Trout are fish.")];
        VectorIndex::build(chunks, embedder, &Default::default()).await.expect("build")
    }

    #[tokio::test]
    async fn nearest_chunk_comes_first() {
        let embedder = FakeEmbedder::new(1024);
        let idx = index(&embedder).await;
        let res = Retriever::new(2).retrieve("What are cats?", &idx, &embedder).await.expect("retrieve");
        assert_eq!(res.len(), 2);
        assert_eq!(res.hits[0].chunk.text, "Cats are mammals.");
    }

    #[tokio::test]
    async fn empty_index_is_reported() {
        let embedder = FakeEmbedder::new(8);
        let idx = VectorIndex::from_parts(8, "fake", Vec::new()).expect("index");
        let err = Retriever::new(4).retrieve("anything", &idx, &embedder).await.expect_err("empty");
        assert!(matches!(err, Error::EmptyIndex));
    }

    #[tokio::test]
    async fn query_embedder_must_match_index_width() {
        let idx = index(&FakeEmbedder::new(1024)).await;
        let err = Retriever::new(4).retrieve("cats", &idx, &FakeEmbedder::new(512)).await.expect_err("mismatch");
        assert!(matches!(err, Error::DimensionMismatch { index: 1024, query: 512 }));
    }
}
