//! In-memory vector index: chunk vectors plus their text, searched by cosine similarity.
use futures::{StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use docqa_core::config::EmbeddingSettings;
use docqa_core::service::{with_timeout, ServiceKind};
use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, ChunkId, EmbeddingVector, RetrievalResult, ScoredChunk};
use docqa_core::{Error, Result};

/// How chunk embeddings are requested during a build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub batch_size: usize,
    /// Batches in flight at once.
    pub concurrency: usize,
    pub timeout: Option<Duration>,
    pub progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { batch_size: 100, concurrency: 4, timeout: None, progress: false }
    }
}

impl BuildOptions {
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            concurrency: settings.concurrency.max(1),
            timeout: Some(settings.timeout()),
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

#[derive(Debug, Clone)]
struct Entry {
    chunk: Chunk,
    vector: EmbeddingVector,
    norm: f32,
}

/// Entries are kept sorted by chunk id.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dim: usize,
    embedder_id: String,
    entries: Vec<Entry>,
}

impl VectorIndex {
    /// Assemble an index from already-embedded chunks.
    pub fn from_parts(dim: usize, embedder_id: impl Into<String>, parts: Vec<(Chunk, EmbeddingVector)>) -> Result<Self> {
        let mut entries = Vec::with_capacity(parts.len());
        for (chunk, vector) in parts {
            if vector.len() != dim {
                return Err(Error::InvalidInput(format!(
                    "chunk {} has a {}-dimensional vector, index expects {}",
                    chunk.id,
                    vector.len(),
                    dim
                )));
            }
            let norm = l2_norm(&vector);
            entries.push(Entry { chunk, vector, norm });
        }
        entries.sort_by_key(|e| e.chunk.id);
        if let Some(w) = entries.windows(2).find(|w| w[0].chunk.id == w[1].chunk.id) {
            return Err(Error::InvalidInput(format!("duplicate chunk id {}", w[0].chunk.id)));
        }
        Ok(Self { dim, embedder_id: embedder_id.into(), entries })
    }

    /// Embed every chunk and assemble the index.
    ///
    /// Batches run concurrently and are matched back to their chunks by id. Any failed batch,
    /// short response or wrong-width vector aborts the whole build.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder, options: &BuildOptions) -> Result<Self> {
        let dim = embedder.dim();
        let mut seen = HashSet::with_capacity(chunks.len());
        if let Some(dup) = chunks.iter().find(|c| !seen.insert(c.id)) {
            return Err(Error::InvalidInput(format!("duplicate chunk id {}", dup.id)));
        }

        let started = Instant::now();
        let batch_size = options.batch_size.max(1);
        let batches: Vec<(Vec<ChunkId>, Vec<String>)> = chunks
            .chunks(batch_size)
            .map(|b| (b.iter().map(|c| c.id).collect(), b.iter().map(|c| c.text.clone()).collect()))
            .collect();
        let batch_count = batches.len();

        let pb = if options.progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let timeout = options.timeout;
        let mut stream = futures::stream::iter(batches)
            .map(move |(ids, texts)| async move {
                let vectors = with_timeout(ServiceKind::Embedding, timeout, embedder.embed_batch(&texts)).await?;
                Ok::<_, Error>((ids, vectors))
            })
            .buffer_unordered(options.concurrency.max(1));

        let mut by_id: BTreeMap<ChunkId, EmbeddingVector> = BTreeMap::new();
        while let Some((ids, vectors)) = stream.try_next().await? {
            if vectors.len() != ids.len() {
                return Err(Error::EmbeddingService(format!(
                    "expected {} embeddings, got {}",
                    ids.len(),
                    vectors.len()
                )));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::EmbeddingService(format!("dim mismatch: got {} expected {}", bad.len(), dim)));
            }
            tracing::debug!(batch = ids.len(), "embedded batch");
            pb.inc(ids.len() as u64);
            by_id.extend(ids.into_iter().zip(vectors));
        }
        pb.finish_and_clear();

        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = by_id
                .remove(&chunk.id)
                .ok_or_else(|| Error::EmbeddingService(format!("no embedding returned for chunk {}", chunk.id)))?;
            parts.push((chunk, vector));
        }
        let index = Self::from_parts(dim, embedder.embedder_id(), parts)?;
        tracing::info!(
            chunks = index.len(),
            batches = batch_count,
            dim,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built vector index"
        );
        Ok(index)
    }

    /// The `k` chunks most similar to `query`, best first; equal scores go to the lower id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { index: self.dim, query: query.len() });
        }
        let q_norm = l2_norm(query);
        let mut scored: Vec<(f32, &Entry)> = self.entries.iter().map(|e| (cosine(query, q_norm, e), e)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.chunk.id.cmp(&b.1.chunk.id)));
        let hits = scored
            .into_iter()
            .take(k)
            .map(|(score, e)| ScoredChunk { chunk: e.chunk.clone(), score })
            .collect();
        Ok(RetrievalResult { hits })
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn dim(&self) -> usize { self.dim }
    pub fn embedder_id(&self) -> &str { &self.embedder_id }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.entries.iter().map(|e| &e.chunk)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Chunk, &[f32])> + '_ {
        self.entries.iter().map(|e| (&e.chunk, e.vector.as_slice()))
    }

    /// Content hash over the dimension and every `(id, text)` pair, in id order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.dim as u64).to_le_bytes());
        for e in &self.entries {
            hasher.update(&e.chunk.id.to_le_bytes());
            hasher.update(&(e.chunk.text.len() as u64).to_le_bytes());
            hasher.update(e.chunk.text.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], q_norm: f32, e: &Entry) -> f32 {
    if q_norm == 0.0 || e.norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(&e.vector).map(|(a, b)| a * b).sum();
    let score = dot / (q_norm * e.norm);
    if score.is_nan() { 0.0 } else { score }
}
