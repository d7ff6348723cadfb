//! Domain types shared by the segmenter, index, retriever and synthesizer.

use serde::{Deserialize, Serialize};

pub type ChunkId = u64;
pub type EmbeddingVector = Vec<f32>;

/// A segment of source text that is independently embedded and retrieved.
///
/// - `id`: unique within one index, consecutive in document order
/// - `text`: the payload, trimmed of surrounding whitespace
/// - `source_offset`: byte offset of `text` inside its source document
/// - `source`: name of the source document, when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source_offset: Option<usize>,
    pub source: Option<String>,
}

/// Plain text of one document, ready for segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    pub name: String,
    pub text: String,
}

impl DocumentText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// A retrieved chunk with its cosine similarity to the query. Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks ordered most-similar first, at most `k` of them, scoped to one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize { self.hits.len() }
    pub fn is_empty(&self) -> bool { self.hits.is_empty() }
    pub fn ids(&self) -> Vec<ChunkId> { self.hits.iter().map(|h| h.chunk.id).collect() }
    pub fn texts(&self) -> Vec<String> { self.hits.iter().map(|h| h.chunk.text.clone()).collect() }
}

/// Input to answer synthesis: ordered context passages plus the user question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub context: Vec<String>,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub text: String,
}

/// Sampling knobs forwarded to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self { temperature: 0.3, max_tokens: None }
    }
}
