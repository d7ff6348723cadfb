//! Ingestion and question answering over one named index.
//!
//! Ingestion: documents → segmenter → `VectorIndex::build` → `IndexStore::persist`.
//! Query: cached or loaded index → `Retriever` → `AnswerSynthesizer`.
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use docqa_core::config::Settings;
use docqa_core::extract::{extract_documents, SourceDocument};
use docqa_core::segmenter::Segmenter;
use docqa_core::traits::{Embedder, LanguageModel, TextExtractor};
use docqa_core::types::{AnswerRequest, DocumentText, RetrievalResult};
use docqa_core::{Error, Result};
use docqa_embed::get_default_embedder;
use docqa_llm::get_default_language_model;
use docqa_vector::{BuildOptions, IndexManifest, IndexStore, VectorIndex};

use crate::retriever::Retriever;
use crate::synthesizer::AnswerSynthesizer;

/// Outcome of one ingestion.
#[derive(Debug)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Documents that were skipped because their text could not be extracted.
    pub failures: Vec<Error>,
    pub manifest: IndexManifest,
}

/// An answer together with the passages it was generated from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: RetrievalResult,
}

pub struct Pipeline {
    segmenter: Segmenter,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    store: IndexStore,
    index_name: String,
    build_options: BuildOptions,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    cached: RwLock<Option<Arc<VectorIndex>>>,
}

impl Pipeline {
    /// Wire providers and storage from `settings`; a relative `data.index_dir` resolves
    /// against `base`.
    pub async fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        settings.validate()?;
        let embedder = get_default_embedder(&settings.embedding)?;
        let model = get_default_language_model(&settings.generation)?;
        let store = IndexStore::open(settings.index_dir(base)).await?;
        Self::new(settings, embedder, model, store)
    }

    pub fn new(settings: &Settings, embedder: Arc<dyn Embedder>, model: Arc<dyn LanguageModel>, store: IndexStore) -> Result<Self> {
        let segmenter = Segmenter::new(settings.segmenter.chunk_size, settings.segmenter.chunk_overlap)?;
        Ok(Self {
            segmenter,
            retriever: Retriever::new(settings.retrieval.top_k).with_deadline(Some(settings.embedding.timeout())),
            synthesizer: AnswerSynthesizer::from_settings(&settings.generation),
            build_options: BuildOptions::from_settings(&settings.embedding),
            index_name: settings.data.index_name.clone(),
            embedder,
            model,
            store,
            cached: RwLock::new(None),
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.build_options = self.build_options.with_progress(progress);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: AnswerSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn index_name(&self) -> &str { &self.index_name }
    pub fn store(&self) -> &IndexStore { &self.store }

    /// Rebuild the index from raw document texts. Documents are named `document-<n>`.
    pub async fn ingest(&self, texts: Vec<String>) -> Result<IngestReport> {
        let docs = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| DocumentText::new(format!("document-{}", i + 1), text))
            .collect();
        self.ingest_texts(docs).await
    }

    /// Extract text from uploaded files and rebuild the index from the ones that succeed.
    pub async fn ingest_documents(&self, docs: &[SourceDocument], extractor: &dyn TextExtractor) -> Result<IngestReport> {
        if docs.is_empty() {
            return Err(Error::NoDocuments);
        }
        let extracted = extract_documents(docs, extractor);
        if extracted.documents.is_empty() {
            return Err(extracted.failures.into_iter().next().unwrap_or(Error::NoDocuments));
        }
        let mut report = self.ingest_texts(extracted.documents).await?;
        report.failures = extracted.failures;
        Ok(report)
    }

    /// Segment `docs`, embed every chunk and replace the persisted index.
    ///
    /// Holds the index lock exclusively for build and persist. On failure the previously
    /// persisted index stays active.
    pub async fn ingest_texts(&self, docs: Vec<DocumentText>) -> Result<IngestReport> {
        if docs.is_empty() {
            return Err(Error::NoDocuments);
        }
        let started = Instant::now();
        let chunks = self.segmenter.segment_documents(&docs);
        tracing::info!(documents = docs.len(), chunks = chunks.len(), "segmented documents");

        let mut cached = self.cached.write().await;
        let index = VectorIndex::build(chunks, self.embedder.as_ref(), &self.build_options).await?;
        let manifest = self.store.persist(&self.index_name, &index).await?;
        *cached = None;
        drop(cached);

        tracing::info!(
            index = %self.index_name,
            chunks = manifest.chunk_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingestion complete"
        );
        Ok(IngestReport { documents: docs.len(), chunks: manifest.chunk_count, failures: Vec::new(), manifest })
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        Ok(self.answer_detailed(question).await?.text)
    }

    /// Answer `question` from the top-k passages of the persisted index.
    pub async fn answer_detailed(&self, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }
        let started = Instant::now();
        let index = self.current_index().await?;
        let sources = self.retriever.retrieve(question, &index, self.embedder.as_ref()).await?;
        let request = AnswerRequest { context: sources.texts(), question: question.to_string() };
        let response = self.synthesizer.synthesize(&request, self.model.as_ref()).await?;
        tracing::info!(
            passages = sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered question"
        );
        Ok(Answer { text: response.text, sources })
    }

    /// Manifest of the active index, if one was ever persisted.
    pub async fn status(&self) -> Result<Option<IndexManifest>> {
        self.store.manifest(&self.index_name).await
    }

    async fn current_index(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }
        let mut cached = self.cached.write().await;
        if let Some(index) = cached.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(self.store.load(&self.index_name, Some(self.embedder.dim())).await?);
        if index.embedder_id() != self.embedder.embedder_id() {
            tracing::warn!(
                stored = index.embedder_id(),
                current = self.embedder.embedder_id(),
                "index was built with a different embedder; similarity scores may be meaningless"
            );
        }
        *cached = Some(Arc::clone(&index));
        Ok(index)
    }
}
