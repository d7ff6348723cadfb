use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use docqa_core::segmenter::Segmenter;
use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, DocumentText, EmbeddingVector};
use docqa_core::{Error, Result};
use docqa_embed::FakeEmbedder;
use docqa_vector::{BuildOptions, IndexStore, VectorIndex};

/// Maps every text to the same vector, so every chunk ties.
struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    fn embedder_id(&self) -> &str { "constant" }
    fn dim(&self) -> usize { 2 }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Fails the n-th call.
struct FlakyEmbedder {
    inner: FakeEmbedder,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(Error::EmbeddingService("503 service unavailable".into()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// Returns one vector fewer than asked for.
struct ShortEmbedder;

#[async_trait]
impl Embedder for ShortEmbedder {
    fn embedder_id(&self) -> &str { "short" }
    fn dim(&self) -> usize { 2 }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().skip(1).map(|_| vec![0.0, 1.0]).collect())
    }
}

struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    fn embedder_id(&self) -> &str { "slow" }
    fn dim(&self) -> usize { 2 }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(texts.iter().map(|_| vec![1.0, 1.0]).collect())
    }
}

fn corpus() -> Vec<Chunk> {
    let docs = vec![
        DocumentText::new("fire.txt", "Keep the fire small.\n\nBank the coals before sleeping so the fire lasts the night."),
        DocumentText::new("water.txt", "Boil water for one minute.\n\nFilter cloudy water through cloth before boiling."),
        DocumentText::new("food.txt", "Store grain in sealed jars.\n\nDry meat in thin strips over a smoky fire."),
    ];
    Segmenter::new(60, 10).expect("segmenter").segment_documents(&docs)
}

fn small_batches() -> BuildOptions {
    BuildOptions { batch_size: 2, concurrency: 3, ..BuildOptions::default() }
}

#[tokio::test]
async fn persisted_index_searches_like_in_memory() {
    let embedder = FakeEmbedder::new(256);
    let chunks = corpus();
    let index = VectorIndex::build(chunks.clone(), &embedder, &small_batches()).await.expect("build");
    assert_eq!(index.len(), chunks.len());

    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path()).await.expect("store");
    let manifest = store.persist("survival", &index).await.expect("persist");
    assert_eq!(manifest.chunk_count, chunks.len());
    assert_eq!(manifest.dim, 256);
    assert_eq!(manifest.embedder_id, embedder.embedder_id());

    let loaded = store.load("survival", Some(256)).await.expect("load");
    assert_eq!(loaded.fingerprint(), index.fingerprint());
    assert_eq!(loaded.chunks().cloned().collect::<Vec<_>>(), chunks);

    for question in ["how do I keep a fire going", "clean water", "storing food"] {
        let q = embedder.embed_text(question);
        let mem = index.search(&q, 3).expect("search");
        let disk = loaded.search(&q, 3).expect("search");
        assert_eq!(mem, disk, "results differ for {question:?}");
    }
}

#[tokio::test]
async fn batches_are_reassembled_by_chunk_id() {
    let embedder = FakeEmbedder::new(128);
    let chunks = corpus();
    let serial = BuildOptions { batch_size: 1, concurrency: 1, ..BuildOptions::default() };
    let wide = BuildOptions { batch_size: 1, concurrency: 8, ..BuildOptions::default() };
    let a = VectorIndex::build(chunks.clone(), &embedder, &serial).await.expect("build");
    let b = VectorIndex::build(chunks.clone(), &embedder, &wide).await.expect("build");
    for (chunk, vector) in b.entries() {
        assert_eq!(vector, embedder.embed_text(&chunk.text).as_slice());
    }
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[tokio::test]
async fn fewer_chunks_than_k_returns_all_with_ties_by_id() {
    let chunks: Vec<Chunk> = (0..3u64)
        .rev()
        .map(|id| Chunk { id, text: format!("chunk {id}"), source_offset: None, source: None })
        .collect();
    let index = VectorIndex::build(chunks, &ConstantEmbedder, &BuildOptions::default()).await.expect("build");
    let res = index.search(&[1.0, 0.0], 10).expect("search");
    assert_eq!(res.ids(), vec![0, 1, 2]);
}

#[tokio::test]
async fn load_rejects_a_different_embedding_width() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path()).await.expect("store");
    let index = VectorIndex::build(corpus(), &FakeEmbedder::new(64), &BuildOptions::default()).await.expect("build");
    store.persist("docs", &index).await.expect("persist");

    let err = store.load("docs", Some(32)).await.expect_err("mismatch");
    assert!(matches!(err, Error::DimensionMismatch { index: 64, query: 32 }), "{err:?}");
    assert!(store.load("docs", None).await.is_ok());
}

#[tokio::test]
async fn unknown_name_is_not_found() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path()).await.expect("store");
    assert!(matches!(store.load("faiss_index", None).await, Err(Error::IndexNotFound(_))));
    assert!(store.manifest("faiss_index").await.expect("manifest").is_none());
}

#[tokio::test]
async fn failed_builds_abort_with_embedding_errors() {
    let flaky = FlakyEmbedder { inner: FakeEmbedder::new(32), calls: AtomicUsize::new(0), fail_on: 1 };
    let err = VectorIndex::build(corpus(), &flaky, &small_batches()).await.expect_err("flaky");
    assert!(matches!(err, Error::EmbeddingService(_)));

    let err = VectorIndex::build(corpus(), &ShortEmbedder, &small_batches()).await.expect_err("short");
    assert!(matches!(err, Error::EmbeddingService(_)));

    let opts = BuildOptions { timeout: Some(Duration::from_millis(50)), ..BuildOptions::default() };
    let err = VectorIndex::build(corpus(), &SlowEmbedder, &opts).await.expect_err("slow");
    assert!(matches!(err, Error::EmbeddingService(_)));
}

#[tokio::test]
async fn persist_replaces_the_previous_version() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path()).await.expect("store");
    let embedder = FakeEmbedder::new(64);

    let first = VectorIndex::build(corpus(), &embedder, &BuildOptions::default()).await.expect("build");
    let m1 = store.persist("docs", &first).await.expect("persist");

    let only = vec![Chunk { id: 0, text: "A single replacement chunk.".into(), source_offset: Some(0), source: None }];
    let second = VectorIndex::build(only.clone(), &embedder, &BuildOptions::default()).await.expect("build");
    let m2 = store.persist("docs", &second).await.expect("persist");

    assert_ne!(m1.table, m2.table);
    assert!(!tmp.path().join(format!("{}.lance", m1.table)).exists(), "old version removed");
    let loaded = store.load("docs", Some(64)).await.expect("load");
    assert_eq!(loaded.chunks().cloned().collect::<Vec<_>>(), only);
}

#[tokio::test]
async fn empty_index_round_trips() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path()).await.expect("store");
    let empty = VectorIndex::build(Vec::new(), &FakeEmbedder::new(16), &BuildOptions::default()).await.expect("build");
    store.persist("empty", &empty).await.expect("persist");
    let loaded = store.load("empty", Some(16)).await.expect("load");
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn corrupt_manifest_does_not_block_a_rebuild() {
    let tmp = TempDir::new().expect("tmp");
    let store = IndexStore::open(tmp.path()).await.expect("store");
    let conn = docqa_vector::table::open_db(tmp.path().to_string_lossy().as_ref()).await.expect("db");
    docqa_vector::table::set_meta(&conn, docqa_vector::MANIFEST_TABLE, "docs", "{not json").await.expect("set");
    assert!(matches!(store.manifest("docs").await, Err(Error::Storage(_))));

    let index = VectorIndex::build(corpus(), &FakeEmbedder::new(32), &BuildOptions::default()).await.expect("build");
    let manifest = store.persist("docs", &index).await.expect("persist");
    assert_eq!(store.manifest("docs").await.expect("manifest"), Some(manifest));
    assert_eq!(store.load("docs", Some(32)).await.expect("load").len(), index.len());
}
