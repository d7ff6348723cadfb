//! Named, versioned persistence of `VectorIndex` values in LanceDB.
//!
//! Every persist writes a fresh table `<name>-<millis>-<fingerprint8>` and then flips the
//! manifest for `<name>` in the `index_manifests` meta table. Readers follow the manifest, so
//! a build that fails before the flip leaves the previous version active. Superseded tables
//! are removed after the flip.
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::ArrowError;
use chrono::Utc;
use lancedb::query::ExecutableQuery;
use lancedb::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use docqa_core::types::{Chunk, EmbeddingVector};
use docqa_core::{Error, Result};

use crate::index::VectorIndex;
use crate::schema::build_chunk_schema;
use crate::table::{get_meta, open_db, set_meta, storage, table_exists};

pub const MANIFEST_TABLE: &str = "index_manifests";

/// What the meta table records about the active version of one named index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub name: String,
    pub table: String,
    pub dim: usize,
    pub embedder_id: String,
    pub chunk_count: usize,
    pub fingerprint: String,
    /// Milliseconds since the Unix epoch.
    pub built_at: i64,
}

pub struct IndexStore {
    root: PathBuf,
    conn: Connection,
}

impl IndexStore {
    /// Open (creating if needed) the database directory at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(storage)?;
        let conn = open_db(root.to_string_lossy().as_ref()).await?;
        Ok(Self { root, conn })
    }

    pub fn root(&self) -> &Path { &self.root }

    pub async fn manifest(&self, name: &str) -> Result<Option<IndexManifest>> {
        validate_name(name)?;
        match get_meta(&self.conn, MANIFEST_TABLE, name).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| Error::Storage(format!("corrupt manifest for '{}': {}", name, e))),
            None => Ok(None),
        }
    }

    /// Store `index` under `name`, replacing whatever was stored there before.
    pub async fn persist(&self, name: &str, index: &VectorIndex) -> Result<IndexManifest> {
        validate_name(name)?;
        let started = Instant::now();
        let fingerprint = index.fingerprint();
        let built_at = Utc::now().timestamp_millis();
        let table = self.fresh_table_name(name, built_at, &fingerprint).await?;

        let schema = build_chunk_schema(index.dim());
        let batches: Vec<std::result::Result<RecordBatch, ArrowError>> =
            if index.is_empty() { Vec::new() } else { vec![Ok(index_to_record_batch(index)?)] };
        let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
        if let Err(e) = self.conn.create_table(&table, reader).execute().await {
            self.remove_table_dir(&table);
            return Err(storage(e));
        }

        let manifest = IndexManifest {
            name: name.to_string(),
            table: table.clone(),
            dim: index.dim(),
            embedder_id: index.embedder_id().to_string(),
            chunk_count: index.len(),
            fingerprint,
            built_at,
        };
        let previous = match self.manifest(name).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(index = name, error = %e, "previous manifest unreadable; its table will not be removed");
                None
            }
        };
        let json = serde_json::to_string(&manifest).map_err(storage)?;
        if let Err(e) = set_meta(&self.conn, MANIFEST_TABLE, name, &json).await {
            self.remove_table_dir(&table);
            return Err(e);
        }
        if let Some(old) = previous.filter(|m| m.table != table) {
            self.remove_table_dir(&old.table);
        }
        tracing::info!(
            index = name,
            table = %table,
            chunks = manifest.chunk_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "persisted index"
        );
        Ok(manifest)
    }

    /// Load the active version of `name`.
    ///
    /// With `expected_dim` set, a stored dimension that differs fails with `DimensionMismatch`
    /// before any vectors are read.
    pub async fn load(&self, name: &str, expected_dim: Option<usize>) -> Result<VectorIndex> {
        let manifest = self.manifest(name).await?.ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        if let Some(query) = expected_dim.filter(|d| *d != manifest.dim) {
            return Err(Error::DimensionMismatch { index: manifest.dim, query });
        }
        if !table_exists(&self.conn, &manifest.table).await? {
            return Err(Error::Storage(format!("table '{}' for index '{}' is missing", manifest.table, name)));
        }
        let t = self.conn.open_table(&manifest.table).execute().await.map_err(storage)?;
        let mut stream = t.query().execute().await.map_err(storage)?;
        let mut parts = Vec::with_capacity(manifest.chunk_count);
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(storage)? {
            parts.extend(record_batch_to_parts(&batch, manifest.dim)?);
        }
        let index = VectorIndex::from_parts(manifest.dim, manifest.embedder_id.clone(), parts)
            .map_err(|e| Error::Storage(e.to_string()))?;
        if index.len() != manifest.chunk_count || index.fingerprint() != manifest.fingerprint {
            return Err(Error::Storage(format!(
                "index '{}' does not match its manifest ({} of {} chunks)",
                name,
                index.len(),
                manifest.chunk_count
            )));
        }
        tracing::debug!(index = name, chunks = index.len(), "loaded index");
        Ok(index)
    }

    async fn fresh_table_name(&self, name: &str, built_at: i64, fingerprint: &str) -> Result<String> {
        let base = format!("{}-{}-{}", name, built_at, &fingerprint[..8]);
        let mut candidate = base.clone();
        let mut n = 1;
        while table_exists(&self.conn, &candidate).await? {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        Ok(candidate)
    }

    fn remove_table_dir(&self, table: &str) {
        let dir = self.root.join(format!("{}.lance", table));
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                tracing::warn!(path = %dir.display(), error = %e, "could not remove index table");
            }
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(Error::InvalidInput(format!("index name '{}' may only contain A-Z, a-z, 0-9, '_' and '-'", name)));
    }
    Ok(())
}

fn index_to_record_batch(index: &VectorIndex) -> Result<RecordBatch> {
    let dim = index.dim();
    let mut ids = Vec::with_capacity(index.len());
    let mut texts = Vec::with_capacity(index.len());
    let mut sources = Vec::with_capacity(index.len());
    let mut offsets = Vec::with_capacity(index.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(index.len());
    for (chunk, vector) in index.entries() {
        ids.push(chunk.id as i64);
        texts.push(chunk.text.clone());
        sources.push(chunk.source.clone());
        offsets.push(chunk.source_offset.map(|o| o as i64));
        vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
    }
    RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(sources)),
            Arc::new(Int64Array::from(offsets)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim as i32)),
        ],
    )
    .map_err(storage)
}

fn record_batch_to_parts(batch: &RecordBatch, dim: usize) -> Result<Vec<(Chunk, EmbeddingVector)>> {
    let missing = |col: &str| Error::Storage(format!("column '{}' missing or mistyped", col));
    let ids = batch.column_by_name("id").and_then(|c| c.as_any().downcast_ref::<Int64Array>()).ok_or_else(|| missing("id"))?;
    let texts = batch.column_by_name("text").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| missing("text"))?;
    let sources = batch.column_by_name("source").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| missing("source"))?;
    let offsets = batch
        .column_by_name("source_offset")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| missing("source_offset"))?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| missing("vector"))?;

    let mut parts = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let inner = vectors.value(i);
        let vector = inner.as_primitive::<Float32Type>().values().to_vec();
        if vector.len() != dim {
            return Err(Error::Storage(format!("row {} has {} dimensions, manifest says {}", i, vector.len(), dim)));
        }
        let chunk = Chunk {
            id: ids.value(i) as u64,
            text: texts.value(i).to_string(),
            source: (!sources.is_null(i)).then(|| sources.value(i).to_string()),
            source_offset: (!offsets.is_null(i)).then(|| offsets.value(i) as usize),
        };
        parts.push((chunk, vector));
    }
    Ok(parts)
}
