use thiserror::Error;

/// Every failure the pipeline can surface.
///
/// User/state errors (`NoDocuments`, `EmptyIndex`, `IndexNotFound`, `InvalidInput`) carry
/// actionable messages and are never retried. Service errors (`EmbeddingService`,
/// `GenerationService`, `DimensionMismatch`) abort the current request and may be retried by
/// the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not extract text from '{document}': {reason}")]
    Extraction { document: String, reason: String },

    #[error("No documents provided; upload at least one document")]
    NoDocuments,

    #[error("No documents indexed; the index contains zero chunks")]
    EmptyIndex,

    #[error("Index '{0}' not found; please ingest documents first")]
    IndexNotFound(String),

    #[error("Embedding service failed: {0}")]
    EmbeddingService(String),

    #[error("Generation service failed: {0}")]
    GenerationService(String),

    #[error("Embedding dimension mismatch: index has {index}, embedder produces {query}")]
    DimensionMismatch { index: usize, query: usize },

    #[error("Index storage failed: {0}")]
    Storage(String),
}

impl Error {
    /// True for failures of an external dependency, which a caller may retry with backoff.
    pub fn is_service_error(&self) -> bool {
        matches!(self, Error::EmbeddingService(_) | Error::GenerationService(_) | Error::DimensionMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
