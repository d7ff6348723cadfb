//! docqa-rag
//!
//! Retrieval-augmented question answering: the `Retriever`, the `AnswerSynthesizer` and the
//! `Pipeline` that ties ingestion and querying to one persisted index.
pub mod pipeline;
pub mod retriever;
pub mod synthesizer;

pub use pipeline::{Answer, IngestReport, Pipeline};
pub use retriever::Retriever;
pub use synthesizer::{AnswerSynthesizer, DEFAULT_TEMPLATE};
