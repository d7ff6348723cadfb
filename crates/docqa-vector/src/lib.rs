//! docqa-vector
//!
//! The in-memory `VectorIndex` (cosine k-NN over chunk embeddings) and `IndexStore`, which
//! persists indices by name in a local LanceDB database.
pub mod index;
pub mod schema;
pub mod store;
pub mod table;

pub use index::{BuildOptions, VectorIndex};
pub use store::{IndexManifest, IndexStore, MANIFEST_TABLE};
