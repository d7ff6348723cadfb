//! docqa-core
//!
//! Domain types, the error taxonomy, collaborator traits, configuration and the text
//! segmenter shared by every other crate in the workspace.
pub mod config;
pub mod error;
pub mod extract;
pub mod segmenter;
pub mod service;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
