pub mod types;
pub mod store;
pub mod lexical;
pub mod embedding;
pub mod cache;
pub mod resolver;

pub use cache::IndexCache;
pub use embedding::{EmbeddingIndex, EmbeddingModel, HashingEmbedder};
pub use lexical::LexicalIndex;
pub use resolver::{resolve, GroundingReport, GroundingResolver};
pub use store::FragmentStore;
pub use types::{Match, SimilarityIndex};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroundingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Embedding model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Embedding model initialization: {0}")]
    ModelInit(String),

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
