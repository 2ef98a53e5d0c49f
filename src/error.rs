//! Error types for vibe-memory

use thiserror::Error;

/// Result type alias for vibe-memory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vibe-memory
#[derive(Error, Debug)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vector database error: {0}")]
    VectorDb(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection mismatch: {0}")]
    CollectionMismatch(String),
}

impl Error {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn vector_db(msg: impl Into<String>) -> Self {
        Self::VectorDb(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn collection_mismatch(msg: impl Into<String>) -> Self {
        Self::CollectionMismatch(msg.into())
    }

    /// Misconfiguration: fatal during bootstrap.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DimensionMismatch { .. } | Self::CollectionMismatch(_)
        )
    }

    /// A failed round trip to an embedding, index, or chat provider.
    pub fn is_provider(&self) -> bool {
        !self.is_config()
    }
}
