//! Vector index backends for vibe-memory
//!
//! Every backend is a persistent (or, for tests, process-local) set of named
//! collections. A collection's dimension and metric are fixed when it is
//! created; [`VectorIndex::ensure_collection`] refuses to reuse a collection
//! whose schema disagrees with the requested one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, VectorBackend};
use crate::error::{Error, Result};

mod in_memory;
pub mod pinecone;
#[cfg(feature = "lancedb")]
pub mod vector;

pub use in_memory::InMemoryIndex;
pub use pinecone::PineconeIndex;
#[cfg(feature = "lancedb")]
pub use vector::LanceIndex;

/// Similarity metric of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    Dotproduct,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Dotproduct => write!(f, "dotproduct"),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            "dotproduct" => Ok(Metric::Dotproduct),
            other => Err(Error::vector_db(format!("unknown metric '{}'", other))),
        }
    }
}

/// Schema of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, dimension: usize, metric: Metric) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
        }
    }

    /// Fail with `CollectionMismatch` unless `dimension`/`metric` agree with this spec
    pub fn check_existing(&self, dimension: usize, metric: Metric) -> Result<()> {
        if dimension != self.dimension {
            return Err(Error::collection_mismatch(format!(
                "collection '{}' has dimension {}, expected {}",
                self.name, dimension, self.dimension
            )));
        }
        if metric != self.metric {
            return Err(Error::collection_mismatch(format!(
                "collection '{}' uses metric {}, expected {}",
                self.name, metric, self.metric
            )));
        }
        Ok(())
    }
}

/// Whether `ensure_collection` had to create the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Existing,
}

/// Metadata stored next to each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub text: String,
}

/// One `(id, vector, payload)` triple
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: MemoryPayload,
}

/// A nearest-neighbor hit
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    /// Higher is more similar (cosine similarity for cosine collections)
    pub score: f32,
    pub payload: MemoryPayload,
}

/// Abstract vector index.
///
/// All calls are full round trips to the backing store; nothing is cached
/// between calls. `query` returns at most `top_k` matches ordered by
/// descending score. The order among equal scores is backend-defined and
/// must not be relied upon.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of this backend, for logs
    fn provider_name(&self) -> &'static str;

    /// Create the collection if absent. Idempotent.
    ///
    /// Returns `CollectionMismatch` if a collection with this name exists
    /// with a different dimension or metric.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<EnsureOutcome>;

    /// Insert or overwrite records keyed by id
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    /// Nearest neighbors of `vector`
    async fn query(&self, collection: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<QueryMatch>>;
}

/// Open the backend selected by `config.vector_backend`
pub async fn open_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.vector_backend {
        VectorBackend::Pinecone => Ok(Arc::new(PineconeIndex::new(config)?)),
        #[cfg(feature = "lancedb")]
        VectorBackend::LanceDb => Ok(Arc::new(LanceIndex::new(config).await?)),
        #[cfg(not(feature = "lancedb"))]
        VectorBackend::LanceDb => Err(Error::config(
            "the LanceDB backend requires the `lancedb` feature",
        )),
        VectorBackend::InMemory => Ok(Arc::new(InMemoryIndex::new())),
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
