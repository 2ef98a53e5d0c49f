//! Memory records and the store that persists them

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::retrieval::RetrievedMemory;
use crate::storage::{CollectionSpec, EnsureOutcome, MemoryPayload, VectorIndex, VectorRecord};

/// Namespace for content-addressed memory ids
const MEMORY_NAMESPACE: Uuid = Uuid::from_u128(0x5c1d_8f4e_2b7a_4e19_9d36_a0f2_c47e_61b8);

/// Stable id for a fact: identical text always maps to the same id,
/// across processes and restarts.
pub fn memory_id(text: &str) -> String {
    Uuid::new_v5(&MEMORY_NAMESPACE, text.as_bytes()).to_string()
}

/// A long-term fact about the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Derived from `text` by [`memory_id`]
    pub id: String,

    /// Unit-length embedding of `text`
    #[serde(skip)]
    pub vector: Vec<f32>,

    /// The fact itself
    pub text: String,
}

impl Memory {
    pub fn new(text: impl Into<String>, vector: Vec<f32>) -> Self {
        let text = text.into();
        Self {
            id: memory_id(&text),
            vector,
            text,
        }
    }

    fn to_record(&self) -> VectorRecord {
        VectorRecord {
            id: self.id.clone(),
            vector: self.vector.clone(),
            payload: MemoryPayload {
                text: self.text.clone(),
            },
        }
    }
}

/// Coordinates the embedder and the vector index for one collection
#[derive(Clone)]
pub struct MemoryStore {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    collection: CollectionSpec,
    top_k: usize,
}

impl MemoryStore {
    /// The collection is named by `config.index_name` with the embedder's
    /// dimension and the configured metric.
    pub fn new(config: &Config, embedder: Embedder, index: Arc<dyn VectorIndex>) -> Self {
        let collection =
            CollectionSpec::new(&config.index_name, embedder.dimensions(), config.metric);
        Self {
            embedder,
            index,
            collection,
            top_k: config.top_k,
        }
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Create the collection if it does not exist yet
    pub async fn ensure_collection(&self) -> Result<EnsureOutcome> {
        self.index.ensure_collection(&self.collection).await
    }

    /// Embed a fact and upsert it. Re-saving identical text overwrites
    /// the existing record.
    pub async fn remember(&self, text: &str) -> Result<Memory> {
        let vector = self.embedder.embed(text).await?;
        let memory = Memory::new(text, vector);

        self.index
            .upsert(&self.collection.name, &[memory.to_record()])
            .await?;

        debug!("Stored memory {} ({} chars)", memory.id, memory.text.len());
        Ok(memory)
    }

    /// The `top_k` memories most similar to `query`, best first
    pub async fn recall(&self, query: &str) -> Result<Vec<RetrievedMemory>> {
        let vector = self.embedder.embed(query).await?;
        let matches = self
            .index
            .query(&self.collection.name, &vector, self.top_k)
            .await?;

        debug!("Recalled {} memories", matches.len());
        Ok(matches.into_iter().map(RetrievedMemory::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic_and_content_addressed() {
        let a = memory_id("User's name is Sam.");
        assert_eq!(a, memory_id("User's name is Sam."));
        assert_ne!(a, memory_id("User's name is Sam"));
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn ids_are_stable_across_releases() {
        // Changing the namespace would orphan every stored memory
        assert_eq!(
            memory_id("Alex enjoys hiking on the weekends."),
            "667c1512-4915-50c8-8854-a2605ebb6204"
        );
        assert_eq!(
            Uuid::parse_str(&memory_id("x")).unwrap().get_version_num(),
            5
        );
    }

    #[test]
    fn new_memory_derives_id_from_text() {
        let memory = Memory::new("Alex is a software developer.", vec![1.0]);
        assert_eq!(memory.id, memory_id("Alex is a software developer."));
    }
}
