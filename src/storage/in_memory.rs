//! Process-local vector index with brute-force similarity search.
//!
//! Data is lost when the process exits. Used by tests and by
//! `VIBE_VECTOR_BACKEND=memory`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    cosine_similarity, CollectionSpec, EnsureOutcome, Metric, QueryMatch, VectorIndex,
    VectorRecord,
};
use crate::error::{Error, Result};

#[derive(Default, Clone)]
pub struct InMemoryIndex {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

struct Collection {
    dimension: usize,
    metric: Metric,
    records: HashMap<String, VectorRecord>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection` (0 if absent)
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.records.len())
            .unwrap_or(0)
    }

    /// Whether `collection` is absent or has no records
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Payload texts currently stored in `collection`, sorted
    pub async fn texts(&self, collection: &str) -> Vec<String> {
        let guard = self.collections.read().await;
        let mut texts: Vec<String> = guard
            .get(collection)
            .map(|c| c.records.values().map(|r| r.payload.text.clone()).collect())
            .unwrap_or_default();
        texts.sort();
        texts
    }
}

fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b),
        Metric::Dotproduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        // Negated so that higher is still more similar
        Metric::Euclidean => -a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<EnsureOutcome> {
        let mut guard = self.collections.write().await;
        if let Some(existing) = guard.get(&spec.name) {
            spec.check_existing(existing.dimension, existing.metric)?;
            return Ok(EnsureOutcome::Existing);
        }

        guard.insert(
            spec.name.clone(),
            Collection {
                dimension: spec.dimension,
                metric: spec.metric,
                records: HashMap::new(),
            },
        );
        Ok(EnsureOutcome::Created)
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let mut guard = self.collections.write().await;
        let target = guard
            .get_mut(collection)
            .ok_or_else(|| Error::vector_db(format!("collection '{}' not found", collection)))?;

        for record in records {
            if record.vector.len() != target.dimension {
                return Err(Error::DimensionMismatch {
                    expected: target.dimension,
                    actual: record.vector.len(),
                });
            }
        }
        for record in records {
            target.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        if top_k == 0 {
            return Err(Error::vector_db("top_k must be positive"));
        }

        let guard = self.collections.read().await;
        let target = guard
            .get(collection)
            .ok_or_else(|| Error::vector_db(format!("collection '{}' not found", collection)))?;

        if vector.len() != target.dimension {
            return Err(Error::DimensionMismatch {
                expected: target.dimension,
                actual: vector.len(),
            });
        }

        let mut matches: Vec<QueryMatch> = target
            .records
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: score(target.metric, vector, &record.vector),
                payload: record.payload.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}
