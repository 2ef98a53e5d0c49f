//! One-time collection setup and seeding

use tracing::{info, warn};

use crate::error::Result;
use crate::memory::MemoryStore;
use crate::storage::EnsureOutcome;

/// Facts written into a freshly created collection
pub const INITIAL_FACTS: &[&str] = &[
    "The user's name is Alex.",
    "Alex is a software developer.",
    "Alex is interested in learning about artificial intelligence.",
    "Alex enjoys hiking on the weekends.",
    "Alex lives in a city with a vibrant tech scene.",
    "Alex's favorite programming language is Python.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub outcome: EnsureOutcome,
    /// Facts written during seeding (0 when the collection already existed)
    pub seeded: usize,
}

/// Ensure the collection exists; seed it with [`INITIAL_FACTS`] only if it
/// was just created.
pub async fn bootstrap(store: &MemoryStore) -> Result<BootstrapReport> {
    bootstrap_with(store, INITIAL_FACTS).await
}

/// Like [`bootstrap`] with a caller-chosen seed list
pub async fn bootstrap_with(store: &MemoryStore, seed: &[&str]) -> Result<BootstrapReport> {
    let collection = store.collection();

    // The collection is sized from config; refuse to create or reuse it
    // when the embedder disagrees
    if let Err(e) = store.embedder().check_dimensions().await {
        if e.is_config() {
            return Err(e);
        }
        warn!("Could not verify embedding dimensions: {}", e);
    }

    let outcome = store.ensure_collection().await?;

    if outcome == EnsureOutcome::Existing {
        info!(
            "Collection '{}' already exists on {}; skipping seed",
            collection.name,
            store.index().provider_name()
        );
        return Ok(BootstrapReport { outcome, seeded: 0 });
    }

    info!(
        "Created collection '{}' ({} dims, {}); seeding {} facts",
        collection.name,
        collection.dimension,
        collection.metric,
        seed.len()
    );

    let mut seeded = 0;
    for fact in seed {
        if let Err(e) = store.remember(fact).await {
            if e.is_config() {
                return Err(e);
            }
            warn!("Failed to seed fact {:?}: {}", fact, e);
            continue;
        }
        seeded += 1;
    }

    Ok(BootstrapReport { outcome, seeded })
}
