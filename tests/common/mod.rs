//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vibe_memory::chat::{ChatProvider, ChatSession};
use vibe_memory::config::{Config, VectorBackend};
use vibe_memory::embedding::{Embedder, EmbeddingProvider};
use vibe_memory::error::{Error, Result};
use vibe_memory::memory::MemoryStore;
use vibe_memory::message::Turn;
use vibe_memory::storage::{
    CollectionSpec, EnsureOutcome, InMemoryIndex, QueryMatch, VectorIndex, VectorRecord,
};

pub const DIMS: usize = 64;

/// Deterministic bag-of-words embedding: each word bumps one FNV bucket
pub struct WordHashEmbedding {
    pub calls: AtomicUsize,
    /// Texts containing this marker fail with a provider error
    pub fail_on: Option<String>,
}

impl WordHashEmbedding {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(marker.to_string()),
        }
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedding {
    fn model(&self) -> &str {
        "word-hash"
    }

    async fn embed_content(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(Error::provider("embedding quota exceeded"));
            }
        }

        let mut v = vec![0.0f32; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = (fnv1a(&word.to_lowercase()) % DIMS as u64) as usize;
            v[bucket] += 1.0;
        }
        Ok(v)
    }
}

/// `InMemoryIndex` that counts calls and can be told to fail
#[derive(Clone, Default)]
pub struct CountingIndex {
    pub inner: InMemoryIndex,
    pub ensure_calls: Arc<AtomicUsize>,
    pub upsert_calls: Arc<AtomicUsize>,
    pub query_calls: Arc<AtomicUsize>,
    pub fail_queries: Arc<Mutex<bool>>,
    /// Upserts whose payload contains this text fail
    pub fail_upserts_containing: Arc<Mutex<Option<String>>>,
}

impl CountingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    fn provider_name(&self) -> &'static str {
        "counting"
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<EnsureOutcome> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_collection(spec).await
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let fail_on = self.fail_upserts_containing.lock().unwrap().clone();
        if let Some(marker) = fail_on {
            if records.iter().any(|r| r.payload.text.contains(&marker)) {
                return Err(Error::provider("upsert rejected"));
            }
        }
        self.inner.upsert(collection, records).await
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let fail = *self.fail_queries.lock().unwrap();
        if fail {
            return Err(Error::provider("index unavailable"));
        }
        self.inner.query(collection, vector, top_k).await
    }
}

/// Chat provider that replays scripted replies and records prompts
#[derive(Clone, Default)]
pub struct ScriptedChat {
    pub replies: Arc<Mutex<VecDeque<Result<String>>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub system_instructions: Arc<Mutex<Option<String>>>,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, text: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::provider(message)));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ChatProvider for ScriptedChat {
    fn start_session(&self, system_instructions: &str) -> Box<dyn ChatSession> {
        *self.system_instructions.lock().unwrap() = Some(system_instructions.to_string());
        Box::new(ScriptedSession {
            chat: self.clone(),
            history: Vec::new(),
        })
    }
}

pub struct ScriptedSession {
    chat: ScriptedChat,
    history: Vec<Turn>,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send(&mut self, prompt: &str) -> Result<String> {
        self.chat.prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .chat
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::provider("no scripted reply left")));
        let text = next?;
        self.history.push(Turn::user(prompt));
        self.history.push(Turn::assistant(text.clone()));
        Ok(text)
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}

pub fn test_config() -> Config {
    Config {
        gemini_api_key: Some("test-key".to_string()),
        vector_backend: VectorBackend::InMemory,
        embedding_dimensions: DIMS,
        index_name: "vibe-test".to_string(),
        ..Config::default()
    }
}

pub fn store_with(index: CountingIndex, embedding: Arc<WordHashEmbedding>) -> MemoryStore {
    let config = test_config();
    let embedder = Embedder::new(embedding, DIMS);
    MemoryStore::new(&config, embedder, Arc::new(index))
}
