//! # Vibe Memory
//!
//! A conversational assistant with persistent long-term memory stored as
//! vector embeddings.
//!
//! ## Architecture
//!
//! Each turn runs the memory lifecycle end to end:
//! - **Retrieve** - the query is embedded and the nearest stored facts are fetched
//! - **Compose** - facts and query are merged into a two-section prompt
//! - **Generate** - the prompt goes to a chat session that keeps its own history
//! - **Extract** - `[SAVE_MEMORY]...[/SAVE_MEMORY]` blocks are cut from the reply
//! - **Persist** - every extracted fact is embedded and upserted
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vibe_memory::{bootstrap, Assistant, Config, Embedder, GeminiChat, MemoryStore};
//!
//! let config = Config::from_env()?;
//! config.validate()?;
//!
//! let embedder = Embedder::from_config(&config)?;
//! let index = vibe_memory::storage::open_index(&config).await?;
//! let store = MemoryStore::new(&config, embedder, index);
//! bootstrap(&store).await?;
//!
//! let chat = GeminiChat::new(&config)?;
//! let mut assistant = Assistant::new(store, &chat);
//! let outcome = assistant.handle_input("My name is Sam").await;
//! ```

pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod console;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod memory;
pub mod message;
pub mod prompt;
pub mod retrieval;
pub mod storage;

pub use bootstrap::{bootstrap, BootstrapReport, INITIAL_FACTS};
pub use chat::{ChatProvider, ChatSession, GeminiChat};
pub use config::Config;
pub use conversation::{run_repl, Assistant, TurnOutcome, TurnState};
pub use embedding::{normalize, Embedder, EmbeddingProvider};
pub use error::{Error, Result};
pub use extractor::{extract, Extraction};
pub use memory::{memory_id, Memory, MemoryStore};
pub use message::{Role, Turn};
pub use retrieval::{compose, RetrievedMemory};
pub use storage::{InMemoryIndex, VectorIndex};
