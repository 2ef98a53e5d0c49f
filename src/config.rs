//! Configuration for vibe-memory

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::Metric;

/// Number of memories retrieved per turn
pub const DEFAULT_TOP_K: usize = 15;

/// Output size of `models/embedding-001`
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

pub const DEFAULT_INDEX_NAME: &str = "vibe-memory";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash-lite-preview-06-17";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_PINECONE_CONTROL_URL: &str = "https://api.pinecone.io";

/// Where memories are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    /// Managed Pinecone serverless index
    Pinecone,
    /// Local LanceDB table under `data_dir`
    LanceDb,
    /// Process-local, lost on exit
    InMemory,
}

impl FromStr for VectorBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pinecone" => Ok(Self::Pinecone),
            "lancedb" | "lance" => Ok(Self::LanceDb),
            "memory" | "in-memory" => Ok(Self::InMemory),
            other => Err(Error::config(format!("unknown vector backend '{}'", other))),
        }
    }
}

/// Where embeddings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Gemini `embedContent`
    Gemini,
    /// fastembed MiniLM running in-process
    Local,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "local" | "fastembed" => Ok(Self::Local),
            other => Err(Error::config(format!("unknown embedding backend '{}'", other))),
        }
    }
}

/// Configuration for the assistant and its providers
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key (embeddings and chat)
    pub gemini_api_key: Option<String>,

    /// Pinecone API key
    pub pinecone_api_key: Option<String>,

    /// Serverless cloud hint for index creation
    pub pinecone_cloud: String,

    /// Serverless region hint for index creation
    pub pinecone_region: String,

    /// Name of the memory collection
    pub index_name: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Embedding dimensions; must match the collection
    pub embedding_dimensions: usize,

    /// Chat model identifier
    pub chat_model: String,

    /// Memories retrieved per turn
    pub top_k: usize,

    /// Similarity metric of the collection
    pub metric: Metric,

    pub vector_backend: VectorBackend,

    pub embedding_backend: EmbeddingBackend,

    /// Base directory for local backends
    pub data_dir: PathBuf,

    pub gemini_base_url: String,

    pub pinecone_control_url: String,

    /// Per-call timeout for provider requests. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vibe-memory");

        Self {
            gemini_api_key: None,
            pinecone_api_key: None,
            pinecone_cloud: "aws".to_string(),
            pinecone_region: "us-east-1".to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            metric: Metric::Cosine,
            vector_backend: VectorBackend::Pinecone,
            embedding_backend: EmbeddingBackend::Gemini,
            data_dir,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            pinecone_control_url: DEFAULT_PINECONE_CONTROL_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.gemini_api_key = get("GEMINI_API_KEY");
        config.pinecone_api_key = get("PINECONE_API_KEY");

        if let Some(cloud) = get("PINECONE_CLOUD") {
            config.pinecone_cloud = cloud;
        }
        if let Some(region) = get("PINECONE_REGION") {
            config.pinecone_region = region;
        }
        if let Some(name) = get("VIBE_INDEX_NAME") {
            config.index_name = name;
        }
        if let Some(model) = get("VIBE_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(model) = get("VIBE_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Some(backend) = get("VIBE_VECTOR_BACKEND") {
            config.vector_backend = backend.parse()?;
        }
        if let Some(backend) = get("VIBE_EMBEDDING_BACKEND") {
            config.embedding_backend = backend.parse()?;
            if config.embedding_backend == EmbeddingBackend::Local {
                // MiniLM-L6-v2 outputs 384-dim vectors
                config.embedding_dimensions = 384;
            }
        }
        if let Some(dims) = get("VIBE_EMBEDDING_DIMENSIONS") {
            config.embedding_dimensions = parse_positive("VIBE_EMBEDDING_DIMENSIONS", &dims)?;
        }
        if let Some(dir) = get("VIBE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            config.gemini_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = get("PINECONE_CONTROL_URL") {
            config.pinecone_control_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = get("VIBE_REQUEST_TIMEOUT_SECS") {
            let secs = parse_positive("VIBE_REQUEST_TIMEOUT_SECS", &secs)?;
            config.request_timeout = Some(Duration::from_secs(secs as u64));
        }

        Ok(config)
    }

    /// Check that every credential the selected backends need is present
    pub fn validate(&self) -> Result<()> {
        if self.gemini_api_key.is_none() {
            return Err(Error::config("GEMINI_API_KEY is not set"));
        }
        if self.vector_backend == VectorBackend::Pinecone && self.pinecone_api_key.is_none() {
            return Err(Error::config("PINECONE_API_KEY is not set"));
        }
        if self.embedding_dimensions == 0 {
            return Err(Error::config("embedding dimensions must be positive"));
        }
        if self.top_k == 0 {
            return Err(Error::config("top_k must be positive"));
        }
        if self.index_name.trim().is_empty() {
            return Err(Error::config("index name must not be empty"));
        }
        Ok(())
    }

    /// Get the path to the local vector database
    pub fn vector_db_path(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.vector_db_path())?;
        Ok(())
    }

    /// Shared HTTP client honoring `request_timeout`
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::config(format!(
            "{} must be a positive integer, got '{}'",
            key, value
        ))),
    }
}
