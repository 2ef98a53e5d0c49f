//! Embedding generation: provider round trip followed by L2 normalization

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// Scale `v` to unit length. The zero vector is returned unchanged.
pub fn normalize(v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v;
    }
    v.into_iter().map(|x| x / norm).collect()
}

/// Source of raw (unnormalized) embeddings
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logs
    fn model(&self) -> &str;

    /// Embed a single text
    async fn embed_content(&self, text: &str) -> Result<Vec<f32>>;
}

const DIMENSION_CHECK_TEXT: &str = "dimension check";

/// Turns text into fixed-dimension unit vectors
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimensions: usize) -> Self {
        Self {
            provider,
            dimensions,
        }
    }

    /// Build the embedder selected by `config.embedding_backend`
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
            crate::config::EmbeddingBackend::Gemini => {
                Arc::new(GeminiEmbeddingProvider::new(config)?)
            }
            #[cfg(feature = "local-embeddings")]
            crate::config::EmbeddingBackend::Local => Arc::new(LocalEmbeddingProvider::new()?),
            #[cfg(not(feature = "local-embeddings"))]
            crate::config::EmbeddingBackend::Local => {
                return Err(Error::config(
                    "local embeddings require the `local-embeddings` feature",
                ))
            }
        };
        Ok(Self::new(provider, config.embedding_dimensions))
    }

    /// Embed `text` and normalize it. Callers filter blank input.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let raw = self.provider.embed_content(text).await?;
        if raw.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: raw.len(),
            });
        }
        Ok(normalize(raw))
    }

    /// Embed a fixed sample and fail with `DimensionMismatch` unless the
    /// provider's output has `dimensions` components
    pub async fn check_dimensions(&self) -> Result<()> {
        self.embed(DIMENSION_CHECK_TEXT).await.map(|_| ())
    }

    /// Get the embedding dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleErrorResponse {
    pub(crate) error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleErrorDetail {
    pub(crate) message: String,
}

/// Gemini `embedContent` over REST
pub struct GeminiEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| Error::config("GEMINI_API_KEY is not set"))?;

        Ok(Self {
            client: config.http_client()?,
            api_key,
            base_url: config.gemini_base_url.clone(),
            model: qualified_model(&config.embedding_model),
        })
    }
}

/// Gemini model ids are addressed as `models/<name>`
pub(crate) fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_content(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1beta/{}:embedContent", self.base_url, self.model);
        let request = EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
        };

        debug!("Embedding {} chars with {}", text.len(), self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GoogleErrorResponse>(&body) {
                return Err(Error::provider(format!(
                    "Embedding API error ({}): {}",
                    status, error.error.message
                )));
            }
            return Err(Error::provider(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }

        let parsed: EmbedContentResponse = serde_json::from_str(&body).map_err(|e| {
            Error::provider(format!("Malformed embedding response: {}", e))
        })?;

        Ok(parsed.embedding.values)
    }
}

/// Local embeddings via fastembed (no API keys)
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbeddingProvider {
    model: Arc<tokio::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbeddingProvider {
    /// Load all-MiniLM-L6-v2; downloads to ~/.cache/fastembed on first use
    pub fn new() -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
        )
        .map_err(|e| Error::provider(format!("Failed to load embedding model: {}", e)))?;

        Ok(Self {
            model: Arc::new(tokio::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn model(&self) -> &str {
        "all-MiniLM-L6-v2"
    }

    async fn embed_content(&self, text: &str) -> Result<Vec<f32>> {
        let mut guard = self.model.lock().await;
        let embeddings = guard
            .embed(vec![text.to_string()], None)
            .map_err(|e| Error::provider(format!("Embedding failed: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider("No embedding returned"))
    }
}
