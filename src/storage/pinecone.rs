//! Pinecone serverless index over REST.
//!
//! Collection management goes to the control plane (`api.pinecone.io`);
//! upserts and queries go to the per-index host it reports.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    CollectionSpec, EnsureOutcome, MemoryPayload, Metric, QueryMatch, VectorIndex, VectorRecord,
};
use crate::config::Config;
use crate::error::{Error, Result};

const API_VERSION: &str = "2024-07";

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    metric: Metric,
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudRegion<'a>,
}

#[derive(Debug, Serialize)]
struct CloudRegion<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a MemoryPayload,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

#[derive(Debug, Deserialize)]
struct ScoredVector {
    id: String,
    score: f32,
    metadata: Option<MemoryPayload>,
}

#[derive(Debug, Deserialize)]
struct PineconeErrorResponse {
    error: PineconeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct PineconeErrorDetail {
    message: String,
}

/// Pinecone-backed vector index
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    control_url: String,
    cloud: String,
    region: String,
    /// Data-plane host per collection, resolved on first use
    hosts: Mutex<HashMap<String, String>>,
    ready_poll_interval: Duration,
    ready_poll_attempts: u32,
}

impl PineconeIndex {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .pinecone_api_key
            .clone()
            .ok_or_else(|| Error::config("PINECONE_API_KEY is not set"))?;

        Ok(Self {
            client: config.http_client()?,
            api_key,
            control_url: config.pinecone_control_url.clone(),
            cloud: config.pinecone_cloud.clone(),
            region: config.pinecone_region.clone(),
            hosts: Mutex::new(HashMap::new()),
            ready_poll_interval: Duration::from_secs(1),
            ready_poll_attempts: 120,
        })
    }

    /// Override how long `ensure_collection` waits for a new index
    pub fn with_ready_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.ready_poll_interval = interval;
        self.ready_poll_attempts = attempts;
        self
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = self.authed(builder).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    fn api_error(what: &str, status: StatusCode, body: &str) -> Error {
        match serde_json::from_str::<PineconeErrorResponse>(body) {
            Ok(error) => Error::provider(format!(
                "Pinecone {} failed ({}): {}",
                what, status, error.error.message
            )),
            Err(_) => Error::provider(format!("Pinecone {} failed ({}): {}", what, status, body)),
        }
    }

    fn parse<T: for<'de> Deserialize<'de>>(what: &str, body: &str) -> Result<T> {
        serde_json::from_str(body)
            .map_err(|e| Error::provider(format!("Malformed Pinecone {} response: {}", what, e)))
    }

    async fn list_indexes(&self) -> Result<Vec<IndexModel>> {
        let (status, body) = self
            .send(self.client.get(format!("{}/indexes", self.control_url)))
            .await?;
        if !status.is_success() {
            return Err(Self::api_error("list indexes", status, &body));
        }
        Ok(Self::parse::<IndexList>("list indexes", &body)?.indexes)
    }

    async fn describe_index(&self, name: &str) -> Result<IndexModel> {
        let (status, body) = self
            .send(
                self.client
                    .get(format!("{}/indexes/{}", self.control_url, name)),
            )
            .await?;
        if !status.is_success() {
            return Err(Self::api_error("describe index", status, &body));
        }
        Self::parse("describe index", &body)
    }

    /// Returns `None` if another client created the index first
    async fn create_index(&self, spec: &CollectionSpec) -> Result<Option<IndexModel>> {
        let request = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: CloudRegion {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };

        let (status, body) = self
            .send(
                self.client
                    .post(format!("{}/indexes", self.control_url))
                    .json(&request),
            )
            .await?;

        if status == StatusCode::CONFLICT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::api_error("create index", status, &body));
        }
        Self::parse("create index", &body).map(Some)
    }

    async fn wait_until_ready(&self, mut model: IndexModel) -> Result<IndexModel> {
        let mut attempts = 0;
        while !model.status.ready {
            if attempts >= self.ready_poll_attempts {
                return Err(Error::provider(format!(
                    "Pinecone index '{}' did not become ready",
                    model.name
                )));
            }
            attempts += 1;
            tokio::time::sleep(self.ready_poll_interval).await;
            model = self.describe_index(&model.name).await?;
        }
        Ok(model)
    }

    async fn remember_host(&self, name: &str, host: &str) {
        self.hosts
            .lock()
            .await
            .insert(name.to_string(), host_url(host));
    }

    async fn host(&self, collection: &str) -> Result<String> {
        if let Some(host) = self.hosts.lock().await.get(collection) {
            return Ok(host.clone());
        }
        let model = self.describe_index(collection).await?;
        self.remember_host(collection, &model.host).await;
        Ok(host_url(&model.host))
    }
}

/// Hosts come back without a scheme
fn host_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn provider_name(&self) -> &'static str {
        "pinecone"
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<EnsureOutcome> {
        let existing = self
            .list_indexes()
            .await?
            .into_iter()
            .find(|index| index.name == spec.name);

        if let Some(index) = existing {
            spec.check_existing(index.dimension, index.metric)?;
            self.remember_host(&index.name, &index.host).await;
            return Ok(EnsureOutcome::Existing);
        }

        info!(
            "Creating Pinecone index '{}' ({} dims, {}, {}/{})",
            spec.name, spec.dimension, spec.metric, self.cloud, self.region
        );

        match self.create_index(spec).await? {
            Some(created) => {
                let ready = self.wait_until_ready(created).await?;
                self.remember_host(&ready.name, &ready.host).await;
                Ok(EnsureOutcome::Created)
            }
            None => {
                let index = self.describe_index(&spec.name).await?;
                spec.check_existing(index.dimension, index.metric)?;
                self.remember_host(&index.name, &index.host).await;
                Ok(EnsureOutcome::Existing)
            }
        }
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let host = self.host(collection).await?;
        let vectors: Vec<UpsertVector<'_>> = records
            .iter()
            .map(|r| UpsertVector {
                id: &r.id,
                values: &r.vector,
                metadata: &r.payload,
            })
            .collect();

        debug!("Upserting {} vectors into '{}'", vectors.len(), collection);

        let (status, body) = self
            .send(
                self.client
                    .post(format!("{}/vectors/upsert", host))
                    .json(&json!({ "vectors": vectors })),
            )
            .await?;
        if !status.is_success() {
            return Err(Self::api_error("upsert", status, &body));
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

        let host = self.host(collection).await?;
        let (status, body) = self
            .send(self.client.post(format!("{}/query", host)).json(&json!({
                "vector": vector,
                "topK": top_k,
                "includeMetadata": true,
                "includeValues": false,
            })))
            .await?;
        if !status.is_success() {
            return Err(Self::api_error("query", status, &body));
        }

        let response: QueryResponse = Self::parse("query", &body)?;
        let mut matches: Vec<QueryMatch> = response
            .matches
            .into_iter()
            .filter_map(|m| match m.metadata {
                Some(payload) => Some(QueryMatch {
                    id: m.id,
                    score: m.score,
                    payload,
                }),
                None => {
                    debug!("Skipping match '{}' without metadata", m.id);
                    None
                }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_url_adds_scheme_when_missing() {
        assert_eq!(
            host_url("vibe-memory-abc.svc.pinecone.io"),
            "https://vibe-memory-abc.svc.pinecone.io"
        );
        assert_eq!(host_url("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[test]
    fn create_request_matches_serverless_shape() {
        let request = CreateIndexRequest {
            name: "vibe-memory",
            dimension: 768,
            metric: Metric::Cosine,
            spec: ServerlessSpec {
                serverless: CloudRegion {
                    cloud: "aws",
                    region: "us-east-1",
                },
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "name": "vibe-memory",
                "dimension": 768,
                "metric": "cosine",
                "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } }
            })
        );
    }

    #[test]
    fn requires_api_key() {
        let config = Config::default();
        assert!(PineconeIndex::new(&config).err().unwrap().is_config());
    }
}
