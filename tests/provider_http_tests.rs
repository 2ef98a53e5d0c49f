//! HTTP provider tests against wiremock servers
//!
//! Gemini embedding and chat, and the Pinecone control and data planes.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vibe_memory::chat::{ChatProvider, ChatSession, GeminiChat};
use vibe_memory::config::Config;
use vibe_memory::embedding::{EmbeddingProvider, GeminiEmbeddingProvider};
use vibe_memory::message::Role;
use vibe_memory::storage::{
    CollectionSpec, EnsureOutcome, MemoryPayload, Metric, PineconeIndex, VectorIndex, VectorRecord,
};

const CHAT_PATH: &str = "/v1beta/models/gemini-2.5-flash-lite-preview-06-17:generateContent";
const EMBED_PATH: &str = "/v1beta/models/embedding-001:embedContent";

fn gemini_config(server: &MockServer) -> Config {
    Config {
        gemini_api_key: Some("test-gemini-key".to_string()),
        gemini_base_url: server.uri(),
        ..Config::default()
    }
}

fn pinecone_config(server: &MockServer) -> Config {
    Config {
        pinecone_api_key: Some("test-pinecone-key".to_string()),
        pinecone_control_url: server.uri(),
        ..Config::default()
    }
}

fn index_model(
    server: &MockServer,
    name: &str,
    dimension: usize,
    metric: &str,
    ready: bool,
) -> Value {
    json!({
        "name": name,
        "dimension": dimension,
        "metric": metric,
        "host": server.uri(),
        "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}},
        "status": {"ready": ready, "state": if ready { "Ready" } else { "Initializing" }}
    })
}

fn chat_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

fn record(id: &str, text: &str) -> VectorRecord {
    VectorRecord {
        id: id.to_string(),
        vector: vec![0.6, 0.8, 0.0],
        payload: MemoryPayload {
            text: text.to_string(),
        },
    }
}

// ============= Gemini embeddings =============

#[tokio::test]
async fn test_gemini_embedding_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(header("x-goog-api-key", "test-gemini-key"))
        .and(body_partial_json(json!({
            "model": "models/embedding-001",
            "content": {"parts": [{"text": "User likes tea."}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": {"values": [0.1, 0.2, 0.3]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiEmbeddingProvider::new(&gemini_config(&server)).unwrap();
    let values = provider.embed_content("User likes tea.").await.unwrap();

    assert_eq!(values, vec![0.1, 0.2, 0.3]);
    assert_eq!(provider.model(), "models/embedding-001");
}

#[tokio::test]
async fn test_gemini_embedding_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    let provider = GeminiEmbeddingProvider::new(&gemini_config(&server)).unwrap();
    let err = provider.embed_content("anything").await.unwrap_err();

    assert!(err.is_provider());
    assert!(err.to_string().contains("Resource has been exhausted"));
}

#[tokio::test]
async fn test_gemini_embedding_requires_key() {
    let config = Config {
        gemini_api_key: None,
        ..Config::default()
    };
    assert!(GeminiEmbeddingProvider::new(&config).err().unwrap().is_config());
}

// ============= Gemini chat =============

#[tokio::test]
async fn test_gemini_chat_replays_history() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("x-goog-api-key", "test-gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("Hello, Sam!")))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("You are Sam.")))
        .mount(&server)
        .await;

    let chat = GeminiChat::new(&gemini_config(&server)).unwrap();
    let mut session = chat.start_session("Be helpful.");

    assert_eq!(session.send("I am Sam").await.unwrap(), "Hello, Sam!");
    assert_eq!(session.send("Who am I?").await.unwrap(), "You are Sam.");

    let history = session.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[3].text, "You are Sam.");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(
        second["systemInstruction"]["parts"][0]["text"],
        "Be helpful."
    );
    let contents = second["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "I am Sam");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["text"], "Hello, Sam!");
    assert_eq!(contents[2]["parts"][0]["text"], "Who am I?");
}

#[tokio::test]
async fn test_gemini_chat_error_keeps_history_clean() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
        })))
        .mount(&server)
        .await;

    let chat = GeminiChat::new(&gemini_config(&server)).unwrap();
    let mut session = chat.start_session("Be helpful.");

    let err = session.send("hello").await.unwrap_err();
    assert!(err.to_string().contains("The model is overloaded."));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_gemini_chat_blocked_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let chat = GeminiChat::new(&gemini_config(&server)).unwrap();
    let mut session = chat.start_session("Be helpful.");

    let err = session.send("hello").await.unwrap_err();
    assert!(err.to_string().contains("SAFETY"));
}

// ============= Pinecone =============

#[tokio::test]
async fn test_pinecone_creates_missing_index_and_waits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes"))
        .and(header("Api-Key", "test-pinecone-key"))
        .and(header("X-Pinecone-API-Version", "2024-07"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": []})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_partial_json(json!({
            "name": "vibe-memory",
            "dimension": 768,
            "metric": "cosine",
            "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(index_model(&server, "vibe-memory", 768, "cosine", false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/indexes/vibe-memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_model(&server, "vibe-memory", 768, "cosine", true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server))
        .unwrap()
        .with_ready_polling(Duration::ZERO, 3);
    let spec = CollectionSpec::new("vibe-memory", 768, Metric::Cosine);

    assert_eq!(
        index.ensure_collection(&spec).await.unwrap(),
        EnsureOutcome::Created
    );
}

#[tokio::test]
async fn test_pinecone_existing_index_is_reused() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indexes": [index_model(&server, "vibe-memory", 768, "cosine", true)]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server)).unwrap();
    let spec = CollectionSpec::new("vibe-memory", 768, Metric::Cosine);

    assert_eq!(
        index.ensure_collection(&spec).await.unwrap(),
        EnsureOutcome::Existing
    );
}

#[tokio::test]
async fn test_pinecone_rejects_schema_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indexes": [index_model(&server, "vibe-memory", 1536, "cosine", true)]
        })))
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server)).unwrap();
    let spec = CollectionSpec::new("vibe-memory", 768, Metric::Cosine);

    let err = index.ensure_collection(&spec).await.unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("1536"));
}

#[tokio::test]
async fn test_pinecone_create_conflict_falls_back_to_describe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": []})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": "ALREADY_EXISTS", "message": "Resource already exists"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/indexes/vibe-memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_model(&server, "vibe-memory", 768, "cosine", true)),
        )
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server)).unwrap();
    let spec = CollectionSpec::new("vibe-memory", 768, Metric::Cosine);

    assert_eq!(
        index.ensure_collection(&spec).await.unwrap(),
        EnsureOutcome::Existing
    );
}

#[tokio::test]
async fn test_pinecone_upsert_and_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/vibe-memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_model(&server, "vibe-memory", 3, "cosine", true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(body_partial_json(json!({
            "vectors": [{"id": "a", "metadata": {"text": "User likes tea."}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({"topK": 2, "includeMetadata": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {"id": "b", "score": 0.41, "metadata": {"text": "User has a cat."}},
                {"id": "a", "score": 0.93, "metadata": {"text": "User likes tea."}},
                {"id": "c", "score": 0.88}
            ],
            "namespace": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server)).unwrap();

    index
        .upsert("vibe-memory", &[record("a", "User likes tea.")])
        .await
        .unwrap();
    let matches = index
        .query("vibe-memory", &[0.6, 0.8, 0.0], 2)
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "a");
    assert_eq!(matches[0].payload.text, "User likes tea.");
    assert_eq!(matches[1].id, "b");
    assert!(matches[0].score > matches[1].score);
}

#[tokio::test]
async fn test_pinecone_query_error_surfaces_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/vibe-memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_model(&server, "vibe-memory", 3, "cosine", true)),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "INVALID_ARGUMENT", "message": "Vector dimension 2 does not match the dimension of the index 3"}
        })))
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server)).unwrap();
    let err = index
        .query("vibe-memory", &[1.0, 0.0], 5)
        .await
        .unwrap_err();

    assert!(err.is_provider());
    assert!(err.to_string().contains("does not match the dimension"));
}

#[tokio::test]
async fn test_pinecone_requires_key() {
    let config = Config {
        pinecone_api_key: None,
        ..Config::default()
    };
    assert!(PineconeIndex::new(&config).is_err());
}
