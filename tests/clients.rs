//! OpenAI and Pinecone clients against a local mock server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use study_partner::config::{EmbeddingConfig, LlmConfig};
use study_partner::embedding::OpenAiEmbedder;
use study_partner::llm::OpenAiGenerator;
use study_partner::pinecone::{PineconeControl, PineconeIndex};
use study_partner_core::embedding::Embedder;
use study_partner_core::generate::AnswerGenerator;
use study_partner_core::index::{SearchFilter, VectorIndex};
use study_partner_core::models::Chunk;

// ─── Mock server ────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Mock {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    auth: Arc<Mutex<Vec<String>>>,
    chat_calls: Arc<AtomicUsize>,
    flaky_query_calls: Arc<AtomicUsize>,
}

impl Mock {
    fn record(&self, path: &str, headers: &HeaderMap, body: &Value) {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        let auth = headers
            .get("authorization")
            .or_else(|| headers.get("api-key"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.auth.lock().unwrap().push(auth);
    }

    fn last(&self, path: &str) -> Value {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, body)| body.clone())
            .unwrap_or(Value::Null)
    }
}

async fn embeddings(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    mock.record("/v1/embeddings", &headers, &body);
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    // Returned out of order; the client sorts by index.
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(i, _)| json!({"index": i, "embedding": [i as f64, 1.0, 0.0]}))
        .collect();
    Json(json!({"data": data}))
}

async fn chat(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.record("/v1/chat/completions", &headers, &body);
    // First call fails with a retryable status.
    if mock.chat_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "overloaded"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"choices": [{"message": {"role": "assistant", "content": "  S3 is object storage.  "}}]})),
    )
}

async fn describe_index(State(mock): State<Mock>, headers: HeaderMap) -> Json<Value> {
    mock.record("/indexes/aws-study-partner", &headers, &Value::Null);
    Json(json!({"name": "aws-study-partner", "host": "data.example.pinecone.io", "status": {"ready": true}}))
}

async fn pinecone_query(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    mock.record("/query", &headers, &body);
    Json(json!({"matches": [
        {"id": "guide.pdf:3", "score": 0.91, "metadata": {
            "text": "S3 Glacier is for archives", "source": "aws_certification_guide",
            "doc_type": "study_guide", "filename": "guide.pdf", "chunk_id": 3.0}},
        {"id": "other", "score": 0.42},
        {"id": "legacy", "score": 0.30, "metadata": {"text": "Deep Archive is the cheapest tier"}}
    ]}))
}

async fn flaky_query(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.record("/flaky/query", &headers, &body);
    if mock.flaky_query_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "try again"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"matches": [{"id": "guide.pdf:0", "score": 0.8, "metadata": {"text": "IAM roles"}}]})),
    )
}

async fn rejected_query(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    mock.record("/rejected/query", &headers, &body);
    StatusCode::BAD_REQUEST
}

async fn pinecone_upsert(State(mock): State<Mock>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    mock.record("/vectors/upsert", &headers, &body);
    let count = body["vectors"].as_array().map(|v| v.len()).unwrap_or(0);
    Json(json!({"upsertedCount": count}))
}

async fn pinecone_stats(State(mock): State<Mock>, headers: HeaderMap) -> Json<Value> {
    mock.record("/describe_index_stats", &headers, &Value::Null);
    Json(json!({"dimension": 3, "totalVectorCount": 42}))
}

async fn start_mock() -> (String, Mock) {
    let mock = Mock::default();
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat))
        .route("/indexes/aws-study-partner", get(describe_index))
        .route("/query", post(pinecone_query))
        .route("/flaky/query", post(flaky_query))
        .route("/rejected/query", post(rejected_query))
        .route("/vectors/upsert", post(pinecone_upsert))
        .route("/describe_index_stats", post(pinecone_stats))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), mock)
}

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_openai_embeddings_are_ordered_by_index() {
    let (base, mock) = start_mock().await;
    let config = EmbeddingConfig {
        base_url: format!("{}/v1", base),
        dims: 3,
        ..EmbeddingConfig::default()
    };
    let embedder = OpenAiEmbedder::new(&config, "sk-test").unwrap();

    let vectors = embedder
        .embed(&["a".to_string(), "b".to_string(), "c".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0][0], 0.0);
    assert_eq!(vectors[2][0], 2.0);

    let sent = mock.last("/v1/embeddings");
    assert_eq!(sent["model"], "text-embedding-3-large");
    assert_eq!(sent["input"], json!(["a", "b", "c"]));
    assert_eq!(mock.auth.lock().unwrap()[0], "Bearer sk-test");
}

#[tokio::test]
async fn test_chat_completion_retries_and_trims() {
    let (base, mock) = start_mock().await;
    let config = LlmConfig {
        base_url: format!("{}/v1/", base),
        max_retries: 1,
        ..LlmConfig::default()
    };
    let generator = OpenAiGenerator::new(&config, "sk-test").unwrap();

    let answer = generator.generate("What is S3?").await.unwrap();
    assert_eq!(answer, "S3 is object storage.");
    assert_eq!(mock.chat_calls.load(Ordering::SeqCst), 2);

    let sent = mock.last("/v1/chat/completions");
    assert_eq!(sent["model"], "gpt-3.5-turbo");
    assert_eq!(sent["max_tokens"], 500);
    assert_eq!(sent["messages"][0]["role"], "user");
    assert_eq!(sent["messages"][0]["content"], "What is S3?");
}

#[tokio::test]
async fn test_chat_completion_gives_up_without_retries() {
    let (base, _mock) = start_mock().await;
    let config = LlmConfig {
        base_url: format!("{}/v1", base),
        max_retries: 0,
        ..LlmConfig::default()
    };
    let generator = OpenAiGenerator::new(&config, "sk-test").unwrap();
    let err = generator.generate("What is S3?").await.unwrap_err();
    assert!(err.to_string().contains("503"), "{}", err);
}

#[tokio::test]
async fn test_pinecone_control_finds_existing_index() {
    let (base, mock) = start_mock().await;
    let control = PineconeControl::new(&base, "pc-key").unwrap();

    let host = control
        .ensure_index("aws-study-partner", 3072, "aws", "us-east-1")
        .await
        .unwrap();
    assert_eq!(host, "data.example.pinecone.io");
    assert_eq!(mock.auth.lock().unwrap()[0], "pc-key");

    let err = control.resolve_host("missing").await.unwrap_err();
    assert!(err.to_string().contains("missing"), "{}", err);
}

#[tokio::test]
async fn test_pinecone_query_upsert_and_count() {
    let (base, mock) = start_mock().await;
    let index = PineconeIndex::new(&base, "pc-key", Arc::new(FixedEmbedder), 2).unwrap();

    let filter = SearchFilter::doc_type("questions");
    let docs = index.search("archive storage", 5, Some(&filter)).await.unwrap();
    // The match without metadata text is dropped; ranks stay contiguous.
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].chunk_id, Some(3));
    assert_eq!(docs[0].filename.as_deref(), Some("guide.pdf"));
    assert_eq!(docs[1].rank, 1);
    assert_eq!(docs[1].text, "Deep Archive is the cheapest tier");
    assert_eq!(docs[1].source, None);

    let sent = mock.last("/query");
    assert_eq!(sent["topK"], 5);
    assert_eq!(sent["includeMetadata"], true);
    assert_eq!(sent["filter"], json!({"doc_type": {"$eq": "questions"}}));

    let chunks: Vec<Chunk> = (0..3)
        .map(|i| Chunk {
            text: format!("chunk {}", i),
            chunk_id: i,
            metadata: study_partner::ingest::classify("guide.pdf"),
        })
        .collect();
    assert_eq!(index.upsert(&chunks).await.unwrap(), 3);
    let sent = mock.last("/vectors/upsert");
    assert_eq!(sent["vectors"][0]["id"], "guide.pdf:2");
    assert_eq!(sent["vectors"][0]["metadata"]["doc_type"], "study_guide");

    assert_eq!(index.count().await.unwrap(), 42);
}

#[tokio::test]
async fn test_pinecone_query_retries_after_server_error() {
    let (base, mock) = start_mock().await;
    let index = PineconeIndex::new(&format!("{}/flaky", base), "pc-key", Arc::new(FixedEmbedder), 2)
        .unwrap()
        .with_max_retries(1);

    let docs = index.search("iam", 3, None).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].text, "IAM roles");
    assert_eq!(mock.flaky_query_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pinecone_query_fails_without_retries() {
    let (base, mock) = start_mock().await;
    let index = PineconeIndex::new(&format!("{}/flaky", base), "pc-key", Arc::new(FixedEmbedder), 2)
        .unwrap()
        .with_max_retries(0);

    let err = index.search("iam", 3, None).await.unwrap_err();
    assert!(err.to_string().contains("503"), "{}", err);
    assert_eq!(mock.flaky_query_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pinecone_client_error_is_not_retried() {
    let (base, mock) = start_mock().await;
    let index = PineconeIndex::new(&format!("{}/rejected", base), "pc-key", Arc::new(FixedEmbedder), 2)
        .unwrap()
        .with_max_retries(3);

    let err = index.search("iam", 3, None).await.unwrap_err();
    assert!(err.to_string().contains("400"), "{}", err);
    let attempts = mock
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|(p, _)| p == "/rejected/query")
        .count();
    assert_eq!(attempts, 1);
}
