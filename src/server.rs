//! HTTP API server.
//!
//! Exposes the study pipeline as a JSON API for the web frontend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | API banner |
//! | `GET`  | `/health` | Health check (`healthy` or `degraded`) |
//! | `POST` | `/api/query` | Ask a question |
//! | `POST` | `/api/explain` | Explain a concept |
//! | `POST` | `/api/compare` | Compare two services |
//! | `POST` | `/api/quiz/generate` | Generate a practice quiz |
//! | `POST` | `/api/quiz/submit` | Grade quiz answers |
//! | `GET`  | `/api/topics` | Topic catalog |
//! | `GET`  | `/api/session/{id}` | Session summary |
//! | `DELETE` | `/api/session/{id}` | Clear a session |
//! | `GET`  | `/api/stats` | Session and quiz counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must be 3-1000 characters" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500),
//! `service_unavailable` (503). When the pipeline could not be built at
//! startup every pipeline-backed route answers 503 until restart; quiz
//! submission, topics and stats keep working.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use study_partner_core::history::{InMemorySessionStore, SessionStore};
use study_partner_core::models::{QueryResult, QuizResponse, QuizResult, SessionInfo, Topic};
use study_partner_core::prompt::DetailLevel;
use study_partner_core::quiz::{self, InMemoryQuizStore, QuizStore};
use study_partner_core::topics::topics;
use study_partner_core::{StudyError, StudyPipeline};

use crate::config::{Config, MAX_TOP_K};
use crate::setup::build_pipeline;

const MAX_QUIZ_QUESTIONS: usize = 20;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    /// `None` when the pipeline failed to build; see `init_error`.
    pipeline: Option<Arc<StudyPipeline>>,
    init_error: Option<String>,
    sessions: Arc<dyn SessionStore>,
    quizzes: Arc<dyn QuizStore>,
    embedding_model: String,
}

impl AppState {
    /// State backed by a ready pipeline. The pipeline's stores are shared
    /// with the routes that bypass it.
    pub fn ready(config: Config, pipeline: StudyPipeline) -> Self {
        let sessions = pipeline.sessions().clone();
        let quizzes = pipeline.quizzes().clone();
        let embedding_model = config.embedding.model.clone();
        Self {
            config: Arc::new(config),
            pipeline: Some(Arc::new(pipeline)),
            init_error: None,
            sessions,
            quizzes,
            embedding_model,
        }
    }

    /// Degraded state for a pipeline that failed to build.
    pub fn degraded(config: Config, error: impl Into<String>) -> Self {
        let embedding_model = config.embedding.model.clone();
        let max_history = config.study.max_history;
        Self {
            config: Arc::new(config),
            pipeline: None,
            init_error: Some(error.into()),
            sessions: Arc::new(InMemorySessionStore::new(max_history)),
            quizzes: Arc::new(InMemoryQuizStore::new()),
            embedding_model,
        }
    }

    /// Build the pipeline from configuration, degrading instead of failing.
    pub async fn from_config(config: Config) -> Self {
        match build_pipeline(&config).await {
            Ok(pipeline) => Self::ready(config, pipeline),
            Err(e) => {
                tracing::error!("Failed to initialize study partner: {:#}", e);
                let message = format!("{:#}", e);
                Self::degraded(config, message)
            }
        }
    }

    fn pipeline(&self) -> Result<&StudyPipeline, AppError> {
        match &self.pipeline {
            Some(pipeline) => Ok(pipeline.as_ref()),
            None => Err(unavailable(format!(
                "Study partner not initialized: {}",
                self.init_error.as_deref().unwrap_or("unknown error")
            ))),
        }
    }

    fn vector_index_label(&self) -> String {
        let index = &self.config.index;
        match index.provider.as_str() {
            "sqlite" => format!("sqlite:{}", index.path.display()),
            "pinecone" => format!("pinecone:{}", index.name),
            other => other.to_string(),
        }
    }
}

/// Build the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/query", post(handle_query))
        .route("/api/explain", post(handle_explain))
        .route("/api/compare", post(handle_compare))
        .route("/api/quiz/generate", post(handle_quiz_generate))
        .route("/api/quiz/submit", post(handle_quiz_submit))
        .route("/api/topics", get(handle_topics))
        .route(
            "/api/session/{id}",
            get(handle_session_info).delete(handle_session_clear),
        )
        .route("/api/stats", get(handle_stats))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .map(|o| o.trim())
                .filter(|o| !o.is_empty())
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

/// Starts the HTTP server with the pipeline described by `config`.
///
/// Binds to `[server].bind` and runs until the process is terminated. A
/// pipeline that fails to build is logged and the server starts degraded.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config.clone()).await;
    serve(state, &config.server.bind).await
}

/// Serve a prepared state on `bind`.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Study Partner API listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self.message);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "service_unavailable",
        message: message.into(),
    }
}

/// Map a pipeline error to a response; `operation` prefixes server errors
/// (e.g. `"Query failed"`).
fn study_error(operation: &str, err: StudyError) -> AppError {
    match err {
        StudyError::InvalidInput(msg) => bad_request(msg),
        StudyError::QuizNotFound(_) => not_found(err.to_string()),
        other => internal(format!("{}: {}", operation, other)),
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(bad_request(format!(
            "{} must be {}-{} characters",
            field, min, max
        )));
    }
    Ok(())
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct RootResponse {
    message: String,
    status: &'static str,
    health: &'static str,
    features: [&'static str; 5],
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("AWS Study Partner API v{}", env!("CARGO_PKG_VERSION")),
        status: "healthy",
        health: "/health",
        features: [
            "Chat Q&A with conversation history",
            "Concept explanations",
            "Service comparisons",
            "Practice quizzes",
            "Session management",
        ],
    })
}

#[derive(Serialize)]
struct HealthResponse {
    /// `"healthy"` when the pipeline is ready, `"degraded"` otherwise.
    status: &'static str,
    study_partner_initialized: bool,
    vector_index: String,
    embedding_model: String,
    version: &'static str,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let initialized = state.pipeline.is_some();
    Json(HealthResponse {
        status: if initialized { "healthy" } else { "degraded" },
        study_partner_initialized: initialized,
        vector_index: state.vector_index_label(),
        embedding_model: state.embedding_model.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Study ============

#[derive(Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, AppError> {
    let req = json_body(payload)?;
    check_len("question", &req.question, 3, 1000)?;
    if let Some(top_k) = req.top_k {
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(bad_request(format!("top_k must be between 1 and {}", MAX_TOP_K)));
        }
    }

    let pipeline = state.pipeline()?;
    let result = pipeline
        .query(&req.question, req.session_id.as_deref(), req.top_k, true)
        .await
        .map_err(|e| study_error("Query failed", e))?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct ExplainRequest {
    pub concept: String,
    #[serde(default)]
    pub detail_level: Option<String>,
}

async fn handle_explain(
    State(state): State<AppState>,
    payload: Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, AppError> {
    let req = json_body(payload)?;
    check_len("concept", &req.concept, 2, 200)?;
    let level = DetailLevel::parse(req.detail_level.as_deref().unwrap_or("medium"));

    let pipeline = state.pipeline()?;
    let result = pipeline
        .explain_concept(&req.concept, level)
        .await
        .map_err(|e| study_error("Explanation failed", e))?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct CompareRequest {
    pub service1: String,
    pub service2: String,
    #[serde(default)]
    pub aspects: Option<Vec<String>>,
}

async fn handle_compare(
    State(state): State<AppState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, AppError> {
    let req = json_body(payload)?;
    check_len("service1", &req.service1, 2, 100)?;
    check_len("service2", &req.service2, 2, 100)?;
    let aspects: Vec<String> = req
        .aspects
        .unwrap_or_default()
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

    let pipeline = state.pipeline()?;
    let result = pipeline
        .compare_services(&req.service1, &req.service2, &aspects)
        .await
        .map_err(|e| study_error("Comparison failed", e))?;
    Ok(Json(result))
}

// ============ Quiz ============

fn default_num_questions() -> usize {
    5
}

#[derive(Deserialize)]
pub struct QuizRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_num_questions")]
    pub num_questions: usize,
    #[serde(default)]
    pub difficulty: Option<String>,
}

async fn handle_quiz_generate(
    State(state): State<AppState>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Result<Json<QuizResponse>, AppError> {
    let req = json_body(payload)?;
    if !(1..=MAX_QUIZ_QUESTIONS).contains(&req.num_questions) {
        return Err(bad_request(format!(
            "num_questions must be between 1 and {}",
            MAX_QUIZ_QUESTIONS
        )));
    }
    // An empty difficulty means the default.
    if let Some(difficulty) = req.difficulty.as_deref().map(str::trim) {
        if !matches!(difficulty, "" | "easy" | "medium" | "hard") {
            return Err(bad_request("difficulty must be one of: easy, medium, hard"));
        }
    }

    let pipeline = state.pipeline()?;
    let quiz = pipeline
        .generate_quiz(
            req.topic.as_deref(),
            req.num_questions,
            req.difficulty.as_deref(),
        )
        .await
        .map_err(|e| study_error("Quiz generation failed", e))?;
    Ok(Json(quiz))
}

#[derive(Deserialize)]
pub struct QuizSubmission {
    pub quiz_id: String,
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

async fn handle_quiz_submit(
    State(state): State<AppState>,
    payload: Result<Json<QuizSubmission>, JsonRejection>,
) -> Result<Json<QuizResult>, AppError> {
    let req = json_body(payload)?;
    if req.quiz_id.trim().is_empty() {
        return Err(bad_request("quiz_id must not be empty"));
    }
    let result = quiz::submit_answers(state.quizzes.as_ref(), &req.quiz_id, &req.answers)
        .await
        .map_err(|e| study_error("Quiz grading failed", e))?;
    Ok(Json(result))
}

// ============ Topics, sessions, stats ============

#[derive(Serialize)]
struct TopicsResponse {
    topics: &'static [Topic],
    total: usize,
}

async fn handle_topics() -> Json<TopicsResponse> {
    let topics = topics();
    Json(TopicsResponse {
        topics,
        total: topics.len(),
    })
}

async fn handle_session_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, AppError> {
    let pipeline = state.pipeline()?;
    let info = pipeline
        .session_info(&id)
        .await
        .map_err(|e| study_error("Failed to get session", e))?;
    Ok(Json(info))
}

#[derive(Serialize)]
struct SessionClearedResponse {
    message: &'static str,
    session_id: String,
}

async fn handle_session_clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionClearedResponse>, AppError> {
    let pipeline = state.pipeline()?;
    pipeline
        .clear_session(&id)
        .await
        .map_err(|e| study_error("Failed to clear session", e))?;
    Ok(Json(SessionClearedResponse {
        message: "Session cleared successfully",
        session_id: id,
    }))
}

#[derive(Serialize)]
struct StatsResponse {
    study_partner_initialized: bool,
    active_sessions: usize,
    active_quizzes: usize,
    total_quiz_questions: usize,
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let read = |e: anyhow::Error| internal(format!("Failed to read stats: {}", e));
    Ok(Json(StatsResponse {
        study_partner_initialized: state.pipeline.is_some(),
        active_sessions: state.sessions.session_count().await.map_err(read)?,
        active_quizzes: state.quizzes.count().await.map_err(read)?,
        total_quiz_questions: state.quizzes.total_questions().await.map_err(read)?,
    }))
}
