//! HTTP chat API.
//!
//! Exposes the retrieval-augmented chat loop over a JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `POST`   | `/chat` | Send a message, receive a reply with RAG context |
//! | `GET`    | `/chat/history/{session_id}` | Retrieve a session's history |
//! | `DELETE` | `/chat/history/{session_id}` | Clear a session's history |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one JSON schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502), `internal` (500).
//! Every upstream model failure collapses to `upstream_error` with no cause
//! classification.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::chat;
use crate::config::Config;
use crate::db;
use crate::ingest;
use crate::migrate;
use crate::models::Turn;
use crate::retrieve;
use crate::session::{InMemorySessions, SessionStore};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    sessions: Arc<dyn SessionStore>,
}

/// Starts the chat API server with the default in-memory session store.
///
/// Runs migrations, performs startup ingestion of the docs directory
/// (skipped with a warning if the directory is missing), then binds to
/// `[server].bind` and serves until the process is terminated.
///
/// # Errors
///
/// Fails fast before binding when the configured LLM provider needs an
/// API key and `OPENAI_API_KEY` is not set.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let sessions = Arc::new(InMemorySessions::new(config.session.max_turns));
    run_server_with_store(config, sessions).await
}

/// Starts the chat API server with an injected session store.
///
/// Like [`run_server`], but the caller supplies the [`SessionStore`]
/// implementation (e.g. a durable backend instead of process memory).
pub async fn run_server_with_store(
    config: &Config,
    sessions: Arc<dyn SessionStore>,
) -> anyhow::Result<()> {
    // A missing key is fatal before binding, not on the first request.
    let needs_key = config.llm.requires_api_key() || config.embedding.provider == "openai";
    if needs_key && std::env::var("OPENAI_API_KEY").is_err() {
        anyhow::bail!("OPENAI_API_KEY is not set but an 'openai' provider is configured");
    }

    migrate::run_migrations(config).await?;

    let pool = db::connect(config).await?;

    let summary = ingest::ingest_documents(config, &pool, false).await?;
    info!(
        indexed = summary.indexed,
        skipped = summary.skipped_unchanged,
        chunks = summary.chunks_written,
        "startup ingestion complete"
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        sessions,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route(
            "/chat/history/{session_id}",
            get(handle_get_history).delete(handle_clear_history),
        )
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    info!("chat API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Error type every handler returns; renders the shared JSON envelope.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    /// Language-model call failures. Auth, quota, network, and
    /// malformed-response failures all collapse to this one kind.
    fn upstream(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream_error",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

/// JSON request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    session_id: String,
    message: String,
}

/// JSON response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    session_id: String,
    reply: String,
    context_used: String,
}

/// Handler for `POST /chat`.
///
/// Retrieves context for the message, asks the language model with the
/// session's prior turns as history, appends the new user/assistant turn
/// pair to the session, and returns the reply with the context used.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(AppError::bad_request("session_id must not be empty"));
    }
    if req.message.trim().is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }

    let history = state
        .sessions
        .history(&req.session_id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    let retrieved = retrieve::retrieve_context(
        &state.config,
        &state.pool,
        &req.message,
        state.config.retrieval.top_k,
    )
    .await
    .map_err(|e| {
        error!("retrieval failed: {}", e);
        AppError::internal(format!("retrieval failed: {}", e))
    })?;

    let reply = chat::respond(&state.config, &req.message, &retrieved.formatted, &history)
        .await
        .map_err(|e| {
            error!("model call failed: {}", e);
            AppError::upstream(format!("model call failed: {}", e))
        })?;

    state
        .sessions
        .append(&req.session_id, Turn::user(req.message.clone()))
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;
    state
        .sessions
        .append(&req.session_id, Turn::assistant(reply.clone()))
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(ChatResponse {
        session_id: req.session_id,
        reply,
        context_used: retrieved.formatted,
    }))
}

// ============ GET /chat/history/{session_id} ============

/// JSON response body for `GET /chat/history/{session_id}`.
#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    history: Vec<Turn>,
}

/// Handler for `GET /chat/history/{session_id}`.
///
/// An unknown session returns an empty history, not an error.
async fn handle_get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state
        .sessions
        .history(&session_id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(HistoryResponse {
        session_id,
        history,
    }))
}

// ============ DELETE /chat/history/{session_id} ============

/// JSON response body for `DELETE /chat/history/{session_id}`.
#[derive(Serialize)]
struct ClearResponse {
    message: String,
}

/// Handler for `DELETE /chat/history/{session_id}`.
///
/// Clearing an unknown session succeeds as a no-op.
async fn handle_clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    state
        .sessions
        .clear(&session_id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(ClearResponse {
        message: format!("Session {} cleared.", session_id),
    }))
}
