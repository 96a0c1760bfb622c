//! JSON HTTP server for chat front-ends.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer a question: `{"question": "..."}` → `{"answer": "...", "sources": [...]}` |
//! | `GET`  | `/health` | Health check (returns version and document count) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Queries are serialized: one question is answered at a time. `/health`
//! never waits on an in-flight query.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::models::QueryResult;
use crate::pipeline::Pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    /// Held for the duration of one `/query`.
    query_gate: Arc<Mutex<()>>,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

fn error_response(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }),
    )
        .into_response()
}

/// Build the router. Exposed separately from [`run_server`] so callers can
/// bind their own listener.
pub fn router(pipeline: Pipeline) -> Router {
    let state = AppState {
        pipeline: Arc::new(pipeline),
        query_gate: Arc::new(Mutex::new(())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &ServerConfig, pipeline: Pipeline) -> anyhow::Result<()> {
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
        }
    };

    let question = req.question.trim();
    if question.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "question must not be empty",
        );
    }

    let _gate = state.query_gate.lock().await;
    let result: QueryResult = state.pipeline.query(question).await;
    Json(result).into_response()
}

async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let documents = state.pipeline.len();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "documents": documents,
    }))
}
