
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::RagError;
use crate::engine::{AnswerResult, EngineStatus, RagEngine};
use crate::store::Document;

/// HTTP error wrapper mapping [`RagError`] kinds onto statuses.
///
/// Client mistakes are 4xx, backend trouble is 502, everything else 500. The
/// body always carries `{error, kind}` so callers can branch without parsing
/// prose.
#[derive(Debug)]
pub struct ApiError(RagError);

impl From<RagError> for ApiError {
    #[inline]
    fn from(error: RagError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RagError::InvalidSession | RagError::InvalidQuestion => StatusCode::BAD_REQUEST,
            RagError::IndexNotLoaded => StatusCode::CONFLICT,
            RagError::EmbeddingBackend(_) | RagError::GenerationBackend(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = json!({
            "error": self.0.to_string(),
            "kind": error_kind(&self.0),
        });
        (status, Json(body)).into_response()
    }
}

fn error_kind(error: &RagError) -> &'static str {
    match error {
        RagError::EmptyDocumentSet => "empty_document_set",
        RagError::IndexNotLoaded => "index_not_loaded",
        RagError::InvalidSession => "invalid_session",
        RagError::InvalidQuestion => "invalid_question",
        RagError::EmbeddingBackend(_) => "embedding_backend",
        RagError::GenerationBackend(_) => "generation_backend",
        RagError::Index(_) => "index",
        RagError::Config(_) => "config",
        RagError::Io(_) => "io",
        RagError::Other(_) => "internal",
    }
}

#[derive(Debug, Deserialize)]
pub struct BuildIndexRequest {
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub question: String,
    pub top_k: Option<usize>,
}

/// Build the HTTP surface over a shared engine.
#[inline]
pub fn router(engine: Arc<RagEngine>) -> Router {
    Router::new()
        .route("/build-index", post(build_index))
        .route("/chat", post(chat))
        .route("/status", get(status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn build_index(
    State(engine): State<Arc<RagEngine>>,
    Json(payload): Json<BuildIndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match engine.build(payload.documents).await {
        Ok(summary) => Ok(Json(json!({
            "success": true,
            "index_loaded": true,
            "documents": summary.documents,
            "generation": summary.generation,
        }))),
        // An empty batch is a status result, not a failure of the service.
        Err(error @ RagError::EmptyDocumentSet) => {
            let state = engine.status().await;
            Ok(Json(json!({
                "success": false,
                "index_loaded": state.index_loaded,
                "message": error.to_string(),
            })))
        }
        Err(error) => Err(ApiError(error)),
    }
}

async fn chat(
    State(engine): State<Arc<RagEngine>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<AnswerResult>, ApiError> {
    let result = engine
        .answer(&payload.session_id, &payload.question, payload.top_k)
        .await?;
    Ok(Json(result))
}

async fn status(State(engine): State<Arc<RagEngine>>) -> Json<EngineStatus> {
    Json(engine.status().await)
}

#[expect(clippy::unused_async, reason = "axum handlers must be async")]
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
