//! HTTP API exposing the engine as a small fixed set of named operations
//!
//! Transport only: validation and all semantics live in the learner. The
//! surface is deliberately tiny: feedback in, suggestions/report/enhanced
//! prompt out, plus a health probe.

use crate::error::SqlSageError;
use crate::learn::FeedbackLearner;
use crate::types::{AccuracyReport, FeedbackSubmission, RecordId, SuggestionBundle};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 8475).into(),
        }
    }
}

/// Shared handler state
#[derive(Clone)]
struct AppState {
    learner: Arc<FeedbackLearner>,
}

/// Error wrapper mapping engine errors onto status codes
struct ApiError(SqlSageError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SqlSageError::Validation(_) => StatusCode::BAD_REQUEST,
            SqlSageError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<SqlSageError> for ApiError {
    fn from(err: SqlSageError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    records: u64,
    embedder: &'static str,
}

#[derive(Serialize)]
struct FeedbackResponse {
    record_id: RecordId,
}

#[derive(Deserialize)]
struct SuggestionsRequest {
    original_query: String,
}

#[derive(Deserialize)]
struct EnhanceRequest {
    base_prompt: String,
    query: String,
}

#[derive(Serialize)]
struct EnhanceResponse {
    prompt: String,
}

/// Build the router
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/feedback", post(feedback_handler))
        .route("/suggestions", post(suggestions_handler))
        .route("/report", get(report_handler))
        .route("/enhance", post(enhance_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until interrupted, then flush the learner state
pub async fn serve(learner: Arc<FeedbackLearner>, config: ApiServerConfig) -> crate::error::Result<()> {
    let state = AppState {
        learner: Arc::clone(&learner),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("API server listening on {}", config.addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| SqlSageError::Other(format!("API server error: {}", e)))?;

    learner.flush().await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        records: state.learner.record_count(),
        embedder: if state.learner.embedder_available() {
            "available"
        } else {
            "unavailable"
        },
    })
}

async fn feedback_handler(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackSubmission>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    // Malformed or incomplete payloads are validation failures, not 422s
    let Json(submission) =
        payload.map_err(|e| ApiError(SqlSageError::Validation(e.body_text())))?;

    let record_id = state.learner.record_feedback(submission).await?;
    Ok(Json(FeedbackResponse { record_id }))
}

async fn suggestions_handler(
    State(state): State<AppState>,
    Json(request): Json<SuggestionsRequest>,
) -> Result<Json<SuggestionBundle>, ApiError> {
    let bundle = state.learner.suggest(&request.original_query).await?;
    Ok(Json(bundle))
}

async fn report_handler(State(state): State<AppState>) -> Json<AccuracyReport> {
    Json(state.learner.report().await)
}

async fn enhance_handler(
    State(state): State<AppState>,
    Json(request): Json<EnhanceRequest>,
) -> Result<Json<EnhanceResponse>, ApiError> {
    let prompt = state
        .learner
        .enhance_prompt(&request.base_prompt, &request.query)
        .await?;
    Ok(Json(EnhanceResponse { prompt }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response =
            ApiError(SqlSageError::Validation("bad rating".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_maps_to_service_unavailable() {
        let response =
            ApiError(SqlSageError::Persistence("disk full".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_other_errors_map_to_internal() {
        let response = ApiError(SqlSageError::Other("boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
