//! REST API Server for the classification service
//!
//! Exposes decisions, decision history and the review queue over HTTP

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::error::ClassificationError;
use crate::ingest::parse_document_type;
use crate::models::RawSignal;
use crate::service::{ClassificationOutcome, ClassificationService, DocumentSignals};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassifyRequest {
    pub document_ref: Option<String>,
    #[serde(default)]
    pub signals: Vec<RawSignal>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub documents: Vec<DocumentSignals>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub document_type: String,
    pub reviewer: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn error_response(e: ClassificationError) -> ApiResult {
    let status = match &e {
        ClassificationError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        ClassificationError::UnknownDocumentType(_) | ClassificationError::InvalidSignal { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::error(e.to_string())))
}

fn outcome_json(outcome: &ClassificationOutcome) -> serde_json::Value {
    serde_json::json!({
        "result": outcome.record.summary(),
        "record": outcome.record,
        "persistence_error": outcome.persistence_error,
        "review_error": outcome.review_error,
    })
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ClassificationService>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "document_types": state.service.engine().registry().all_types(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Classification Endpoints
/// =============================

async fn classify(
    State(state): State<ApiState>,
    Json(req): Json<ClassifyRequest>,
) -> ApiResult {
    let document_ref = req
        .document_ref
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(document_ref = %document_ref, signals = req.signals.len(), "Classification request");

    let outcome = state.service.classify(&document_ref, &req.signals).await;

    // the decision is returned even when the audit write failed
    (StatusCode::OK, Json(ApiResponse::success(outcome_json(&outcome))))
}

async fn classify_batch(
    State(state): State<ApiState>,
    Json(req): Json<BatchRequest>,
) -> ApiResult {
    info!(documents = req.documents.len(), "Batch classification request");

    let outcomes = state.service.classify_batch(&req.documents).await;
    let results: Vec<serde_json::Value> = outcomes.iter().map(outcome_json).collect();

    (StatusCode::OK, Json(ApiResponse::success(results)))
}

/// =============================
/// Decision Record Endpoints
/// =============================

async fn get_decision(
    State(state): State<ApiState>,
    Path(record_id): Path<Uuid>,
) -> ApiResult {
    match state.service.get_record(record_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(ApiResponse::success(record))),
        Ok(None) => error_response(ClassificationError::RecordNotFound(record_id)),
        Err(e) => error_response(e),
    }
}

async fn decision_history(
    State(state): State<ApiState>,
    Path(record_id): Path<Uuid>,
) -> ApiResult {
    match state.service.history(record_id).await {
        Ok(chain) => (StatusCode::OK, Json(ApiResponse::success(chain))),
        Err(e) => error_response(e),
    }
}

async fn submit_correction(
    State(state): State<ApiState>,
    Path(record_id): Path<Uuid>,
    Json(req): Json<CorrectionRequest>,
) -> ApiResult {
    let Some(corrected_type) = parse_document_type(&req.document_type) else {
        return error_response(ClassificationError::UnknownDocumentType(req.document_type));
    };

    match state
        .service
        .submit_correction(record_id, corrected_type, &req.reviewer)
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(ApiResponse::success(record))),
        Err(e) => error_response(e),
    }
}

async fn pending_reviews(State(state): State<ApiState>) -> ApiResult {
    match state.service.pending_reviews().await {
        Ok(tickets) => (StatusCode::OK, Json(ApiResponse::success(tickets))),
        Err(e) => error_response(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(service: Arc<ClassificationService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/classify", post(classify))
        .route("/api/classify/batch", post(classify_batch))
        .route("/api/decisions/:record_id", get(get_decision))
        .route("/api/decisions/:record_id/history", get(decision_history))
        .route("/api/decisions/:record_id/corrections", post(submit_correction))
        .route("/api/review/pending", get(pending_reviews))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<ClassificationService>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
