//! HTTP API for the Folio service.
//!
//! This module provides the REST API endpoints for:
//! - Health monitoring
//! - Document upload, listing, download and deletion
//! - Picture access and deletion
//! - Year histogram and search
//! - Account profile and account deletion
//!
//! Callers are authenticated upstream; the account identity arrives in the
//! `X-Account-Id` header.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequestParts, State},
    http::{StatusCode, request::Parts},
    routing::{delete, get},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ErrorResponse;
use crate::service::FolioService;

pub mod account;
pub mod aggregation;
pub mod documents;
pub mod pictures;
use account::{delete_account_handler, get_profile_handler, update_profile_handler};
use aggregation::{histogram_handler, search_handler};
use documents::{
    count_documents_handler, delete_document_handler, document_file_handler,
    document_pictures_handler, list_documents_handler, upload_document_handler,
};
use pictures::{delete_picture_handler, picture_data_handler};

/// Header carrying the authenticated account id
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Room for the multipart framing and text fields around the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<FolioService>,
    pub start_time: Instant,
}

/// Authenticated account of the current request
#[derive(Debug, Clone)]
pub struct AccountId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for AccountId {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| AccountId(value.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        message: "Missing account identity".to_string(),
                        code: Some("unauthorized".to_string()),
                    }),
                )
            })
    }
}

/// Response for delete operations
#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Body size limit for uploads
pub(crate) fn upload_body_limit(service: &FolioService) -> usize {
    usize::try_from(service.max_document_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

/// Build the API router
pub fn router(service: Arc<FolioService>) -> Router {
    let max_body_size = upload_body_limit(&service);

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Document endpoints - with larger body limit for file uploads
        .route(
            "/documents",
            get(list_documents_handler)
                .post(upload_document_handler)
                .layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/documents/count", get(count_documents_handler))
        .route("/documents/{id}", delete(delete_document_handler))
        .route("/documents/{id}/file", get(document_file_handler))
        .route("/documents/{id}/pictures", get(document_pictures_handler))
        // Picture endpoints
        .route("/pictures/{id}", delete(delete_picture_handler))
        .route("/pictures/{id}/data", get(picture_data_handler))
        // Aggregation endpoints
        .route("/histogram", get(histogram_handler))
        .route("/search", get(search_handler))
        // Account endpoints
        .route(
            "/account",
            get(get_profile_handler)
                .put(update_profile_handler)
                .delete(delete_account_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}
