//! Picture API endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::ServiceError;

use super::{AccountId, AppState, DeleteResponse};

/// Raw picture bytes with their stored MIME type
pub async fn picture_data_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let picture = state.service.picture_data(&account_id, &id)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, picture.mime_type)],
        picture.data,
    )
        .into_response())
}

pub async fn delete_picture_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ServiceError> {
    state.service.delete_picture(&account_id, &id)?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Picture deleted".to_string(),
    }))
}
