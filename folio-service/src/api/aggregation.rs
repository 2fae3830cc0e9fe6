//! Histogram and search endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::aggregation::{SearchFilter, SearchHit, YearHistogram};
use crate::error::ServiceError;

use super::{AccountId, AppState};

/// Search query parameters; dates are `YYYY-MM-DD`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub name: Option<String>,
    pub year: Option<String>,
    pub upload_date_start: Option<String>,
    pub upload_date_end: Option<String>,
    pub selected_article: Option<String>,
}

pub async fn histogram_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
) -> Result<Json<YearHistogram>, ServiceError> {
    Ok(Json(state.service.histogram(&account_id)?))
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, ServiceError> {
    let filter = SearchFilter::parse(
        params.name.as_deref(),
        params.year.as_deref(),
        params.upload_date_start.as_deref(),
        params.upload_date_end.as_deref(),
        params.selected_article.as_deref(),
    )?;

    Ok(Json(state.service.search(&account_id, &filter)?))
}
