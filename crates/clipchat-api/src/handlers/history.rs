//! History handler.

use axum::extract::{Query, State};
use axum::Json;
use clipchat_models::JobRecord;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub jobs: Vec<JobRecord>,
}

/// `GET /api/history[?limit=n]`, most recent first.
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let limit = params.limit.unwrap_or(state.config.history_page_size);
    let jobs = state.core.jobs.recent(limit).await?;
    Ok(Json(HistoryResponse { jobs }))
}
