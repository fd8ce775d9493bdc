//! Edit job handlers.

use axum::extract::State;
use axum::Json;
use clipchat_models::{JobId, JobKind, NewEditJob};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::extract::LenientJson;
use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEditResponse {
    pub edit_job_id: JobId,
}

/// `POST /api/edit` with `{parentJobId, parentClipIndex, userPrompt}`.
///
/// The edit job is queued straight away. Whether the parent and clip exist
/// is checked when the revision is attached.
pub async fn create_edit(
    State(state): State<AppState>,
    body: LenientJson,
) -> ApiResult<Json<CreateEditResponse>> {
    let input: NewEditJob = serde_json::from_value(body.into_value())
        .map_err(|e| ApiError::validation(format!("invalid edit request: {}", e)))?;

    let record = state.core.revisions.create_edit(&input).await?;
    metrics::record_job_created(JobKind::Edit.as_str());

    Ok(Json(CreateEditResponse {
        edit_job_id: record.id,
    }))
}
