//! Job handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use clipchat_models::{JobId, JobKind, JobRecord};
use clipchat_queue::codec::coerce_messages;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::extract::LenientJson;
use crate::metrics;
use crate::services::PlanInput;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

/// `{ok}` acknowledgement, with the failure when `ok` is false.
#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateParams {
    /// Run the planner again instead of re-queueing the stored plan
    #[serde(default)]
    pub replan: bool,
}

/// `POST /api/jobs` with `{sourceRef}` (legacy `youtubeUrl` accepted).
pub async fn create_job(
    State(state): State<AppState>,
    body: LenientJson,
) -> ApiResult<Json<CreateJobResponse>> {
    let source_ref = body
        .str_field(&["sourceRef", "youtubeUrl"])
        .ok_or_else(|| ApiError::validation("sourceRef required"))?;

    let record = state.core.jobs.create(source_ref).await?;
    metrics::record_job_created(JobKind::Generate.as_str());

    Ok(Json(CreateJobResponse { job_id: record.id }))
}

/// `GET /api/jobs/:id`
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    let record = state.core.jobs.get(&JobId::from(id)).await?;
    Ok(Json(record))
}

/// `POST /api/jobs/:id/messages` with `{messages}`.
pub async fn set_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: LenientJson,
) -> ApiResult<Json<OkResponse>> {
    let messages = body.get("messages").cloned().unwrap_or(Value::Null);
    state
        .core
        .jobs
        .set_messages(&JobId::from(id), &messages)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `POST /api/jobs/:id/plan` with optional `{config, messages}`.
///
/// Without `config` the planner is asked. A planner failure leaves the job
/// in `error` and answers 502.
pub async fn plan_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: LenientJson,
) -> ApiResult<Json<OkResponse>> {
    let input = PlanInput {
        config: body.get("config").cloned(),
        messages: body.get("messages").map(coerce_messages),
    };

    state
        .generation
        .plan_and_enqueue(&JobId::from(id), input)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `POST /api/jobs/:id/generate[?replan=true]`
///
/// Re-queues the stored plan, or plans again first with `replan`. Planner
/// failures are reported on the job itself (`status=error`) and in the
/// body, not as an HTTP failure.
pub async fn generate_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<GenerateParams>,
) -> ApiResult<Json<OkResponse>> {
    let id = JobId::from(id);

    if !params.replan {
        state.generation.requeue(&id).await?;
        return Ok(Json(OkResponse::ok()));
    }

    match state.generation.plan_and_enqueue(&id, PlanInput::default()).await {
        Ok(_) => Ok(Json(OkResponse::ok())),
        Err(ApiError::Planner(e)) => {
            info!(job_id = %id, "Generate finished with planner failure");
            Ok(Json(OkResponse::failed(e.to_string())))
        }
        Err(e) => Err(e),
    }
}
