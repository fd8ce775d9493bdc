//! ClipChat API HTTP client.

use clipchat_models::{ChatMessage, JobId, JobRecord, NewEditJob};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::PollerConfig;
use crate::error::{ClientError, ClientResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobResponse {
    job_id: JobId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEditResponse {
    edit_job_id: JobId,
}

#[derive(Deserialize)]
struct OkResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    jobs: Vec<JobRecord>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Typed wrapper over the `/api` routes.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: &PollerConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(&PollerConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Create a draft job for `source_ref`.
    pub async fn create_job(&self, source_ref: &str) -> ClientResult<JobId> {
        let body = json!({ "sourceRef": source_ref });
        let created: CreateJobResponse = self.send(self.http.post(self.url("/jobs")).json(&body)).await?;
        Ok(created.job_id)
    }

    pub async fn get_job(&self, id: &JobId) -> ClientResult<JobRecord> {
        self.send(self.http.get(self.url(&format!("/jobs/{}", id)))).await
    }

    /// Replace the job's conversation.
    pub async fn set_messages(&self, id: &JobId, messages: &[ChatMessage]) -> ClientResult<()> {
        let body = json!({ "messages": messages });
        let url = self.url(&format!("/jobs/{}/messages", id));
        self.send_ok(self.http.post(url).json(&body)).await
    }

    /// Plan and queue the job. Without `config` the server asks its planner.
    pub async fn plan(
        &self,
        id: &JobId,
        config: Option<Value>,
        messages: Option<&[ChatMessage]>,
    ) -> ClientResult<()> {
        let mut body = Map::new();
        if let Some(config) = config {
            body.insert("config".to_string(), config);
        }
        if let Some(messages) = messages {
            body.insert("messages".to_string(), json!(messages));
        }

        let url = self.url(&format!("/jobs/{}/plan", id));
        self.send_ok(self.http.post(url).json(&Value::Object(body))).await
    }

    /// Queue the job again, re-planning first when `replan` is set.
    pub async fn generate(&self, id: &JobId, replan: bool) -> ClientResult<()> {
        let mut url = self.url(&format!("/jobs/{}/generate", id));
        if replan {
            url.push_str("?replan=true");
        }
        self.send_ok(self.http.post(url)).await
    }

    /// Create an edit job for one clip of a finished job.
    pub async fn create_edit(&self, input: &NewEditJob) -> ClientResult<JobId> {
        let created: CreateEditResponse = self.send(self.http.post(self.url("/edit")).json(input)).await?;
        Ok(created.edit_job_id)
    }

    /// Recent jobs, most recent first.
    pub async fn history(&self, limit: Option<usize>) -> ClientResult<Vec<JobRecord>> {
        let mut request = self.http.get(self.url("/history"));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let page: HistoryResponse = self.send(request).await?;
        Ok(page.jobs)
    }

    async fn send_ok(&self, request: RequestBuilder) -> ClientResult<()> {
        let body: OkResponse = self.send(request).await?;
        if body.ok {
            Ok(())
        } else {
            Err(ClientError::PlanFailed(body.error.unwrap_or_default()))
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        let raw = response.text().await?;
        serde_json::from_str(&raw).map_err(|e| {
            debug!("Unexpected response body: {}", raw);
            ClientError::InvalidResponse(e.to_string())
        })
    }
}

/// Map a non-2xx response to [`ClientError::Api`], preferring the server's
/// `{error}` message over the raw body.
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .map(|b| b.error)
        .unwrap_or(raw);

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
