//! Cooperative job polling.

use std::time::Duration;

use clipchat_models::{JobId, JobRecord, JobStatus};
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::config::PollerConfig;
use crate::error::ClientResult;

/// Re-reads a job until it reaches `done` or `error`.
#[derive(Clone)]
pub struct JobPoller {
    client: ApiClient,
    interval: Duration,
}

impl JobPoller {
    pub fn new(client: ApiClient, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let config = PollerConfig::from_env();
        Ok(Self::new(ApiClient::new(&config)?, config.interval))
    }

    /// Poll `id`, handing every observed record to `on_update`, and return
    /// the terminal one.
    ///
    /// A failed read ends the watch: the last observed record is marked
    /// `status=error` with the failure message, reported through
    /// `on_update` and returned.
    pub async fn watch<F>(&self, id: &JobId, mut on_update: F) -> JobRecord
    where
        F: FnMut(&JobRecord),
    {
        let mut last: Option<JobRecord> = None;
        loop {
            let record = match self.client.get_job(id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(job_id = %id, "Polling stopped: {}", e);
                    let failed = failure_record(id, last, e.to_string());
                    on_update(&failed);
                    return failed;
                }
            };

            on_update(&record);
            if record.is_terminal() {
                debug!(job_id = %id, status = %record.status.as_str(), "Job finished");
                return record;
            }
            last = Some(record);

            tokio::time::sleep(self.interval).await;
        }
    }
}

/// What the caller shows when the job can no longer be read: the last
/// record seen, or a bare one when nothing was read yet.
fn failure_record(id: &JobId, last: Option<JobRecord>, message: String) -> JobRecord {
    let mut record = last.unwrap_or_else(|| {
        let mut record = JobRecord::draft(String::new());
        record.id = id.clone();
        record
    });
    record.status = JobStatus::Error;
    record.error = message;
    record
}
