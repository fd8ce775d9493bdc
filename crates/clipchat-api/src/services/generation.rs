//! Plan-then-enqueue.
//!
//! The config write always lands before the queue push, so a worker never
//! pops an id whose config is stale. A planner failure marks the job
//! `error` and nothing is pushed.

use std::sync::Arc;

use clipchat_models::{ChatMessage, JobEvent, JobId, JobRecord};
use clipchat_planner::{PlanRequest, Planner};
use clipchat_queue::{JobStore, QueueResult, WorkQueue};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::metrics;

/// Caller-supplied plan inputs. Missing parts come from the stored record
/// (messages) or the planner (config).
#[derive(Debug, Clone, Default)]
pub struct PlanInput {
    pub config: Option<Value>,
    pub messages: Option<Vec<ChatMessage>>,
}

#[derive(Clone)]
pub struct GenerationService {
    jobs: JobStore,
    queue: WorkQueue,
    planner: Arc<dyn Planner>,
}

impl GenerationService {
    pub fn new(jobs: JobStore, queue: WorkQueue, planner: Arc<dyn Planner>) -> Self {
        Self {
            jobs,
            queue,
            planner,
        }
    }

    /// Materialize config (planner unless supplied), persist it with the
    /// messages and `queued`, then push the job.
    pub async fn plan_and_enqueue(&self, id: &JobId, input: PlanInput) -> ApiResult<JobRecord> {
        let record = self.jobs.get(id).await?;
        record.status.apply(JobEvent::Plan)?;

        let messages = input.messages.unwrap_or_else(|| record.messages.clone());
        let config = match input.config {
            Some(config) => config,
            None => {
                let request = PlanRequest::new(record.source_ref.clone(), messages.clone());
                match self.planner.plan(&request).await {
                    Ok(config) => config,
                    Err(e) => {
                        metrics::record_planner_failure();
                        warn!(job_id = %id, "Planning failed: {}", e);
                        self.jobs.mark_failed(id, &e.to_string()).await?;
                        return Err(e.into());
                    }
                }
            }
        };

        let planned = self.jobs.set_plan(id, config, messages).await?;
        self.enqueue(id).await?;
        info!(job_id = %id, generation = planned.generation, "Job planned and queued");
        Ok(planned)
    }

    /// Queue the job again with its stored config.
    pub async fn requeue(&self, id: &JobId) -> ApiResult<JobRecord> {
        let queued = self.jobs.mark_queued(id).await?;
        self.enqueue(id).await?;
        info!(job_id = %id, generation = queued.generation, "Job re-queued");
        Ok(queued)
    }

    /// The job is already `queued` at this point, so a push that fails
    /// after retries can be repeated by calling generate again.
    async fn enqueue(&self, id: &JobId) -> QueueResult<()> {
        self.queue.enqueue_with_retry(id).await?;
        metrics::record_job_enqueued();
        Ok(())
    }
}
