//! The contract the external media worker integrates through.
//!
//! A worker loops over [`WorkerGateway::claim_next`], processes the claimed
//! record, and reports back with [`WorkerGateway::apply_result`] (or
//! [`WorkerGateway::attach_revision`] for edit jobs). Nothing here runs a
//! consumer loop itself.

use clipchat_models::{ClipRecord, JobEvent, JobId, JobRecord, JobStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{QueueError, QueueResult};
use crate::jobs::{failure_message, JobStore};
use crate::queue::WorkQueue;
use crate::revision::{RevisionChain, RevisionOutcome, RevisionOutput};

/// Terminal result of processing one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// `done` or `error`
    pub status: JobStatus,
    #[serde(default)]
    pub error: String,
    /// Replaces the job's clips wholesale
    #[serde(default)]
    pub clips: Vec<ClipRecord>,
    /// Generation from the claim. When set, a result for an older run is
    /// discarded.
    #[serde(default)]
    pub generation: Option<u64>,
}

impl JobResult {
    pub fn done(clips: Vec<ClipRecord>) -> Self {
        Self {
            status: JobStatus::Done,
            error: String::new(),
            clips,
            generation: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            error: error.into(),
            clips: Vec::new(),
            generation: None,
        }
    }

    pub fn for_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}

/// Outcome of popping the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    Empty,
    /// Popped an id whose record is gone or no longer `queued`.
    Skipped(JobId),
    /// The record, now `processing`.
    Claimed(JobRecord),
}

/// Outcome of reporting a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(JobStatus),
    /// The job was re-queued since the claim; the result was dropped.
    Superseded,
}

#[derive(Clone)]
pub struct WorkerGateway {
    jobs: JobStore,
    queue: WorkQueue,
    revisions: RevisionChain,
}

impl WorkerGateway {
    pub fn new(jobs: JobStore, queue: WorkQueue, revisions: RevisionChain) -> Self {
        Self {
            jobs,
            queue,
            revisions,
        }
    }

    /// Pop the oldest id and move its job to `processing`.
    ///
    /// Redundant entries (re-queued ids, jobs already picked up or finished)
    /// are consumed and reported as [`Claim::Skipped`].
    pub async fn claim_next(&self) -> QueueResult<Claim> {
        let Some(id) = self.queue.dequeue().await? else {
            return Ok(Claim::Empty);
        };

        match self
            .jobs
            .transition(&id, JobEvent::Claim, |_| Ok(Vec::new()))
            .await
        {
            Ok(record) => Ok(Claim::Claimed(record)),
            Err(QueueError::NotFound(_)) => {
                warn!(job_id = %id, "Popped id without a record");
                Ok(Claim::Skipped(id))
            }
            Err(QueueError::InvalidTransition(e)) => {
                debug!(job_id = %id, status = %e.from, "Skipping redundant queue entry");
                Ok(Claim::Skipped(id))
            }
            Err(e) => Err(e),
        }
    }

    /// Record the terminal status of a `processing` job.
    pub async fn apply_result(&self, id: &JobId, result: JobResult) -> QueueResult<ApplyOutcome> {
        let event = match result.status {
            JobStatus::Done => JobEvent::Succeed,
            JobStatus::Error => JobEvent::Fail,
            other => {
                return Err(QueueError::validation(format!(
                    "result status must be done or error, got {}",
                    other
                )))
            }
        };

        if let Some(i) = result.clips.iter().position(|c| !c.has_valid_extent()) {
            return Err(QueueError::validation(format!(
                "clip {} must satisfy 0 <= start < end",
                i
            )));
        }

        let error = match event {
            JobEvent::Fail => failure_message(&result.error),
            _ => String::new(),
        };
        let clips_json = serde_json::to_string(&result.clips)?;

        let applied = self
            .jobs
            .transition(id, event, |record| {
                if let Some(generation) = result.generation {
                    if generation != record.generation {
                        return Err(QueueError::Superseded(id.clone()));
                    }
                }
                if record.is_edit() && (event == JobEvent::Succeed || !result.clips.is_empty()) {
                    return Err(QueueError::validation(
                        "edit jobs complete by attaching a revision, not clips",
                    ));
                }
                Ok(vec![
                    (codec::ERROR, error.clone()),
                    (codec::CLIPS, clips_json.clone()),
                ])
            })
            .await;

        match applied {
            Ok(record) => {
                info!(job_id = %id, status = %record.status, clips = result.clips.len(), "Applied result");
                Ok(ApplyOutcome::Applied(record.status))
            }
            Err(QueueError::Superseded(_)) => {
                info!(job_id = %id, generation = ?result.generation, "Discarding superseded result");
                Ok(ApplyOutcome::Superseded)
            }
            Err(e) => Err(e),
        }
    }

    /// Finish an edit job by attaching its output to the parent clip.
    pub async fn attach_revision(
        &self,
        edit_job_id: &JobId,
        output: RevisionOutput,
    ) -> QueueResult<RevisionOutcome> {
        self.revisions.attach_revision(edit_job_id, output).await
    }
}
