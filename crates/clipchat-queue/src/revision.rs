//! Edit jobs and the revisions they attach to a parent job's clip.

use chrono::Utc;
use clipchat_models::{ClipRevision, JobEvent, JobId, JobRecord, NewEditJob};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

use crate::codec;
use crate::error::{QueueError, QueueResult};
use crate::jobs::JobStore;
use crate::queue::WorkQueue;

/// What the worker produced for an edit job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionOutput {
    pub url: String,
    /// Defaults to the edit's prompt
    #[serde(default)]
    pub note: Option<String>,
}

impl RevisionOutput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            note: None,
        }
    }
}

/// Result of [`RevisionChain::attach_revision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionOutcome {
    /// The revision is on the parent clip and the edit job is `done`.
    Attached {
        parent_job_id: JobId,
        clip_index: usize,
        revision_count: usize,
    },
    /// The target was gone; the edit job is `error` with this message.
    Rejected(String),
}

/// Creates edit jobs and links their output back to the targeted clip.
#[derive(Clone)]
pub struct RevisionChain {
    jobs: JobStore,
    queue: WorkQueue,
}

impl RevisionChain {
    pub fn new(jobs: JobStore, queue: WorkQueue) -> Self {
        Self { jobs, queue }
    }

    /// Create an edit job, already queued. The target clip is not checked
    /// here; that happens when the revision is attached.
    ///
    /// The push is retried on store failures. If it still fails the job
    /// stays `queued` and a requeue pushes it again.
    pub async fn create_edit(&self, input: &NewEditJob) -> QueueResult<JobRecord> {
        input
            .validate()
            .map_err(|e| QueueError::validation(describe(&e)))?;
        let target = input
            .target()
            .filter(|t| !t.parent_job_id.as_str().is_empty())
            .ok_or_else(|| QueueError::validation("parentJobId required"))?;

        let record = JobRecord::edit(target);
        self.jobs.insert(&record).await?;
        self.queue.enqueue_with_retry(&record.id).await?;

        info!(
            job_id = %record.id,
            parent_job_id = %input.parent_job_id,
            clip_index = ?input.parent_clip_index,
            "Created edit job"
        );
        Ok(record)
    }

    /// Append the edit's output as a revision of the parent clip, then mark
    /// the edit job `done`.
    ///
    /// Only valid while the edit job is `processing`. A revision already
    /// attached by this edit job is not appended twice. When the parent job
    /// or clip is missing the edit job is marked `error` instead.
    pub async fn attach_revision(
        &self,
        edit_job_id: &JobId,
        output: RevisionOutput,
    ) -> QueueResult<RevisionOutcome> {
        let edit = self.jobs.get(edit_job_id).await?;
        if !edit.is_edit() {
            return Err(QueueError::validation(format!(
                "job {} is not an edit job",
                edit_job_id
            )));
        }
        edit.status.apply(JobEvent::Succeed)?;

        let url = output.url.trim();
        if url.is_empty() {
            return Err(QueueError::validation("revision url required"));
        }

        let Some(target) = edit.edit else {
            return self.reject(edit_job_id, "edit job has no target clip".to_string()).await;
        };

        let revision = ClipRevision {
            url: url.to_string(),
            created_at: Utc::now(),
            note: output.note.unwrap_or_else(|| target.user_prompt.clone()),
            edit_job_id: Some(edit_job_id.to_string()),
        };
        let index = target.parent_clip_index;

        let mut clip_missing = false;
        let appended = self
            .jobs
            .update_clips(&target.parent_job_id, |clips| {
                let Some(clip) = clips.get_mut(index) else {
                    clip_missing = true;
                    return Ok(false);
                };
                clip_missing = false;
                if clip.has_revision_from(edit_job_id.as_str()) {
                    return Ok(false);
                }
                clip.revisions.push(revision.clone());
                Ok(true)
            })
            .await;

        let clips = match appended {
            Ok(clips) => clips,
            Err(e) if e.is_not_found() => {
                let message = format!("parent job {} no longer exists", target.parent_job_id);
                return self.reject(edit_job_id, message).await;
            }
            Err(e) => return Err(e),
        };
        if clip_missing {
            let message = format!(
                "clip {} does not exist on job {}",
                index, target.parent_job_id
            );
            return self.reject(edit_job_id, message).await;
        }

        let revision_count = clips.get(index).map(|c| c.revisions.len()).unwrap_or(0);
        self.jobs
            .transition(edit_job_id, JobEvent::Succeed, |_| {
                Ok(vec![(codec::ERROR, String::new())])
            })
            .await?;

        info!(
            job_id = %edit_job_id,
            parent_job_id = %target.parent_job_id,
            clip_index = index,
            revision_count,
            "Attached revision"
        );
        Ok(RevisionOutcome::Attached {
            parent_job_id: target.parent_job_id,
            clip_index: index,
            revision_count,
        })
    }

    async fn reject(&self, edit_job_id: &JobId, message: String) -> QueueResult<RevisionOutcome> {
        warn!(job_id = %edit_job_id, "Rejecting revision: {}", message);
        self.jobs
            .transition(edit_job_id, JobEvent::Fail, |_| {
                Ok(vec![(codec::ERROR, message.clone())])
            })
            .await?;
        Ok(RevisionOutcome::Rejected(message))
    }
}

/// Flatten validator errors into one message, stable across runs.
fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FlakyStore;
    use crate::{JobCore, MemoryStore, StoreConfig};
    use clipchat_models::{ClipRecord, JobStatus};
    use std::sync::Arc;

    fn core() -> JobCore {
        JobCore::new(Arc::new(MemoryStore::new()), &StoreConfig::memory(200))
    }

    /// A parent job that finished with `clip_count` clips.
    async fn finished_parent(core: &JobCore, clip_count: usize) -> JobId {
        let parent = core.jobs.create("https://example/video").await.unwrap();
        core.jobs.mark_queued(&parent.id).await.unwrap();
        core.jobs.update_clips(&parent.id, |clips| {
            for i in 0..clip_count {
                clips.push(ClipRecord::new(format!("{i}.mp4"), 0.0, 5.0, format!("Clip {i}")));
            }
            Ok(true)
        })
        .await
        .unwrap();
        parent.id
    }

    /// Create an edit job and move it to `processing`.
    async fn claimed_edit(core: &JobCore, parent: &JobId, index: usize) -> JobId {
        let edit = core
            .revisions
            .create_edit(&NewEditJob::new(parent.as_str(), index, "make it punchier"))
            .await
            .unwrap();
        core.jobs
            .transition(&edit.id, JobEvent::Claim, |_| Ok(Vec::new()))
            .await
            .unwrap();
        edit.id
    }

    #[tokio::test]
    async fn test_create_edit_validates_fields() {
        let core = core();
        let err = core
            .revisions
            .create_edit(&NewEditJob::default())
            .await
            .unwrap_err();
        let QueueError::Validation(message) = err else {
            panic!("expected validation error");
        };
        assert!(message.contains("parentJobId required"));
        assert!(message.contains("userPrompt required"));
        assert!(message.contains("parentClipIndex required"));
    }

    #[tokio::test]
    async fn test_create_edit_is_queued_without_parent_check() {
        let core = core();
        let edit = core
            .revisions
            .create_edit(&NewEditJob::new("missing-parent", 4, "brighter"))
            .await
            .unwrap();

        assert_eq!(edit.status, JobStatus::Queued);
        assert_eq!(core.queue.dequeue().await.unwrap(), Some(edit.id.clone()));
        assert_eq!(core.jobs.get(&edit.id).await.unwrap().kind, clipchat_models::JobKind::Edit);
    }

    #[tokio::test]
    async fn test_attach_revision_appends_once() {
        let core = core();
        let parent = finished_parent(&core, 2).await;
        let edit = claimed_edit(&core, &parent, 1).await;

        let outcome = core
            .revisions
            .attach_revision(&edit, RevisionOutput::new("rev.mp4"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RevisionOutcome::Attached {
                parent_job_id: parent.clone(),
                clip_index: 1,
                revision_count: 1,
            }
        );

        let parent_record = core.jobs.get(&parent).await.unwrap();
        let revision = &parent_record.clips[1].revisions[0];
        assert_eq!(revision.url, "rev.mp4");
        assert_eq!(revision.note, "make it punchier");
        assert!(parent_record.clips[0].revisions.is_empty());
        assert_eq!(core.jobs.get(&edit).await.unwrap().status, JobStatus::Done);

        // A second delivery finds the edit already done.
        let err = core
            .revisions
            .attach_revision(&edit, RevisionOutput::new("rev.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition(_)));
        assert_eq!(core.jobs.get(&parent).await.unwrap().clips[1].revisions.len(), 1);
    }

    #[tokio::test]
    async fn test_revisions_keep_attach_order() {
        let core = core();
        let parent = finished_parent(&core, 2).await;

        let mut edits = Vec::new();
        for i in 0..4 {
            let edit = claimed_edit(&core, &parent, 1).await;
            core.revisions
                .attach_revision(&edit, RevisionOutput::new(format!("rev-{i}.mp4")))
                .await
                .unwrap();
            edits.push(edit);
        }

        let job = core.jobs.get(&parent).await.unwrap();
        assert!(job.clips[0].revisions.is_empty());
        let revisions = &job.clips[1].revisions;
        assert_eq!(revisions.len(), edits.len());
        for (i, (revision, edit)) in revisions.iter().zip(&edits).enumerate() {
            assert_eq!(revision.edit_job_id.as_deref(), Some(edit.as_str()));
            assert_eq!(revision.url, format!("rev-{i}.mp4"));
        }
    }

    #[tokio::test]
    async fn test_create_edit_retries_enqueue() {
        let store = Arc::new(FlakyStore::failing_pushes(1));
        let core = JobCore::new(store, &StoreConfig::memory(200));

        let edit = core
            .revisions
            .create_edit(&NewEditJob::new("parent", 0, "tighter"))
            .await
            .unwrap();

        assert_eq!(core.queue.dequeue().await.unwrap(), Some(edit.id));
    }

    #[tokio::test]
    async fn test_concurrent_revisions_are_all_kept() {
        let core = core();
        let parent = finished_parent(&core, 1).await;

        let mut edits = Vec::new();
        for _ in 0..5 {
            edits.push(claimed_edit(&core, &parent, 0).await);
        }
        let handles: Vec<_> = edits
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let revisions = core.revisions.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    revisions
                        .attach_revision(&id, RevisionOutput::new(format!("rev-{i}.mp4")))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let clip = &core.jobs.get(&parent).await.unwrap().clips[0];
        assert_eq!(clip.revisions.len(), 5);
        for edit in &edits {
            assert!(clip.has_revision_from(edit.as_str()));
        }
    }

    #[tokio::test]
    async fn test_missing_clip_marks_edit_error() {
        let core = core();
        let parent = finished_parent(&core, 1).await;
        let edit = claimed_edit(&core, &parent, 3).await;

        let outcome = core
            .revisions
            .attach_revision(&edit, RevisionOutput::new("rev.mp4"))
            .await
            .unwrap();
        assert!(matches!(outcome, RevisionOutcome::Rejected(ref m) if m.contains("clip 3")));

        let record = core.jobs.get(&edit).await.unwrap();
        assert_eq!(record.status, JobStatus::Error);
        assert!(record.error.contains("clip 3"));
    }

    #[tokio::test]
    async fn test_missing_parent_marks_edit_error() {
        let core = core();
        let edit = claimed_edit(&core, &JobId::from("gone"), 0).await;

        let outcome = core
            .revisions
            .attach_revision(&edit, RevisionOutput::new("rev.mp4"))
            .await
            .unwrap();
        assert!(matches!(outcome, RevisionOutcome::Rejected(ref m) if m.contains("gone")));
        assert_eq!(core.jobs.get(&edit).await.unwrap().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_attach_requires_edit_job() {
        let core = core();
        let parent = finished_parent(&core, 1).await;
        let err = core
            .revisions
            .attach_revision(&parent, RevisionOutput::new("rev.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Validation(_)));
    }
}
