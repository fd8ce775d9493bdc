//! Job status and the transition rules between statuses.
//!
//! Clients drive jobs into `queued` (planning, manual re-queue) and the
//! external worker drives them through `processing` into a terminal status.
//! Every write path in the store consults [`JobStatus::apply`] first.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing status of a job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, collecting chat messages, not yet requested
    #[default]
    Draft,
    /// Waiting in the work queue
    Queued,
    /// Planner call in flight (only rendered by clients, never persisted)
    Planning,
    /// Picked up by a worker
    Processing,
    /// Worker finished successfully
    Done,
    /// Planning or processing failed; see the record's `error`
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Queued => "queued",
            JobStatus::Planning => "planning",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more worker updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Apply an event to this status, returning the status it leads to.
    pub fn apply(self, event: JobEvent) -> Result<JobStatus, TransitionError> {
        let reopenable = matches!(
            self,
            JobStatus::Draft | JobStatus::Queued | JobStatus::Planning | JobStatus::Done | JobStatus::Error
        );

        let next = match event {
            JobEvent::Plan | JobEvent::Requeue if reopenable => JobStatus::Queued,
            JobEvent::PlanFailed if reopenable => JobStatus::Error,
            JobEvent::Claim if self == JobStatus::Queued => JobStatus::Processing,
            JobEvent::Succeed if self == JobStatus::Processing => JobStatus::Done,
            JobEvent::Fail if self == JobStatus::Processing => JobStatus::Error,
            _ => return Err(TransitionError { from: self, event }),
        };

        Ok(next)
    }

    /// Check whether `event` is legal from this status.
    pub fn accepts(self, event: JobEvent) -> bool {
        self.apply(event).is_ok()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(JobStatus::Draft),
            "queued" => Ok(JobStatus::Queued),
            "planning" => Ok(JobStatus::Planning),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A persisted status string that names no known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status: {0:?}")]
pub struct UnknownStatus(pub String);

/// Something that happens to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobEvent {
    /// Fresh config/messages persisted (planner output or client-supplied)
    Plan,
    /// Generate without re-planning
    Requeue,
    /// Planner collaborator failed
    PlanFailed,
    /// Worker picked the job up
    Claim,
    /// Worker finished successfully
    Succeed,
    /// Worker failed
    Fail,
}

impl JobEvent {
    /// Whether reaching the target status starts a new generation cycle.
    pub fn starts_generation(&self) -> bool {
        matches!(self, JobEvent::Plan | JobEvent::Requeue)
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobEvent::Plan => "plan",
            JobEvent::Requeue => "requeue",
            JobEvent::PlanFailed => "plan_failed",
            JobEvent::Claim => "claim",
            JobEvent::Succeed => "succeed",
            JobEvent::Fail => "fail",
        };
        f.write_str(name)
    }
}

/// An event that is not legal from the job's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {event} a job in status {from}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub event: JobEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_paths_reach_queued() {
        for from in [JobStatus::Draft, JobStatus::Done, JobStatus::Error, JobStatus::Queued] {
            assert_eq!(from.apply(JobEvent::Plan), Ok(JobStatus::Queued));
            assert_eq!(from.apply(JobEvent::Requeue), Ok(JobStatus::Queued));
        }
    }

    #[test]
    fn test_worker_path() {
        let status = JobStatus::Queued.apply(JobEvent::Claim).unwrap();
        assert_eq!(status, JobStatus::Processing);
        assert_eq!(status.apply(JobEvent::Succeed), Ok(JobStatus::Done));
        assert_eq!(status.apply(JobEvent::Fail), Ok(JobStatus::Error));
    }

    #[test]
    fn test_processing_cannot_be_requeued() {
        let err = JobStatus::Processing.apply(JobEvent::Requeue).unwrap_err();
        assert_eq!(err.from, JobStatus::Processing);
        assert_eq!(err.to_string(), "cannot requeue a job in status processing");
        assert!(!JobStatus::Processing.accepts(JobEvent::Plan));
        assert!(!JobStatus::Processing.accepts(JobEvent::PlanFailed));
    }

    #[test]
    fn test_processing_only_after_queued() {
        for from in [JobStatus::Draft, JobStatus::Planning, JobStatus::Done, JobStatus::Error] {
            assert!(!from.accepts(JobEvent::Claim), "claim from {from}");
        }
        assert!(!JobStatus::Queued.accepts(JobEvent::Succeed));
        assert!(!JobStatus::Done.accepts(JobEvent::Succeed));
    }

    #[test]
    fn test_status_string_roundtrip() {
        assert_eq!("processing".parse::<JobStatus>(), Ok(JobStatus::Processing));
        assert!("unknown".parse::<JobStatus>().is_err());
        assert_eq!(JobStatus::Done.to_string(), "done");
        assert_eq!(serde_json::to_string(&JobStatus::Queued).unwrap(), "\"queued\"");
    }
}
