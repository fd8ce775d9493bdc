//! Shared data models for ClipChat.
//!
//! This crate provides Serde-serializable types for:
//! - Job records (generation and edit jobs)
//! - Clips and their revision history
//! - Job status and the transition rules between statuses

pub mod clip;
pub mod job;
pub mod job_status;

// Re-export common types
pub use clip::{ClipRecord, ClipRevision};
pub use job::{ChatMessage, EditTarget, JobId, JobKind, JobRecord, NewEditJob};
pub use job_status::{JobEvent, JobStatus, TransitionError, UnknownStatus};
