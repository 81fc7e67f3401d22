//! Deletion job record and its status machine.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reclaim_core::{DomainError, DomainResult, JobId, UserId};

/// Bucket used when a job is created without one.
pub const DEFAULT_BUCKET: &str = "review_images";

/// Job execution status.
///
/// `pending → processing → completed | failed`; `processing` re-enters itself
/// across continuations and `failed → pending` is the manual re-queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for the first invocation
    #[default]
    Pending,
    /// At least one invocation has started
    Processing,
    /// Namespace observed empty
    Completed,
    /// An invocation hit an error; waits for a manual re-queue
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the status machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Pending, Failed)
                | (Processing, Failed)
                | (Failed, Pending)
        )
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::validation(format!("unknown job status: {other}"))),
        }
    }
}

/// One user's storage reclamation task.
///
/// The row carries no traversal cursor: resumption state lives only in the
/// continuation payload and in what is left in the blob namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionJob {
    pub id: JobId,
    pub user_id: UserId,
    pub bucket_name: String,
    pub status: JobStatus,
    /// Append-only progress and error notes.
    #[serde(default)]
    pub logs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeletionJob {
    /// Create a new pending job.
    pub fn new(user_id: UserId, bucket_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id,
            bucket_name: bucket_name
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            status: JobStatus::Pending,
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: JobStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_transition(self.status.as_str(), next.as_str()));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a log line.
    pub fn append_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
        self.updated_at = Utc::now();
    }

    /// Mark job as processing (no-op when already processing).
    pub fn mark_processing(&mut self) -> DomainResult<()> {
        self.transition(JobStatus::Processing)
    }

    /// Mark job as completed with a summary line.
    pub fn mark_completed(&mut self, line: impl Into<String>) -> DomainResult<()> {
        self.transition(JobStatus::Completed)?;
        self.append_log(line);
        Ok(())
    }

    /// Mark job as failed with an error line.
    pub fn mark_failed(&mut self, line: impl Into<String>) -> DomainResult<()> {
        self.transition(JobStatus::Failed)?;
        self.append_log(line);
        Ok(())
    }

    /// Manual re-queue of a failed job.
    pub fn requeue(&mut self) -> DomainResult<()> {
        self.transition(JobStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_defaults_bucket_and_status() {
        let job = DeletionJob::new(UserId::new(), None);
        assert_eq!(job.bucket_name, DEFAULT_BUCKET);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.logs.is_empty());

        let blank = DeletionJob::new(UserId::new(), Some("  ".to_string()));
        assert_eq!(blank.bucket_name, DEFAULT_BUCKET);

        let custom = DeletionJob::new(UserId::new(), Some("avatars".to_string()));
        assert_eq!(custom.bucket_name, "avatars");
    }

    #[test]
    fn job_lifecycle() {
        let mut job = DeletionJob::new(UserId::new(), None);

        job.mark_processing().unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        // Continuations re-enter processing.
        job.mark_processing().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.logs.is_empty());

        job.mark_completed("Completed. Deleted 3 files (in this run).").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.logs.len(), 1);
        assert!(job.status.is_terminal());
    }

    #[test]
    fn terminal_states_reject_further_work() {
        let mut job = DeletionJob::new(UserId::new(), None);
        job.mark_processing().unwrap();
        job.mark_completed("done").unwrap();

        assert!(matches!(
            job.mark_processing(),
            Err(DomainError::InvalidTransition { .. })
        ));
        assert!(job.mark_failed("late error").is_err());
        assert_eq!(job.logs, vec!["done".to_string()]);
    }

    #[test]
    fn failed_job_can_be_requeued_once() {
        let mut job = DeletionJob::new(UserId::new(), None);
        job.mark_processing().unwrap();
        job.mark_failed("Error: boom").unwrap();

        job.requeue().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.requeue().is_err());

        // Logs survive the re-queue as an audit trail.
        assert_eq!(job.logs, vec!["Error: boom".to_string()]);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let job = DeletionJob::new(UserId::new(), None);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["bucket_name"], DEFAULT_BUCKET);
        assert!(value["logs"].as_array().unwrap().is_empty());
    }
}
