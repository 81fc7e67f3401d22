//! Job status transitions and log lines for one processor invocation.

use std::sync::Arc;

use tracing::{error, info, warn};

use reclaim_core::JobId;

use crate::jobs::{DeletionJob, DeletionJobStore, JobStatus, JobStoreError};

pub fn completion_line(deleted: usize) -> String {
    format!("Completed. Deleted {deleted} files (in this run).")
}

pub fn handoff_line(path: &str) -> String {
    format!("Timeout approaching at path {path}. Re-invoking.")
}

pub fn error_line(message: &str) -> String {
    format!("Error: {message}")
}

/// Applies `pending → processing → completed | failed` through the store.
#[derive(Clone)]
pub struct LifecycleController {
    store: Arc<dyn DeletionJobStore>,
}

impl LifecycleController {
    pub fn new(store: Arc<dyn DeletionJobStore>) -> Self {
        Self { store }
    }

    /// Enter `processing` on the stored row.
    ///
    /// The status in the payload is never trusted: a continuation may arrive
    /// after the row was re-queued, so the write always goes to the store.
    /// `processing → processing` is a no-op there.
    pub async fn begin(&self, record: &DeletionJob) -> Result<DeletionJob, JobStoreError> {
        let job = self.store.mark_processing(record.id).await?;
        if record.status != JobStatus::Processing {
            info!(job_id = %job.id, user_id = %job.user_id, "job processing");
        }
        Ok(job)
    }

    /// Append the informational handoff line. Status is unchanged.
    pub async fn record_handoff(&self, job_id: JobId, path: &str) -> Result<(), JobStoreError> {
        self.store.append_log(job_id, &handoff_line(path)).await?;
        Ok(())
    }

    pub async fn complete(&self, job_id: JobId, deleted: usize) -> Result<DeletionJob, JobStoreError> {
        let job = self.store.complete(job_id, &completion_line(deleted)).await?;
        info!(job_id = %job_id, deleted, "job completed");
        Ok(job)
    }

    /// Record a failure. Best effort: a store error here is logged, and the
    /// caller keeps reporting the original error.
    pub async fn fail(&self, job_id: JobId, message: &str) -> Option<DeletionJob> {
        warn!(job_id = %job_id, error = %message, "job failed");
        match self.store.fail(job_id, &error_line(message)).await {
            Ok(job) => Some(job),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to record job failure");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryDeletionJobStore;
    use reclaim_core::UserId;

    async fn setup() -> (Arc<InMemoryDeletionJobStore>, LifecycleController, DeletionJob) {
        let store = InMemoryDeletionJobStore::arc();
        let job = store.create(DeletionJob::new(UserId::new(), None)).await.unwrap();
        (store.clone(), LifecycleController::new(store), job)
    }

    #[test]
    fn log_lines() {
        assert_eq!(completion_line(3), "Completed. Deleted 3 files (in this run).");
        assert_eq!(
            handoff_line("u1/a/"),
            "Timeout approaching at path u1/a/. Re-invoking."
        );
        assert_eq!(error_line("boom"), "Error: boom");
    }

    #[tokio::test]
    async fn begin_marks_pending_job_processing_without_logging() {
        let (store, lifecycle, job) = setup().await;

        let started = lifecycle.begin(&job).await.unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert!(started.logs.is_empty());
        assert_eq!(store.get(job.id).await.unwrap().unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn begin_writes_the_row_even_for_processing_payloads() {
        let (store, lifecycle, job) = setup().await;

        // The row is still pending, but the payload claims processing.
        let mut payload = job.clone();
        payload.status = JobStatus::Processing;
        let started = lifecycle.begin(&payload).await.unwrap();

        assert_eq!(started.status, JobStatus::Processing);
        assert_eq!(store.get(job.id).await.unwrap().unwrap().status, JobStatus::Processing);

        // A second continuation re-enters processing without logging.
        let again = lifecycle.begin(&payload).await.unwrap();
        assert_eq!(again.status, JobStatus::Processing);
        assert!(again.logs.is_empty());
    }

    #[tokio::test]
    async fn begin_rejects_a_terminal_row() {
        let (store, lifecycle, job) = setup().await;
        lifecycle.begin(&job).await.unwrap();
        lifecycle.complete(job.id, 0).await.unwrap();

        let mut payload = job.clone();
        payload.status = JobStatus::Processing;
        assert!(lifecycle.begin(&payload).await.is_err());
        assert_eq!(store.get(job.id).await.unwrap().unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn handoff_then_complete() {
        let (store, lifecycle, job) = setup().await;
        lifecycle.begin(&job).await.unwrap();

        lifecycle.record_handoff(job.id, "u1/a/").await.unwrap();
        assert_eq!(
            store.get(job.id).await.unwrap().unwrap().status,
            JobStatus::Processing
        );

        let done = lifecycle.complete(job.id, 7).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.logs, vec![handoff_line("u1/a/"), completion_line(7)]);
    }

    #[tokio::test]
    async fn fail_is_best_effort() {
        let (_store, lifecycle, job) = setup().await;
        lifecycle.begin(&job).await.unwrap();

        let failed = lifecycle.fail(job.id, "boom").await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.logs, vec![error_line("boom")]);

        // Already terminal: the secondary error is swallowed.
        assert!(lifecycle.fail(job.id, "again").await.is_none());
        assert!(lifecycle.fail(JobId::new(), "missing").await.is_none());
    }
}
