//! Job record storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use reclaim_core::{DomainError, JobId};

use super::types::DeletionJob;

/// Job record store abstraction.
///
/// Every mutating call returns the row as stored after the write. Log lines
/// are appended by the store, never by rewriting the whole list, so a stale
/// in-memory copy of the job cannot clobber entries written meanwhile.
#[async_trait]
pub trait DeletionJobStore: Send + Sync {
    /// Insert a new job.
    async fn create(&self, job: DeletionJob) -> Result<DeletionJob, JobStoreError>;

    /// Get a job by ID.
    async fn get(&self, job_id: JobId) -> Result<Option<DeletionJob>, JobStoreError>;

    /// List jobs, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<DeletionJob>, JobStoreError>;

    /// `pending | processing → processing`.
    async fn mark_processing(&self, job_id: JobId) -> Result<DeletionJob, JobStoreError>;

    /// Append a log line without touching the status.
    async fn append_log(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError>;

    /// `processing → completed`, appending `line`.
    async fn complete(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError>;

    /// `pending | processing → failed`, appending `line`.
    async fn fail(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError>;

    /// `failed → pending` (manual re-queue).
    async fn requeue(&self, job_id: JobId) -> Result<DeletionJob, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDeletionJobStore {
    jobs: RwLock<HashMap<JobId, DeletionJob>>,
}

impl InMemoryDeletionJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, DeletionJob>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job map lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, DeletionJob>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("job map lock poisoned".to_string()))
    }

    /// Apply `f` to the stored job and return the updated row.
    fn mutate<F>(&self, job_id: JobId, f: F) -> Result<DeletionJob, JobStoreError>
    where
        F: FnOnce(&mut DeletionJob) -> Result<(), DomainError>,
    {
        let mut jobs = self.write()?;
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;

        // Work on a copy so a rejected transition leaves the row untouched.
        let mut updated = job.clone();
        f(&mut updated)?;
        *job = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl DeletionJobStore for InMemoryDeletionJobStore {
    async fn create(&self, job: DeletionJob) -> Result<DeletionJob, JobStoreError> {
        let mut jobs = self.write()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<DeletionJob>, JobStoreError> {
        Ok(self.read()?.get(&job_id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<DeletionJob>, JobStoreError> {
        let jobs = self.read()?;
        let mut result: Vec<_> = jobs.values().cloned().collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        result.truncate(limit);
        Ok(result)
    }

    async fn mark_processing(&self, job_id: JobId) -> Result<DeletionJob, JobStoreError> {
        self.mutate(job_id, |job| job.mark_processing())
    }

    async fn append_log(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError> {
        self.mutate(job_id, |job| {
            job.append_log(line);
            Ok(())
        })
    }

    async fn complete(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError> {
        self.mutate(job_id, |job| job.mark_completed(line))
    }

    async fn fail(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError> {
        self.mutate(job_id, |job| job.mark_failed(line))
    }

    async fn requeue(&self, job_id: JobId) -> Result<DeletionJob, JobStoreError> {
        self.mutate(job_id, |job| job.requeue())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobStatus;
    use reclaim_core::UserId;

    async fn seeded() -> (InMemoryDeletionJobStore, JobId) {
        let store = InMemoryDeletionJobStore::new();
        let job = store
            .create(DeletionJob::new(UserId::new(), None))
            .await
            .unwrap();
        (store, job.id)
    }

    #[tokio::test]
    async fn create_and_get() {
        let (store, id) = seeded().await;

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(store.get(JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryDeletionJobStore::new();
        let job = DeletionJob::new(UserId::new(), None);
        store.create(job.clone()).await.unwrap();

        assert!(matches!(
            store.create(job).await,
            Err(JobStoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn full_lifecycle_appends_logs_in_order() {
        let (store, id) = seeded().await;

        store.mark_processing(id).await.unwrap();
        store.append_log(id, "handoff at u1/a/").await.unwrap();
        let done = store.complete(id, "Completed. Deleted 2 files (in this run).").await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(
            done.logs,
            vec![
                "handoff at u1/a/".to_string(),
                "Completed. Deleted 2 files (in this run).".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn rejected_transition_leaves_row_untouched() {
        let (store, id) = seeded().await;
        store.mark_processing(id).await.unwrap();
        store.complete(id, "done").await.unwrap();

        let err = store.fail(id, "Error: late").await.unwrap_err();
        assert!(matches!(err, JobStoreError::Domain(DomainError::InvalidTransition { .. })));

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.logs, vec!["done".to_string()]);
    }

    #[tokio::test]
    async fn requeue_only_from_failed() {
        let (store, id) = seeded().await;
        assert!(store.requeue(id).await.is_err());

        store.fail(id, "Error: boom").await.unwrap();
        let job = store.requeue(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn missing_job_is_not_found() {
        let store = InMemoryDeletionJobStore::new();
        assert!(matches!(
            store.mark_processing(JobId::new()).await,
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let store = InMemoryDeletionJobStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut job = DeletionJob::new(UserId::new(), None);
            job.created_at = job.created_at + chrono::Duration::seconds(i);
            ids.push(store.create(job).await.unwrap().id);
        }

        let listed = store.list(3).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, ids[4]);
        assert_eq!(listed[2].id, ids[2]);
    }
}
