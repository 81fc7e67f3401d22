//! One invocation of the storage reclamation saga.
//!
//! An invocation starts from `{record, currentPath?}`, marks the job
//! `processing`, then loops over the traversal engine until the namespace is
//! empty (`completed`), the soft deadline passes (handoff to a new
//! invocation), or something fails (`failed`). All run state lives in a
//! [`RunContext`] owned by the invocation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use reclaim_core::{DomainError, JobId, PathCursor};

use crate::blob::{BlobNamespace, ListOptions};
use crate::continuation::{
    Continuation, ContinuationDispatcher, DispatchError, ForwardedAuth, SoftDeadline,
};
use crate::jobs::{DeletionJob, DeletionJobStore, JobStatus, JobStoreError};
use crate::lifecycle::LifecycleController;
use crate::traversal::{Advance, TraversalEngine, TraversalError};

/// Processor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub soft_deadline: Duration,
    pub page_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            soft_deadline: SoftDeadline::DEFAULT_BUDGET,
            page_size: ListOptions::DEFAULT_PAGE_SIZE,
        }
    }
}

/// A validated trigger: the job record and where to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub record: DeletionJob,
    pub cursor: PathCursor,
}

impl Invocation {
    /// Resume at `current_path`, or at the namespace root when absent or blank.
    pub fn new(record: DeletionJob, current_path: Option<&str>) -> Result<Self, DomainError> {
        let cursor = match current_path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => PathCursor::resume(record.user_id, path)?,
            None => PathCursor::root(record.user_id),
        };
        Ok(Self { record, cursor })
    }
}

/// How an invocation ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { job: DeletionJob, deleted: usize },
    HandedOff { job: DeletionJob, path: String, deleted: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] DomainError),
    #[error(transparent)]
    Traversal(#[from] TraversalError),
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// State threaded through one invocation.
#[derive(Debug)]
struct RunContext {
    job: DeletionJob,
    cursor: PathCursor,
    deleted: usize,
    /// Directories restarted from without being drained since the last delete.
    stalled: HashSet<PathCursor>,
}

impl RunContext {
    fn new(job: DeletionJob, cursor: PathCursor) -> Self {
        Self {
            job,
            cursor,
            deleted: 0,
            stalled: HashSet::new(),
        }
    }

    /// Move to the next cursor. Returns `false` once traversal is done.
    fn apply(&mut self, advance: Advance) -> Result<bool, TraversalError> {
        let Some(next) = advance.next_cursor(&self.cursor) else {
            return Ok(false);
        };

        match advance {
            Advance::Deleted { count } => {
                self.deleted += count;
                self.stalled.clear();
            }
            Advance::Restarted { unclassifiable } if unclassifiable > 0 => {
                // Seeing the same stuck directory twice with nothing deleted in
                // between would repeat forever.
                if !self.stalled.insert(self.cursor.clone()) {
                    return Err(TraversalError::Unclassifiable {
                        path: self.cursor.to_string(),
                        count: unclassifiable,
                    });
                }
            }
            _ => {}
        }

        self.cursor = next;
        Ok(true)
    }
}

/// Composes the lifecycle controller, traversal engine, and continuation
/// dispatcher into one invocation.
#[derive(Clone)]
pub struct DeletionProcessor {
    lifecycle: LifecycleController,
    blob: Arc<dyn BlobNamespace>,
    dispatcher: Arc<dyn ContinuationDispatcher>,
    config: ProcessorConfig,
}

impl DeletionProcessor {
    pub fn new(
        jobs: Arc<dyn DeletionJobStore>,
        blob: Arc<dyn BlobNamespace>,
        dispatcher: Arc<dyn ContinuationDispatcher>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            lifecycle: LifecycleController::new(jobs),
            blob,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Run one invocation with the configured soft deadline.
    pub async fn run(
        &self,
        invocation: Invocation,
        auth: &ForwardedAuth,
    ) -> Result<RunOutcome, ProcessorError> {
        let deadline = SoftDeadline::start(self.config.soft_deadline);
        self.run_with_deadline(invocation, auth, deadline).await
    }

    #[instrument(
        skip_all,
        fields(
            job_id = %invocation.record.id,
            user_id = %invocation.record.user_id,
            bucket = %invocation.record.bucket_name,
            path = %invocation.cursor,
        )
    )]
    pub async fn run_with_deadline(
        &self,
        invocation: Invocation,
        auth: &ForwardedAuth,
        deadline: SoftDeadline,
    ) -> Result<RunOutcome, ProcessorError> {
        let Invocation { record, cursor } = invocation;
        info!("processing job");

        let job = match self.lifecycle.begin(&record).await {
            Ok(job) => job,
            Err(e) => return Err(self.fail(record.id, e.into()).await),
        };

        let mut ctx = RunContext::new(job, cursor);
        match self.drive(&mut ctx, auth, deadline).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.fail(ctx.job.id, e).await),
        }
    }

    async fn drive(
        &self,
        ctx: &mut RunContext,
        auth: &ForwardedAuth,
        deadline: SoftDeadline,
    ) -> Result<RunOutcome, ProcessorError> {
        let engine = TraversalEngine::new(
            self.blob.clone(),
            ctx.job.bucket_name.clone(),
            ListOptions::with_limit(self.config.page_size),
        );

        loop {
            if deadline.is_exceeded() {
                return self.hand_off(ctx, auth).await;
            }

            let advance = engine.advance(&ctx.cursor).await?;
            if !ctx.apply(advance)? {
                break;
            }
        }

        let job = self.lifecycle.complete(ctx.job.id, ctx.deleted).await?;
        Ok(RunOutcome::Completed {
            job,
            deleted: ctx.deleted,
        })
    }

    async fn hand_off(
        &self,
        ctx: &mut RunContext,
        auth: &ForwardedAuth,
    ) -> Result<RunOutcome, ProcessorError> {
        let path = ctx.cursor.to_string();
        info!(path = %path, deleted = ctx.deleted, "soft deadline reached, handing off");

        self.lifecycle.record_handoff(ctx.job.id, &path).await?;

        let mut record = ctx.job.clone();
        record.status = JobStatus::Processing;
        let continuation = Continuation {
            record,
            current_path: path.clone(),
        };
        self.dispatcher.dispatch(&continuation, auth).await?;

        Ok(RunOutcome::HandedOff {
            job: continuation.record,
            path,
            deleted: ctx.deleted,
        })
    }

    /// Record `err` on the job and hand it back to the caller.
    async fn fail(&self, job_id: JobId, err: ProcessorError) -> ProcessorError {
        warn!(job_id = %job_id, error = %err, "invocation failed");
        self.lifecycle.fail(job_id, &err.to_string()).await;
        err
    }
}
