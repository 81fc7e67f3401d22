//! Service wiring: job store, blob namespace, continuation dispatcher, and the
//! processor built from them.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use reclaim_infra::blob::{BlobNamespace, InMemoryBlobNamespace, StorageApiNamespace};
use reclaim_infra::continuation::{ContinuationDispatcher, ForwardedAuth, HttpContinuationDispatcher};
use reclaim_infra::jobs::{
    DeletionJobStore, InMemoryDeletionJobStore, JobStoreError, PostgresDeletionJobStore,
};
use reclaim_infra::{DeletionProcessor, Invocation, ProcessorConfig, ProcessorError, RunOutcome};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to connect to Postgres: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to prepare job table: {0}")]
    Schema(#[from] JobStoreError),
}

/// Shared services behind every route.
#[derive(Clone)]
pub struct AppServices {
    pub jobs: Arc<dyn DeletionJobStore>,
    pub processor: DeletionProcessor,
    pub default_bucket: String,
}

impl AppServices {
    pub fn new(
        jobs: Arc<dyn DeletionJobStore>,
        blob: Arc<dyn BlobNamespace>,
        dispatcher: Arc<dyn ContinuationDispatcher>,
        config: ProcessorConfig,
        default_bucket: impl Into<String>,
    ) -> Self {
        Self {
            processor: DeletionProcessor::new(jobs.clone(), blob, dispatcher, config),
            jobs,
            default_bucket: default_bucket.into(),
        }
    }

    /// Run an invocation on its own task.
    ///
    /// The run is detached from the request: dropping the handle (for example
    /// when the client disconnects) does not cancel it.
    pub fn start_run(
        &self,
        invocation: Invocation,
        auth: ForwardedAuth,
    ) -> JoinHandle<Result<RunOutcome, ProcessorError>> {
        let processor = self.processor.clone();
        tokio::spawn(async move { processor.run(invocation, &auth).await })
    }

    /// Run an invocation on its own task. The outcome is only logged.
    pub fn spawn_run(&self, invocation: Invocation, auth: ForwardedAuth) {
        let job_id = invocation.record.id;
        let handle = self.start_run(invocation, auth);
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(RunOutcome::Completed { deleted, .. })) => {
                    info!(job_id = %job_id, deleted, "background run completed");
                }
                Ok(Ok(RunOutcome::HandedOff { path, deleted, .. })) => {
                    info!(job_id = %job_id, path = %path, deleted, "background run handed off");
                }
                Ok(Err(e)) => {
                    error!(job_id = %job_id, error = %e, "background run failed");
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "background run panicked");
                }
            }
        });
    }
}

/// Build services from configuration.
pub async fn build_services(config: &Config) -> Result<AppServices, StartupError> {
    let jobs: Arc<dyn DeletionJobStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let store = PostgresDeletionJobStore::new(pool);
            store.ensure_schema().await?;
            info!("using Postgres job store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory job store");
            InMemoryDeletionJobStore::arc()
        }
    };

    let blob: Arc<dyn BlobNamespace> = match (&config.storage_url, &config.storage_key) {
        (Some(url), Some(key)) => {
            info!(storage_url = %url, "using storage REST API");
            Arc::new(StorageApiNamespace::new(url.clone(), key.clone()))
        }
        _ => {
            warn!("RECLAIM_STORAGE_URL/RECLAIM_STORAGE_KEY not set; using in-memory blob namespace");
            Arc::new(InMemoryBlobNamespace::new())
        }
    };

    let dispatcher = Arc::new(HttpContinuationDispatcher::new(config.self_url.clone()));

    Ok(AppServices::new(
        jobs,
        blob,
        dispatcher,
        ProcessorConfig {
            soft_deadline: config.soft_deadline,
            page_size: config.page_size,
        },
        config.default_bucket.clone(),
    ))
}
