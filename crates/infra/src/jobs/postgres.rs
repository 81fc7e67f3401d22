//! Postgres-backed job record store.
//!
//! Status transitions are single guarded `UPDATE ... WHERE status IN (...)`
//! statements and log lines are appended with `array_append`, so a write never
//! depends on a previously read copy of the row.
//!
//! ## Error Mapping
//!
//! | SQLx Error | JobStoreError |
//! |------------|---------------|
//! | Database (unique violation `23505`) | `AlreadyExists` |
//! | Database (other) | `Storage` |
//! | PoolClosed / other | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use reclaim_core::{DomainError, JobId, UserId};

use super::store::{DeletionJobStore, JobStoreError};
use super::types::{DeletionJob, JobStatus};

const SCHEMA: &str = include_str!("../../sql/deletion_jobs.sql");

const COLUMNS: &str = "id, user_id, bucket_name, status, logs, created_at, updated_at";

/// Postgres-backed store over the `deletion_jobs` table.
///
/// `PostgresDeletionJobStore` is `Send + Sync`; the SQLx pool handles
/// connection management.
#[derive(Debug, Clone)]
pub struct PostgresDeletionJobStore {
    pool: Arc<PgPool>,
}

impl PostgresDeletionJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the table and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), JobStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Run a guarded status update; when no row matches, tell "missing" apart
    /// from "wrong state".
    async fn transition(
        &self,
        operation: &str,
        job_id: JobId,
        next: JobStatus,
        allowed_from: &[JobStatus],
        line: Option<&str>,
    ) -> Result<DeletionJob, JobStoreError> {
        let allowed: Vec<String> = allowed_from.iter().map(|s| s.as_str().to_string()).collect();

        let sql = format!(
            r#"
            UPDATE deletion_jobs
            SET status = $2,
                logs = CASE WHEN $3::text IS NULL THEN logs ELSE array_append(logs, $3::text) END,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($4)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(job_id.as_uuid())
            .bind(next.as_str())
            .bind(line)
            .bind(&allowed)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        match row {
            Some(row) => job_from_row(&row),
            None => match self.get(job_id).await? {
                Some(current) => Err(DomainError::invalid_transition(
                    current.status.as_str(),
                    next.as_str(),
                )
                .into()),
                None => Err(JobStoreError::NotFound(job_id)),
            },
        }
    }
}

#[async_trait]
impl DeletionJobStore for PostgresDeletionJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, user_id = %job.user_id), err)]
    async fn create(&self, job: DeletionJob) -> Result<DeletionJob, JobStoreError> {
        let sql = format!(
            r#"
            INSERT INTO deletion_jobs (id, user_id, bucket_name, status, logs, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(job.id.as_uuid())
            .bind(job.user_id.as_uuid())
            .bind(&job.bucket_name)
            .bind(job.status.as_str())
            .bind(&job.logs)
            .bind(job.created_at)
            .bind(job.updated_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| match map_sqlx_error("create", e) {
                JobStoreError::AlreadyExists(_) => JobStoreError::AlreadyExists(job.id),
                other => other,
            })?;

        job_from_row(&row)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<DeletionJob>, JobStoreError> {
        let sql = format!("SELECT {COLUMNS} FROM deletion_jobs WHERE id = $1");

        let row = sqlx::query(&sql)
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn list(&self, limit: usize) -> Result<Vec<DeletionJob>, JobStoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM deletion_jobs ORDER BY created_at DESC, id DESC LIMIT $1"
        );

        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn mark_processing(&self, job_id: JobId) -> Result<DeletionJob, JobStoreError> {
        self.transition(
            "mark_processing",
            job_id,
            JobStatus::Processing,
            &[JobStatus::Pending, JobStatus::Processing],
            None,
        )
        .await
    }

    async fn append_log(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError> {
        let sql = format!(
            r#"
            UPDATE deletion_jobs
            SET logs = array_append(logs, $2::text), updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(job_id.as_uuid())
            .bind(line)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("append_log", e))?;

        match row {
            Some(row) => job_from_row(&row),
            None => Err(JobStoreError::NotFound(job_id)),
        }
    }

    #[instrument(skip(self, line), fields(job_id = %job_id), err)]
    async fn complete(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError> {
        self.transition(
            "complete",
            job_id,
            JobStatus::Completed,
            &[JobStatus::Processing],
            Some(line),
        )
        .await
    }

    #[instrument(skip(self, line), fields(job_id = %job_id), err)]
    async fn fail(&self, job_id: JobId, line: &str) -> Result<DeletionJob, JobStoreError> {
        self.transition(
            "fail",
            job_id,
            JobStatus::Failed,
            &[JobStatus::Pending, JobStatus::Processing],
            Some(line),
        )
        .await
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn requeue(&self, job_id: JobId) -> Result<DeletionJob, JobStoreError> {
        self.transition(
            "requeue",
            job_id,
            JobStatus::Pending,
            &[JobStatus::Failed],
            None,
        )
        .await
    }
}

fn job_from_row(row: &PgRow) -> Result<DeletionJob, JobStoreError> {
    let decode = |e: sqlx::Error| JobStoreError::Storage(format!("failed to decode job row: {e}"));

    let status: String = row.try_get("status").map_err(decode)?;
    let logs: Option<Vec<String>> = row.try_get("logs").map_err(decode)?;

    Ok(DeletionJob {
        id: JobId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(decode)?),
        bucket_name: row.try_get("bucket_name").map_err(decode)?,
        status: status.parse()?,
        logs: logs.unwrap_or_default(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                // Unique violation on the primary key; the caller fills in the id.
                return JobStoreError::AlreadyExists(JobId::from_uuid(Uuid::nil()));
            }
            JobStoreError::Storage(format!(
                "database error in {}: {}",
                operation,
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => JobStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
