//! Admin job endpoints (service role only).

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use reclaim_auth::require_service_role;
use reclaim_core::{JobId, UserId};
use reclaim_infra::jobs::DeletionJob;
use reclaim_infra::Invocation;

use crate::app::dto::{CreateJobRequest, ListJobsQuery};
use crate::app::errors::{authz_error_to_response, json_error, store_error_to_response};
use crate::app::services::AppServices;
use crate::context::CallerContext;

fn parse_job_id(raw: &str) -> Result<JobId, Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, format!("invalid job id: {raw}")))
}

/// Start the first link of a job's chain on a background task.
fn start(services: &AppServices, job: &DeletionJob, ctx: &CallerContext) {
    // A fresh job always starts at the namespace root.
    match Invocation::new(job.clone(), None) {
        Ok(invocation) => services.spawn_run(invocation, ctx.authorization().clone()),
        Err(e) => tracing::error!(job_id = %job.id, error = %e, "cannot start job"),
    }
}

/// POST /jobs
pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    body: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Response {
    if let Err(e) = require_service_role(ctx.caller()) {
        return authz_error_to_response(e);
    }

    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let user_id: UserId = match req.user_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return json_error(StatusCode::BAD_REQUEST, format!("invalid user_id: {}", req.user_id));
        }
    };
    let bucket = req
        .bucket_name
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| services.default_bucket.clone());

    let job = match services.jobs.create(DeletionJob::new(user_id, Some(bucket))).await {
        Ok(job) => job,
        Err(e) => return store_error_to_response(e),
    };
    info!(job_id = %job.id, user_id = %job.user_id, bucket = %job.bucket_name, "job created");

    start(&services, &job, &ctx);
    (StatusCode::CREATED, Json(job)).into_response()
}

/// GET /jobs
pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Query(query): Query<ListJobsQuery>,
) -> Response {
    if let Err(e) = require_service_role(ctx.caller()) {
        return authz_error_to_response(e);
    }

    match services.jobs.list(query.limit()).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => store_error_to_response(e),
    }
}

/// GET /jobs/:job_id
pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(job_id): Path<String>,
) -> Response {
    if let Err(e) = require_service_role(ctx.caller()) {
        return authz_error_to_response(e);
    }
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.jobs.get(job_id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, format!("job not found: {job_id}")),
        Err(e) => store_error_to_response(e),
    }
}

/// POST /jobs/:job_id/requeue
///
/// `failed → pending`, then starts a new chain from the root.
pub async fn requeue_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(job_id): Path<String>,
) -> Response {
    if let Err(e) = require_service_role(ctx.caller()) {
        return authz_error_to_response(e);
    }
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let job = match services.jobs.requeue(job_id).await {
        Ok(job) => job,
        Err(e) => return store_error_to_response(e),
    };
    info!(job_id = %job.id, "job requeued");

    start(&services, &job, &ctx);
    (StatusCode::ACCEPTED, Json(job)).into_response()
}
