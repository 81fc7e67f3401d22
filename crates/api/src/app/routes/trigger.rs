//! `POST /process`: one invocation of a deletion job.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info};

use reclaim_auth::authorize_job;
use reclaim_infra::continuation::http::PREFER_ASYNC;
use reclaim_infra::{Invocation, RunOutcome};

use crate::app::dto::{TriggerRequest, TriggerResponse, MISSING_RECORD};
use crate::app::errors::{authz_error_to_response, json_error, processor_error_to_response};
use crate::app::services::AppServices;
use crate::context::CallerContext;

/// Validates the payload and the caller, then runs the job on its own task.
/// The response waits for the run unless the request carries
/// `Prefer: respond-async`.
pub async fn process(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    headers: HeaderMap,
    body: Result<Json<TriggerRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                format!("Invalid payload: {}", rejection.body_text()),
            );
        }
    };

    let Some(record) = request.record else {
        return json_error(StatusCode::BAD_REQUEST, MISSING_RECORD);
    };
    let job = match record.into_job(&services.default_bucket) {
        Ok(job) => job,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, message),
    };

    if let Err(e) = authorize_job(ctx.caller(), job.user_id) {
        return authz_error_to_response(e);
    }

    let invocation = match Invocation::new(job, request.current_path.as_deref()) {
        Ok(invocation) => invocation,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, format!("Invalid payload: {e}")),
    };

    info!(
        job_id = %invocation.record.id,
        user_id = %invocation.record.user_id,
        path = %invocation.cursor,
        "trigger received"
    );

    if prefers_async(&headers) {
        let job_id = invocation.record.id;
        services.spawn_run(invocation, ctx.authorization().clone());
        return (StatusCode::ACCEPTED, Json(TriggerResponse::accepted(job_id))).into_response();
    }

    // The run lives on its own task; a disconnecting client only drops the
    // waiter, never the run.
    let job_id = invocation.record.id;
    let handle = services.start_run(invocation, ctx.authorization().clone());
    match handle.await {
        Ok(Ok(RunOutcome::Completed { deleted, .. })) => {
            Json(TriggerResponse::completed(deleted)).into_response()
        }
        Ok(Ok(RunOutcome::HandedOff { path, .. })) => {
            Json(TriggerResponse::handed_off(path)).into_response()
        }
        Ok(Err(e)) => processor_error_to_response(e),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "run task panicked");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn prefers_async(headers: &HeaderMap) -> bool {
    headers
        .get_all("prefer")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|pref| pref.trim().eq_ignore_ascii_case(PREFER_ASYNC))
}
