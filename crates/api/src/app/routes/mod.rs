use axum::{
    routing::{get, post},
    Router,
};

pub mod jobs;
pub mod system;
pub mod trigger;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/process", post(trigger::process))
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/:job_id", get(jobs::get_job))
        .route("/jobs/:job_id/requeue", post(jobs::requeue_job))
}
