use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use reclaim_auth::AuthzError;
use reclaim_infra::jobs::JobStoreError;
use reclaim_infra::ProcessorError;

/// `{"error": message}` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": message.into(),
        })),
    )
        .into_response()
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::UserMismatch => json_error(StatusCode::FORBIDDEN, "Unauthorized: User ID mismatch"),
        AuthzError::ServiceRoleRequired => json_error(StatusCode::FORBIDDEN, "Service role required"),
    }
}

pub fn store_error_to_response(err: JobStoreError) -> axum::response::Response {
    match err {
        JobStoreError::NotFound(id) => json_error(StatusCode::NOT_FOUND, format!("job not found: {id}")),
        JobStoreError::AlreadyExists(id) => {
            json_error(StatusCode::CONFLICT, format!("job already exists: {id}"))
        }
        JobStoreError::Domain(e) => json_error(StatusCode::CONFLICT, e.to_string()),
        JobStoreError::Storage(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, msg),
    }
}

pub fn processor_error_to_response(err: ProcessorError) -> axum::response::Response {
    match err {
        ProcessorError::InvalidPayload(e) => json_error(StatusCode::BAD_REQUEST, e.to_string()),
        other => json_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}
