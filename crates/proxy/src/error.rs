use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use formanova_blob::BlobError;
use formanova_core::error::CoreError;
use formanova_jobs::JobError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and the job and blob layer
/// errors, adding HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `formanova_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error from the job orchestration layer.
    #[error(transparent)]
    Job(#[from] JobError),

    /// An error from the blob storage layer.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An upstream service could not be reached.
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Job layer errors ---
            AppError::Job(err) => classify_job_error(err),

            // --- Blob layer errors ---
            AppError::Blob(err) => match err {
                BlobError::InvalidUri(uri) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_BLOB_URI",
                    format!("Invalid blob URI: {uri}"),
                ),
                BlobError::InvalidKey(msg) => {
                    tracing::error!(error = %msg, "Storage key misconfigured");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
                BlobError::Fetch { uri, reason } => (
                    StatusCode::BAD_GATEWAY,
                    "BLOB_FETCH_FAILED",
                    format!("Failed to fetch {uri}: {reason}"),
                ),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream unavailable");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Relay an upstream client error unchanged; everything else is our
/// gateway's fault to report.
fn relay_status(status: u16) -> StatusCode {
    match StatusCode::from_u16(status) {
        Ok(code) if code.is_client_error() => code,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Classify a job layer error into an HTTP status, error code, and message.
///
/// - An exhausted poll budget maps to 504: the work is still somewhere
///   upstream, we just stopped waiting.
/// - Upstream rejections and failures map to 502 with distinct codes so
///   callers can tell "no result produced" apart from "result exists
///   but could not be fetched".
fn classify_job_error(err: &JobError) -> (StatusCode, &'static str, String) {
    match err {
        JobError::Http(e) => {
            tracing::warn!(error = %e, "Upstream request failed");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_UNAVAILABLE",
                "Upstream service unavailable".to_string(),
            )
        }
        JobError::Submission { status, body } => (
            relay_status(*status),
            "SUBMISSION_REJECTED",
            format!("Upstream rejected submission ({status}): {body}"),
        ),
        JobError::Api { status, body } => (
            relay_status(*status),
            "UPSTREAM_ERROR",
            format!("Upstream error ({status}): {body}"),
        ),
        JobError::PollTimeout { attempts } => (
            StatusCode::GATEWAY_TIMEOUT,
            "POLL_TIMEOUT",
            format!("Job did not finish within {attempts} status polls"),
        ),
        JobError::Cancelled { .. } => (
            StatusCode::CONFLICT,
            "CANCELLED",
            "Job was cancelled before completing".to_string(),
        ),
        JobError::RemoteFailure { job_id, reason } => (
            StatusCode::BAD_GATEWAY,
            "JOB_FAILED",
            format!("Job {job_id} failed: {reason}"),
        ),
        JobError::NoResult { job_id } => (
            StatusCode::BAD_GATEWAY,
            "NO_RESULT",
            format!("Job {job_id} completed without a recognizable result"),
        ),
        JobError::ResultFetch { uri, reason } => (
            StatusCode::BAD_GATEWAY,
            "RESULT_FETCH_FAILED",
            format!("Could not fetch result from {uri}: {reason}"),
        ),
    }
}
