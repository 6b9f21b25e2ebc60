//! Error taxonomy for the job client.
//!
//! Each variant maps to a distinct failure mode so callers can
//! distinguish "the backend rejected the work" from "the work ran and
//! failed" from "we gave up waiting".

/// Errors from the job orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code at submission.
    #[error("Job submission rejected ({status}): {body}")]
    Submission {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The backend returned a non-2xx status code on a status or
    /// result request.
    #[error("Job API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The polling attempt budget was exhausted before the job reached
    /// a terminal state.
    #[error("Job did not reach a terminal state within {attempts} polls")]
    PollTimeout {
        /// Number of status requests issued before giving up.
        attempts: u32,
    },

    /// Polling was cancelled before the job reached a terminal state.
    #[error("Polling cancelled after {attempts} polls")]
    Cancelled {
        /// Number of status requests issued before cancellation.
        attempts: u32,
    },

    /// The job reached a terminal failure state on the remote side.
    #[error("Job {job_id} failed remotely: {reason}")]
    RemoteFailure {
        /// Identifier of the failed job.
        job_id: String,
        /// Failure reason reported by the backend, if any.
        reason: String,
    },

    /// The job completed but its result matched none of the known
    /// payload shapes.
    #[error("Job {job_id} completed but produced no recognizable result")]
    NoResult {
        /// Identifier of the job.
        job_id: String,
    },

    /// A result locator was recognized but fetching the bytes behind
    /// it failed.
    #[error("Failed to fetch result content from {uri}: {reason}")]
    ResultFetch {
        /// The locator whose content could not be retrieved.
        uri: String,
        /// Underlying fetch failure.
        reason: String,
    },
}
