//! Route definitions for the `/jobs` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /segmentation           -> submit_segmentation (202)
/// POST   /background-removal     -> submit_background_removal (202)
/// POST   /generation             -> submit_generation (202)
/// GET    /{id}                   -> job_status
/// GET    /{id}/result            -> job_result
/// POST   /{id}/cancel            -> cancel_job
/// ```
///
/// The blocking run endpoint lives in [`run_router`] so it can carry
/// its own, much longer timeout.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/segmentation", post(jobs::submit_segmentation))
        .route("/background-removal", post(jobs::submit_background_removal))
        .route("/generation", post(jobs::submit_generation))
        .route("/{id}", get(jobs::job_status))
        .route("/{id}/result", get(jobs::job_result))
        .route("/{id}/cancel", post(jobs::cancel_job))
}

/// The blocking segmentation endpoint, mounted alongside [`router`].
///
/// ```text
/// POST   /segmentation/run       -> run_segmentation (blocking)
/// ```
pub fn run_router() -> Router<AppState> {
    Router::new().route("/segmentation/run", post(jobs::run_segmentation))
}
