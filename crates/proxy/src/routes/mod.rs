pub mod blob;
pub mod health;
pub mod jobs;
pub mod validate;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use formanova_jobs::backend::DEFAULT_SUBMIT_TIMEOUT;
use formanova_jobs::resolve::DEFAULT_FETCH_TIMEOUT;

use crate::config::ProxyConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs/segmentation                submit segmentation job (POST, 202)
/// /jobs/segmentation/run            run segmentation to completion (POST)
/// /jobs/background-removal          submit background removal (POST, 202)
/// /jobs/generation                  start generation workflow (POST, 202)
/// /jobs/{id}                        job status (GET)
/// /jobs/{id}/result                 resolved job result (GET)
/// /jobs/{id}/cancel                 request cancellation (POST)
///
/// /blob/sign                        signed read URL for a blob (POST)
/// /blob/fetch                       blob content as base64 (POST)
///
/// /validate/images                  image moderation check (POST)
/// ```
///
/// Every route carries the standard request timeout except
/// `/jobs/segmentation/run`, which blocks for the whole poll schedule
/// and gets [`run_budget`] instead. Were it under the standard
/// timeout, the middleware's 408 would fire before the poller's own
/// 504 `POLL_TIMEOUT` ever could.
pub fn api_routes(config: &ProxyConfig) -> Router<AppState> {
    let standard = request_timeout(Duration::from_secs(config.request_timeout_secs));
    let run = request_timeout(run_budget(config));

    Router::new()
        .nest(
            "/jobs",
            jobs::router()
                .layer(standard.clone())
                .merge(jobs::run_router().layer(run)),
        )
        .nest("/blob", blob::router().layer(standard.clone()))
        .nest("/validate", validate::router().layer(standard))
}

/// Timeout layer answering 408 when a request exceeds its budget.
pub fn request_timeout(budget: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, budget)
}

/// Worst case for the blocking run endpoint: the submission request,
/// the full poll schedule, then the result fetch.
fn run_budget(config: &ProxyConfig) -> Duration {
    let polling =
        Duration::from_secs(config.poll_interval_secs * u64::from(config.poll_max_attempts));
    DEFAULT_SUBMIT_TIMEOUT + polling + DEFAULT_FETCH_TIMEOUT
}
