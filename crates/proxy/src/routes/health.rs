use std::time::Duration;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// How long to wait on each upstream's health endpoint.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status: `ok` when every upstream responds,
    /// `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Per-upstream reachability.
    pub upstreams: UpstreamHealth,
}

#[derive(Serialize)]
pub struct UpstreamHealth {
    pub sam3: bool,
    pub birefnet: bool,
    pub gateway: bool,
    pub auth: bool,
    pub moderation: bool,
}

/// GET /health -- returns service and upstream health.
///
/// Upstream probes run concurrently, each with its own timeout, so a
/// hung upstream delays the response by at most [`UPSTREAM_TIMEOUT`].
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (sam3, birefnet, gateway, auth, moderation) = futures::join!(
        probe(&state, &state.config.sam3_url),
        probe(&state, &state.config.birefnet_url),
        probe(&state, &state.config.gateway_url),
        probe(&state, &state.config.auth_service_url),
        probe(&state, &state.config.moderation_url),
    );

    let upstreams = UpstreamHealth {
        sam3,
        birefnet,
        gateway,
        auth,
        moderation,
    };

    let all_healthy = sam3 && birefnet && gateway && auth && moderation;
    let status = if all_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        upstreams,
    })
}

/// Probe one upstream's `/health` endpoint.
async fn probe(state: &AppState, base_url: &str) -> bool {
    state
        .http
        .get(format!("{base_url}/health"))
        .timeout(UPSTREAM_TIMEOUT)
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
