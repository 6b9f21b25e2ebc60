//! Route definitions for the `/blob` resource.
//!
//! All endpoints require authentication.

use axum::routing::post;
use axum::Router;

use crate::handlers::blob;
use crate::state::AppState;

/// Routes mounted at `/blob`.
///
/// ```text
/// POST   /sign     -> sign_blob (signed read URL)
/// POST   /fetch    -> fetch_blob (content as base64)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sign", post(blob::sign_blob))
        .route("/fetch", post(blob::fetch_blob))
}
