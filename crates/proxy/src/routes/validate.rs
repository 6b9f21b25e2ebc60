//! Route definitions for the `/validate` resource.
//!
//! All endpoints require authentication.

use axum::routing::post;
use axum::Router;

use crate::handlers::validate;
use crate::state::AppState;

/// Routes mounted at `/validate`.
///
/// ```text
/// POST   /images   -> validate_images (moderation check)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/images", post(validate::validate_images))
}
