//! Handlers for the `/validate` resource.
//!
//! Image moderation is advisory: when the moderation service is down
//! or returns something unparseable, every image passes and the
//! response flags that moderation did not actually run. Blocking a
//! photoshoot because an auxiliary service is unavailable is worse
//! than letting an unchecked image through to a human review step.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use formanova_core::error::CoreError;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// How long to wait on the moderation service before falling back.
const MODERATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ValidateImagesRequest {
    #[validate(length(min = 1, message = "at least one image URI is required"))]
    pub image_uris: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageVerdict {
    pub uri: String,
    pub acceptable: bool,
    /// Moderation confidence in `[0, 1]`; zero when moderation did not run.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
struct ValidateImagesResponse {
    results: Vec<ImageVerdict>,
    /// False when the moderation service could not be consulted and
    /// the verdicts are permissive defaults.
    moderation_available: bool,
}

#[derive(Deserialize)]
struct ModerationReply {
    results: Vec<ImageVerdict>,
}

/// POST /api/v1/validate/images
///
/// Check a batch of images against the moderation service.
pub async fn validate_images(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ValidateImagesRequest>,
) -> AppResult<Json<impl Serialize>> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    match moderate(&state, &input).await {
        Ok(results) => Ok(Json(ValidateImagesResponse {
            results,
            moderation_available: true,
        })),
        Err(reason) => {
            tracing::warn!(
                error = %reason,
                user_id = %auth.user_id,
                images = input.image_uris.len(),
                "Moderation unavailable, approving by default",
            );
            let results = input
                .image_uris
                .into_iter()
                .map(|uri| ImageVerdict {
                    uri,
                    acceptable: true,
                    confidence: 0.0,
                    message: Some("Moderation unavailable, accepted by default".into()),
                })
                .collect();
            Ok(Json(ValidateImagesResponse {
                results,
                moderation_available: false,
            }))
        }
    }
}

/// Ask the moderation service for verdicts. Any failure along the way
/// (network, non-2xx, malformed body) is reported as a string so the
/// caller can fall back.
async fn moderate(
    state: &AppState,
    input: &ValidateImagesRequest,
) -> Result<Vec<ImageVerdict>, String> {
    let response = state
        .http
        .post(format!("{}/validate", state.config.moderation_url))
        .json(input)
        .timeout(MODERATION_TIMEOUT)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("moderation service returned {status}"));
    }

    let reply: ModerationReply = response.json().await.map_err(|e| e.to_string())?;
    Ok(reply.results)
}
