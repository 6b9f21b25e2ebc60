//! Token-validating authentication extractor for Axum handlers.
//!
//! The proxy holds no session state of its own: every request's
//! `x-auth-token` header is validated against the auth service's
//! `GET /users/me` endpoint, which returns the caller's profile for a
//! live token and 401 for anything else.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Deserialize;

use formanova_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// How long to wait on the auth service before failing the request.
const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated user extracted from the `x-auth-token` header.
///
/// Use this as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The caller's identifier as reported by the auth service.
    pub user_id: String,
    /// The caller's email, when the auth service includes it.
    pub email: Option<String>,
}

/// Profile payload returned by the auth service for a valid token.
#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(alias = "user_id")]
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("x-auth-token")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing x-auth-token header".into(),
                ))
            })?;

        let response = state
            .http
            .get(format!("{}/users/me", state.config.auth_service_url))
            .bearer_auth(token)
            .timeout(AUTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Auth service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid or expired token".into(),
            )));
        }

        let profile: UserProfile = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Auth service returned malformed profile: {e}"))
        })?;

        Ok(AuthUser {
            user_id: profile.id,
            email: profile.email,
        })
    }
}
