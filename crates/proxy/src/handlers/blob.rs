//! Handlers for the `/blob` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Storage
//! credentials never leave the server: callers receive either a
//! time-boxed signed URL or the content itself.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use formanova_blob::BlobUri;
use formanova_core::types::Timestamp;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BlobRequest {
    /// Blob URI, either `azure://{container}/{blob}` or a full
    /// `https://{account}.blob.core.windows.net/...` URL.
    pub uri: String,
}

#[derive(Serialize)]
struct SignResponse {
    sas_url: String,
    expires_at: Timestamp,
}

/// POST /api/v1/blob/sign
///
/// Produce a read-only signed URL for a blob.
pub async fn sign_blob(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<BlobRequest>,
) -> AppResult<Json<impl Serialize>> {
    let blob = BlobUri::parse(&input.uri)?;
    let start = Utc::now();
    let sas_url = state.signer.signed_url_at(&blob, start)?;

    tracing::debug!(uri = %input.uri, user_id = %auth.user_id, "Signed blob URL");

    Ok(Json(SignResponse {
        sas_url,
        expires_at: start + chrono::Duration::seconds(state.config.sas_expiry_secs as i64),
    }))
}

#[derive(Serialize)]
struct FetchResponse {
    base64: String,
}

/// POST /api/v1/blob/fetch
///
/// Fetch a blob's content and return it base64-encoded. Used by
/// clients that cannot reach storage directly.
pub async fn fetch_blob(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<BlobRequest>,
) -> AppResult<Json<impl Serialize>> {
    let base64 = state.fetcher.fetch_as_base64(&input.uri).await?;
    Ok(Json(FetchResponse { base64 }))
}
