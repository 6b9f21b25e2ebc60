//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Submission
//! endpoints return 202 with the backend-assigned job identifier;
//! status requests are stateless forwards, one upstream round trip per
//! request. Any `azure://` locator inside a completed result gains a
//! sibling signed URL so browsers can fetch content directly.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use formanova_blob::{BlobUri, SasSigner};
use formanova_core::error::CoreError;
use formanova_core::types::{BrushStroke, JobKind, JobState, MaskPoint, WorkflowStep};
use formanova_jobs::resolve::{ResultPayload, ResultReference};
use formanova_jobs::{JobBackend, JobError};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run `validator` checks, surfacing failures as a 400.
fn validated<T: Validate>(input: &T) -> AppResult<()> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))
}

/// Serialize a request body for upstream submission.
fn to_payload<T: Serialize>(input: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(input)
        .map_err(|e| AppError::InternalError(format!("Failed to encode payload: {e}")))
}

/// Map an upstream 404 onto our own, so callers probing a stale job id
/// get a NOT_FOUND instead of a generic upstream error.
fn map_unknown_job(err: JobError, id: &str) -> AppError {
    match err {
        JobError::Api { status: 404, .. } => {
            AppError::Core(CoreError::NotFound(format!("Job {id} not found")))
        }
        other => AppError::Job(other),
    }
}

/// Walk a result payload and, for every object entry whose string value
/// is an `azure://` locator, insert a sibling `{key}_signed_url` entry.
///
/// A locator we fail to sign is left without a sibling; the raw
/// locator still tells the caller what exists.
fn attach_signed_urls(value: &mut serde_json::Value, signer: &SasSigner) {
    match value {
        serde_json::Value::Object(map) => {
            let mut signed = Vec::new();
            for (key, entry) in map.iter_mut() {
                if let Some(uri) = entry.as_str() {
                    if uri.starts_with("azure://") {
                        match BlobUri::parse(uri).and_then(|blob| signer.signed_url(&blob)) {
                            Ok(url) => signed.push((format!("{key}_signed_url"), url)),
                            Err(e) => {
                                tracing::warn!(uri, error = %e, "Could not sign result locator")
                            }
                        }
                        continue;
                    }
                }
                attach_signed_urls(entry, signer);
            }
            for (key, url) in signed {
                map.insert(key, serde_json::Value::String(url));
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                attach_signed_urls(item, signer);
            }
        }
        _ => {}
    }
}

/// Signed URL for a locator payload, when it is an `azure://` locator.
fn sign_locator(payload: &ResultPayload, signer: &SasSigner) -> Option<String> {
    let uri = payload.as_locator()?;
    if !uri.starts_with("azure://") {
        return None;
    }
    match BlobUri::parse(uri).and_then(|blob| signer.signed_url(&blob)) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(uri, error = %e, "Could not sign result locator");
            None
        }
    }
}

#[derive(Serialize)]
struct AcceptedResponse {
    job_id: String,
    status: JobState,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Segmentation request: an image (locator or inline base64) plus user
/// point prompts and optional refinement strokes.
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct SegmentationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[validate(length(min = 1, message = "at least one point is required"), nested)]
    pub points: Vec<MaskPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub strokes: Option<Vec<BrushStroke>>,
}

impl SegmentationRequest {
    fn check_image(&self) -> AppResult<()> {
        if self.image_uri.is_none() && self.image_base64.is_none() {
            return Err(AppError::Core(CoreError::Validation(
                "either image_uri or image_base64 is required".into(),
            )));
        }
        Ok(())
    }
}

/// POST /api/v1/jobs/segmentation
///
/// Submit a segmentation job to the SAM3 service. Returns 202 with the
/// backend-assigned job identifier.
pub async fn submit_segmentation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SegmentationRequest>,
) -> AppResult<impl IntoResponse> {
    validated(&input)?;
    input.check_image()?;
    let accepted = state.sam3.submit(&to_payload(&input)?).await?;

    tracing::info!(
        job_id = %accepted.job_id,
        user_id = %auth.user_id,
        points = input.points.len(),
        "Segmentation job submitted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            job_id: accepted.job_id,
            status: JobState::Pending,
        }),
    ))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BackgroundRemovalRequest {
    pub image_uri: String,
}

/// POST /api/v1/jobs/background-removal
///
/// Submit a background removal job to the BiRefNet service. Returns 202.
pub async fn submit_background_removal(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<BackgroundRemovalRequest>,
) -> AppResult<impl IntoResponse> {
    let accepted = state.birefnet.submit(&to_payload(&input)?).await?;

    tracing::info!(
        job_id = %accepted.job_id,
        user_id = %auth.user_id,
        "Background removal job submitted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            job_id: accepted.job_id,
            status: JobState::Pending,
        }),
    ))
}

/// Generation request: source image and mask locators plus styling
/// inputs for the photoshoot pipeline.
#[derive(Debug, Deserialize, Serialize)]
pub struct GenerationRequest {
    pub image_uri: String,
    pub mask_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strokes: Option<Vec<BrushStroke>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// POST /api/v1/jobs/generation
///
/// Start a photoshoot generation workflow on the gateway. Returns 202.
pub async fn submit_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<GenerationRequest>,
) -> AppResult<impl IntoResponse> {
    let accepted = state.gateway.submit(&to_payload(&input)?).await?;

    tracing::info!(
        job_id = %accepted.job_id,
        user_id = %auth.user_id,
        "Generation workflow started",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            job_id: accepted.job_id,
            status: JobState::Pending,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status and results
// ---------------------------------------------------------------------------

/// Query parameters selecting which backend a job identifier belongs to.
#[derive(Debug, Deserialize)]
pub struct KindQuery {
    /// Defaults to the generation workflow, the longest-lived job kind.
    #[serde(default = "default_kind")]
    pub kind: JobKind,
}

fn default_kind() -> JobKind {
    JobKind::Pipeline
}

#[derive(Serialize)]
struct StatusResponse {
    job_id: String,
    status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_step: Option<WorkflowStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// GET /api/v1/jobs/{id}
///
/// Fetch and normalize the current status of a job. One upstream round
/// trip per request; no state is held between calls. Locators inside a
/// result carried on the report come back with signed siblings.
pub async fn job_status(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<KindQuery>,
) -> AppResult<Json<impl Serialize>> {
    let report = state
        .backend_for(query.kind)
        .status(&id)
        .await
        .map_err(|e| map_unknown_job(e, &id))?;

    let status = report.state();
    let mut result = report.result;
    if let Some(value) = result.as_mut() {
        attach_signed_urls(value, &state.signer);
    }

    Ok(Json(StatusResponse {
        status,
        job_id: report.job_id,
        progress: report.progress,
        current_step: report.current_step,
        result,
        error: report.error,
    }))
}

#[derive(Serialize)]
struct ResultResponse {
    #[serde(flatten)]
    reference: ResultReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    signed_url: Option<String>,
}

/// GET /api/v1/jobs/{id}/result
///
/// Fetch a completed job's result and normalize it into a locator or
/// inline payload. Unrecognizable results surface as 502 `NO_RESULT`.
pub async fn job_result(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<KindQuery>,
) -> AppResult<Json<impl Serialize>> {
    let value = state
        .backend_for(query.kind)
        .result(&id)
        .await
        .map_err(|e| map_unknown_job(e, &id))?;
    let reference = ResultReference::resolve(&id, &value)?;
    let signed_url = sign_locator(&reference.payload, &state.signer);

    Ok(Json(ResultResponse {
        reference,
        signed_url,
    }))
}

/// POST /api/v1/jobs/{id}/cancel
///
/// Ask the backend to cancel a job. Cancellation is asynchronous on the
/// backend side, so the response reports `CANCELLING` rather than a
/// terminal state. An id the backend does not know maps to 404.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<KindQuery>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .backend_for(query.kind)
        .cancel(&id)
        .await
        .map_err(|e| map_unknown_job(e, &id))?;

    tracing::info!(job_id = %id, user_id = %auth.user_id, "Job cancellation requested");

    Ok(Json(serde_json::json!({
        "job_id": id,
        "status": "CANCELLING",
    })))
}

// ---------------------------------------------------------------------------
// Synchronous segmentation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunResponse {
    job_id: String,
    status: JobState,
    result: ResultReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    signed_url: Option<String>,
}

/// POST /api/v1/jobs/segmentation/run
///
/// Submit a segmentation job and block until it resolves. Intended for
/// interactive mask preview, where segmentation finishes in seconds and
/// a second round trip per poll from the browser is not worth it. The
/// poll budget still applies; an exhausted budget surfaces as 504.
pub async fn run_segmentation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SegmentationRequest>,
) -> AppResult<Json<impl Serialize>> {
    validated(&input)?;
    input.check_image()?;
    let payload = to_payload(&input)?;

    let cancel = CancellationToken::new();
    let (job, reference) = state
        .segmentation
        .run_to_completion(JobKind::Segmentation, &payload, &cancel)
        .await?;

    tracing::info!(
        job_id = %job.id,
        user_id = %auth.user_id,
        "Segmentation resolved synchronously",
    );

    let signed_url = sign_locator(&reference.payload, &state.signer);

    Ok(Json(RunResponse {
        job_id: job.id,
        status: job.state,
        result: reference,
        signed_url,
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn signer() -> SasSigner {
        SasSigner::new(
            "testacct",
            "c2VjcmV0LWFjY291bnQta2V5LWZvci10ZXN0aW5n",
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    #[test]
    fn signed_siblings_added_for_azure_locators() {
        let signer = signer();
        let mut value = json!({
            "mask_uri": "azure://masks/m.png",
            "meta": {"thumb_uri": "azure://masks/t.png"},
            "plain": "not a locator",
        });

        attach_signed_urls(&mut value, &signer);

        let signed = value["mask_uri_signed_url"].as_str().unwrap();
        assert!(signed.starts_with("https://testacct.blob.core.windows.net/masks/m.png?"));
        assert!(value["meta"]["thumb_uri_signed_url"].is_string());
        assert!(value.get("plain_signed_url").is_none());
        // The raw locators stay untouched.
        assert_eq!(value["mask_uri"], "azure://masks/m.png");
    }

    #[test]
    fn locators_inside_arrays_are_signed() {
        let signer = signer();
        let mut value = json!({"sam3": [{"mask": {"uri": "azure://masks/m.png"}}]});

        attach_signed_urls(&mut value, &signer);

        assert!(value["sam3"][0]["mask"]["uri_signed_url"].is_string());
    }

    #[test]
    fn non_azure_locator_payload_is_not_signed() {
        let signer = signer();
        let payload = ResultPayload::Locator("https://example.com/out.png".into());
        assert!(sign_locator(&payload, &signer).is_none());

        let inline = ResultPayload::InlineBase64("aGk=".into());
        assert!(sign_locator(&inline, &signer).is_none());
    }

    #[test]
    fn azure_locator_payload_gets_signed_url() {
        let signer = signer();
        let payload = ResultPayload::Locator("azure://masks/m.png".into());
        let url = sign_locator(&payload, &signer).unwrap();
        assert!(url.contains("sig="));
    }

    #[test]
    fn segmentation_request_requires_an_image() {
        let input: SegmentationRequest = serde_json::from_value(json!({
            "points": [{"x": 0.5, "y": 0.5, "label": 1}],
        }))
        .unwrap();
        assert!(input.check_image().is_err());

        let input: SegmentationRequest = serde_json::from_value(json!({
            "image_base64": "aGk=",
            "points": [{"x": 0.5, "y": 0.5, "label": 1}],
        }))
        .unwrap();
        assert!(input.check_image().is_ok());
    }
}
