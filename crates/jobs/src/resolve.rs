//! Result-shape resolution for completed jobs.
//!
//! Completed jobs hand back JSON in one of several shapes depending on
//! which backend produced them. [`classify`] probes the known shapes in
//! a fixed priority order and normalizes whatever it finds into a
//! [`ResultPayload`]: either a locator pointing at the content, or the
//! content itself inlined as base64.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use formanova_core::types::{JobId, Timestamp};
use serde::Serialize;

use crate::error::JobError;

/// Normalized form of a job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ResultPayload {
    /// URI at which the result content can be fetched.
    Locator(String),
    /// Base64-encoded result content returned inline.
    InlineBase64(String),
}

impl ResultPayload {
    /// The locator URI, when the payload is one.
    pub fn as_locator(&self) -> Option<&str> {
        match self {
            ResultPayload::Locator(uri) => Some(uri),
            ResultPayload::InlineBase64(_) => None,
        }
    }
}

/// Probe a completed job's result JSON for a known payload shape.
///
/// Shapes are tried in priority order:
///
/// 1. segmentation output, `{"sam3": [{"mask": {"uri": ...}}]}`
/// 2. flat locator keys, `mask_uri` / `refined_mask_uri` / `result_uri`
/// 3. wrapped locator, `{"result": {"uri": ...}}`
/// 4. inline content, `result_base64` / `image_base64`
///
/// Returns `None` when nothing matches.
pub fn classify(value: &serde_json::Value) -> Option<ResultPayload> {
    if let Some(uri) = value
        .get("sam3")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("mask"))
        .and_then(|v| v.get("uri"))
        .and_then(|v| v.as_str())
    {
        return Some(ResultPayload::Locator(uri.to_string()));
    }

    for key in ["mask_uri", "refined_mask_uri", "result_uri"] {
        if let Some(uri) = value.get(key).and_then(|v| v.as_str()) {
            return Some(ResultPayload::Locator(uri.to_string()));
        }
    }

    if let Some(uri) = value
        .get("result")
        .and_then(|v| v.get("uri"))
        .and_then(|v| v.as_str())
    {
        return Some(ResultPayload::Locator(uri.to_string()));
    }

    for key in ["result_base64", "image_base64"] {
        if let Some(data) = value.get(key).and_then(|v| v.as_str()) {
            return Some(ResultPayload::InlineBase64(data.to_string()));
        }
    }

    None
}

/// An immutable record of a resolved job result.
///
/// Once constructed the reference never changes; resolving the same job
/// again must yield the same payload.
#[derive(Debug, Clone, Serialize)]
pub struct ResultReference {
    /// The job this result belongs to.
    pub job_id: JobId,
    /// The normalized result payload.
    pub payload: ResultPayload,
    /// When resolution happened.
    pub resolved_at: Timestamp,
}

impl ResultReference {
    /// Resolve a completed job's result JSON into a reference.
    ///
    /// Returns [`JobError::NoResult`] when the JSON matches none of the
    /// known shapes.
    pub fn resolve(job_id: &str, value: &serde_json::Value) -> Result<Self, JobError> {
        let payload = classify(value).ok_or_else(|| JobError::NoResult {
            job_id: job_id.to_string(),
        })?;
        Ok(Self {
            job_id: job_id.to_string(),
            payload,
            resolved_at: chrono::Utc::now(),
        })
    }

    /// Materialize the result content as raw bytes.
    ///
    /// Locators are fetched through the given [`LocatorFetcher`];
    /// inline payloads are base64-decoded locally.
    pub async fn content(&self, fetcher: &dyn LocatorFetcher) -> Result<Vec<u8>, JobError> {
        match &self.payload {
            ResultPayload::Locator(uri) => fetcher.fetch(uri).await,
            ResultPayload::InlineBase64(data) => base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| JobError::ResultFetch {
                    uri: "<inline>".to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

/// Fetches the bytes behind a result locator.
#[async_trait]
pub trait LocatorFetcher: Send + Sync {
    /// Fetch the content at `uri`.
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, JobError>;
}

/// How long a locator fetch may take before it fails as
/// [`JobError::ResultFetch`]. The fetch is a secondary request after
/// the job itself finished; it gets its own budget, independent of any
/// outer request deadline.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetcher for plain HTTP(S) locators that are already directly
/// readable (e.g. pre-signed URLs).
pub struct HttpLocatorFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpLocatorFetcher {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpLocatorFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocatorFetcher for HttpLocatorFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, JobError> {
        let response = self
            .client
            .get(uri)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| JobError::ResultFetch {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobError::ResultFetch {
                uri: uri.to_string(),
                reason: format!("upstream returned {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| JobError::ResultFetch {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
