//! Blob content fetching behind the job client's locator interface.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use formanova_jobs::error::JobError;
use formanova_jobs::resolve::LocatorFetcher;

use crate::error::BlobError;
use crate::sas::SasSigner;
use crate::uri::BlobUri;

/// How long a single blob download may take before failing as
/// [`BlobError::Fetch`]. Independent of any outer request deadline.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches result locators, signing `azure://` URIs on the way out.
///
/// Plain `https://` locators are assumed to be already readable (a
/// pre-signed URL or a public endpoint) and fetched as-is.
pub struct AzureLocatorFetcher {
    client: reqwest::Client,
    signer: SasSigner,
    timeout: Duration,
}

impl AzureLocatorFetcher {
    pub fn new(signer: SasSigner) -> Self {
        Self::with_client(reqwest::Client::new(), signer)
    }

    pub fn with_client(client: reqwest::Client, signer: SasSigner) -> Self {
        Self {
            client,
            signer,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch a blob and return its content base64-encoded.
    pub async fn fetch_as_base64(&self, uri: &str) -> Result<String, BlobError> {
        let bytes = self.fetch_bytes(uri).await?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Fetch a blob's raw bytes, signing the URL when needed.
    pub async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, BlobError> {
        let url = if uri.starts_with("azure://") {
            self.signer.signed_url(&BlobUri::parse(uri)?)?
        } else {
            uri.to_string()
        };

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BlobError::Fetch {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::Fetch {
                uri: uri.to_string(),
                reason: format!("storage returned {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| BlobError::Fetch {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(uri, size = bytes.len(), "Fetched blob content");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl LocatorFetcher for AzureLocatorFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, JobError> {
        self.fetch_bytes(uri).await.map_err(|e| match e {
            BlobError::Fetch { uri, reason } => JobError::ResultFetch { uri, reason },
            other => JobError::ResultFetch {
                uri: uri.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const TEST_KEY: &str = "c2VjcmV0LWFjY291bnQta2V5LWZvci10ZXN0aW5n";

    fn fetcher() -> AzureLocatorFetcher {
        let signer = SasSigner::new("testacct", TEST_KEY, Duration::from_secs(3600)).unwrap();
        AzureLocatorFetcher::new(signer)
    }

    #[tokio::test]
    async fn stalled_storage_endpoint_times_out_as_fetch_error() {
        // Accepts connections but never answers; only the fetcher's own
        // timeout can end this request.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let fetcher = fetcher().with_timeout(Duration::from_millis(200));
        let err = fetcher
            .fetch_bytes(&format!("http://{addr}/masks/m.png"))
            .await
            .unwrap_err();
        assert_matches!(err, BlobError::Fetch { .. });
    }

    #[tokio::test]
    async fn unparseable_azure_uri_is_rejected_before_any_request() {
        let err = fetcher().fetch_bytes("azure://only-container").await.unwrap_err();
        assert_matches!(err, BlobError::InvalidUri(_));
    }
}
