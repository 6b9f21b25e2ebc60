//! HTTP backend client for job submission, status, results, and
//! cancellation.
//!
//! Wraps the remote job APIs (model services and the workflow gateway)
//! using [`reqwest`]. Backends disagree on route shapes, so each
//! [`HttpJobBackend`] carries a route table with `{id}` placeholders.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::JobError;
use crate::status::StatusReport;

/// Response returned by a backend after successfully accepting a job.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the accepted job.
    #[serde(alias = "workflow_id", alias = "workflowId", alias = "jobId")]
    pub job_id: String,
    /// Initial status string, when the backend reports one.
    #[serde(default)]
    pub status: Option<String>,
}

/// A remote system that accepts work and reports on it.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit a job payload. Returns the backend-assigned identifier.
    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, JobError>;

    /// Fetch the current status of a job.
    async fn status(&self, job_id: &str) -> Result<StatusReport, JobError>;

    /// Fetch the result payload of a completed job.
    async fn result(&self, job_id: &str) -> Result<serde_json::Value, JobError>;

    /// Request cancellation of a queued or running job.
    async fn cancel(&self, job_id: &str) -> Result<(), JobError>;
}

/// Route templates for one backend. `{id}` is replaced with the job
/// identifier.
#[derive(Debug, Clone)]
pub struct BackendRoutes {
    pub submit: String,
    pub status: String,
    pub result: String,
    pub cancel: String,
}

impl BackendRoutes {
    /// Routes of the SAM3 and BiRefNet model services.
    pub fn model_service() -> Self {
        Self {
            submit: "/jobs".into(),
            status: "/status/{id}".into(),
            result: "/result/{id}".into(),
            cancel: "/cancel/{id}".into(),
        }
    }

    /// Routes of the workflow gateway.
    pub fn gateway() -> Self {
        Self {
            submit: "/workflow/start".into(),
            status: "/workflow/{id}".into(),
            result: "/workflow/{id}/result".into(),
            cancel: "/workflow/{id}/cancel".into(),
        }
    }

    fn fill(template: &str, job_id: &str) -> String {
        template.replace("{id}", job_id)
    }
}

/// HTTP client for a single job backend.
///
/// Two independent per-request budgets apply: submissions may carry a
/// large inline image and start a heavyweight pipeline, so they get a
/// generous timeout; status, result, and cancel requests are small and
/// get a short one.
pub struct HttpJobBackend {
    client: reqwest::Client,
    base_url: String,
    routes: BackendRoutes,
    submit_timeout: std::time::Duration,
    request_timeout: std::time::Duration,
}

/// Default budget for submission requests.
pub const DEFAULT_SUBMIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(600);
/// Default budget for status, result, and cancel requests.
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

impl HttpJobBackend {
    /// Create a new backend client with default timeouts.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://host:8001`.
    pub fn new(base_url: String, routes: BackendRoutes) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, routes)
    }

    /// Create a backend client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across multiple backends).
    pub fn with_client(client: reqwest::Client, base_url: String, routes: BackendRoutes) -> Self {
        Self {
            client,
            base_url,
            routes,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request budgets.
    pub fn with_timeouts(
        mut self,
        submit_timeout: std::time::Duration,
        request_timeout: std::time::Duration,
    ) -> Self {
        self.submit_timeout = submit_timeout;
        self.request_timeout = request_timeout;
        self
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`JobError::Api`] containing
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, JobError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, JobError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), JobError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, JobError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, self.routes.submit))
            .timeout(self.submit_timeout)
            .json(payload)
            .send()
            .await?;

        // Submission rejection gets its own variant so callers can map
        // it to a client error rather than an upstream failure.
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobError::Submission {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<SubmitResponse>().await?)
    }

    async fn status(&self, job_id: &str) -> Result<StatusReport, JobError> {
        let path = BackendRoutes::fill(&self.routes.status, job_id);
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn result(&self, job_id: &str) -> Result<serde_json::Value, JobError> {
        let path = BackendRoutes::fill(&self.routes.result, job_id);
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn cancel(&self, job_id: &str) -> Result<(), JobError> {
        let path = BackendRoutes::fill(&self.routes.cancel, job_id);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::check_status(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_templates_fill_id() {
        let routes = BackendRoutes::model_service();
        assert_eq!(BackendRoutes::fill(&routes.status, "j-9"), "/status/j-9");
        assert_eq!(BackendRoutes::fill(&routes.result, "j-9"), "/result/j-9");

        let gateway = BackendRoutes::gateway();
        assert_eq!(
            BackendRoutes::fill(&gateway.cancel, "wf-1"),
            "/workflow/wf-1/cancel"
        );
    }

    #[test]
    fn submit_response_accepts_workflow_id() {
        let resp: SubmitResponse =
            serde_json::from_str(r#"{"workflow_id": "wf-3", "status": "RUNNING"}"#).unwrap();
        assert_eq!(resp.job_id, "wf-3");
        assert_eq!(resp.status.as_deref(), Some("RUNNING"));
    }

    #[test]
    fn submit_response_accepts_job_id() {
        let resp: SubmitResponse = serde_json::from_str(r#"{"job_id": "j-3"}"#).unwrap();
        assert_eq!(resp.job_id, "j-3");
        assert!(resp.status.is_none());
    }
}
