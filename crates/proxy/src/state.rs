use std::sync::Arc;
use std::time::Duration;

use formanova_blob::{AzureLocatorFetcher, SasSigner};
use formanova_core::types::JobKind;
use formanova_jobs::backend::BackendRoutes;
use formanova_jobs::{HttpJobBackend, JobOrchestrator, PollConfig};

use crate::config::ProxyConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ProxyConfig>,
    /// Shared HTTP client for auth validation and health probes.
    pub http: reqwest::Client,
    /// SAM3 segmentation service client.
    pub sam3: Arc<HttpJobBackend>,
    /// BiRefNet background removal service client.
    pub birefnet: Arc<HttpJobBackend>,
    /// Workflow gateway client.
    pub gateway: Arc<HttpJobBackend>,
    /// Orchestrator over the SAM3 service, used by the synchronous
    /// segmentation endpoint.
    pub segmentation: Arc<JobOrchestrator>,
    /// Signs read-only SAS URLs for result blobs.
    pub signer: Arc<SasSigner>,
    /// Fetches blob content, signing `azure://` locators on the way out.
    pub fetcher: Arc<AzureLocatorFetcher>,
}

impl AppState {
    /// Build application state from configuration.
    ///
    /// Fails if the storage account key is not valid base64; that is a
    /// deployment error we want surfaced at startup rather than on the
    /// first signing request.
    pub fn new(config: ProxyConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::new();

        let sam3 = Arc::new(HttpJobBackend::with_client(
            http.clone(),
            config.sam3_url.clone(),
            BackendRoutes::model_service(),
        ));
        let birefnet = Arc::new(HttpJobBackend::with_client(
            http.clone(),
            config.birefnet_url.clone(),
            BackendRoutes::model_service(),
        ));
        let gateway = Arc::new(HttpJobBackend::with_client(
            http.clone(),
            config.gateway_url.clone(),
            BackendRoutes::gateway(),
        ));

        let signer = SasSigner::new(
            config.azure_storage_account.clone(),
            &config.azure_storage_key,
            Duration::from_secs(config.sas_expiry_secs),
        )?;
        let fetcher = Arc::new(AzureLocatorFetcher::with_client(
            http.clone(),
            signer.clone(),
        ));
        let signer = Arc::new(signer);

        let poll_config = PollConfig {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.poll_max_attempts,
        };
        // Result locators from the model services are azure:// URIs, so
        // the orchestrator fetches through the signing fetcher.
        let segmentation = Arc::new(JobOrchestrator::with_fetcher(
            sam3.clone(),
            fetcher.clone(),
            poll_config,
        ));

        Ok(Self {
            config: Arc::new(config),
            http,
            sam3,
            birefnet,
            gateway,
            segmentation,
            signer,
            fetcher,
        })
    }

    /// The backend client responsible for a given job kind.
    pub fn backend_for(&self, kind: JobKind) -> &Arc<HttpJobBackend> {
        match kind {
            JobKind::Segmentation => &self.sam3,
            JobKind::BackgroundRemoval => &self.birefnet,
            JobKind::Pipeline => &self.gateway,
        }
    }
}
