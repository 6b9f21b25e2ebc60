/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables. The Azure
/// storage settings have no useful defaults; the placeholder values
/// only keep local development without storage access working.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,

    /// Base URL of the SAM3 segmentation service.
    pub sam3_url: String,
    /// Base URL of the BiRefNet background removal service.
    pub birefnet_url: String,
    /// Base URL of the workflow gateway.
    pub gateway_url: String,
    /// Base URL of the auth service used to validate caller tokens.
    pub auth_service_url: String,
    /// Base URL of the image moderation service.
    pub moderation_url: String,

    /// Seconds between status polls (default: `1`).
    pub poll_interval_secs: u64,
    /// Maximum status polls before giving up (default: `300`).
    pub poll_max_attempts: u32,

    /// Azure storage account name.
    pub azure_storage_account: String,
    /// Azure storage account key, base64-encoded.
    pub azure_storage_key: String,
    /// Validity window of signed blob URLs in seconds (default: `3600`).
    pub sas_expiry_secs: u64,
}

impl ProxyConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SAM3_URL`              | `http://localhost:8001`    |
    /// | `BIREFNET_URL`          | `http://localhost:8002`    |
    /// | `GATEWAY_URL`           | `http://localhost:8000`    |
    /// | `AUTH_SERVICE_URL`      | `http://localhost:8010`    |
    /// | `MODERATION_URL`        | `http://localhost:8020`    |
    /// | `POLL_INTERVAL_SECS`    | `1`                        |
    /// | `POLL_MAX_ATTEMPTS`     | `300`                      |
    /// | `AZURE_STORAGE_ACCOUNT` | `devstoreaccount1`         |
    /// | `AZURE_STORAGE_KEY`     | (Azurite well-known key)   |
    /// | `SAS_EXPIRY_SECS`       | `3600`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let sam3_url = env_url("SAM3_URL", "http://localhost:8001");
        let birefnet_url = env_url("BIREFNET_URL", "http://localhost:8002");
        let gateway_url = env_url("GATEWAY_URL", "http://localhost:8000");
        let auth_service_url = env_url("AUTH_SERVICE_URL", "http://localhost:8010");
        let moderation_url = env_url("MODERATION_URL", "http://localhost:8020");

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let poll_max_attempts: u32 = std::env::var("POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("POLL_MAX_ATTEMPTS must be a valid u32");

        let azure_storage_account = std::env::var("AZURE_STORAGE_ACCOUNT")
            .unwrap_or_else(|_| "devstoreaccount1".into());

        // Azurite's published development key.
        let azure_storage_key = std::env::var("AZURE_STORAGE_KEY").unwrap_or_else(|_| {
            "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==".into()
        });

        let sas_expiry_secs: u64 = std::env::var("SAS_EXPIRY_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("SAS_EXPIRY_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            sam3_url,
            birefnet_url,
            gateway_url,
            auth_service_url,
            moderation_url,
            poll_interval_secs,
            poll_max_attempts,
            azure_storage_account,
            azure_storage_key,
            sas_expiry_secs,
        }
    }
}

/// Read a base URL env var, trimming any trailing slash so route
/// concatenation stays predictable.
fn env_url(name: &str, default: &str) -> String {
    let url = std::env::var(name).unwrap_or_else(|_| default.into());
    url.trim_end_matches('/').to_string()
}
