//! Errors from the blob storage layer.

/// Errors from blob URI handling, SAS signing, and blob fetching.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The URI did not match any supported blob addressing scheme.
    #[error("Invalid blob URI: {0}")]
    InvalidUri(String),

    /// The storage account key is not valid base64.
    #[error("Invalid storage account key: {0}")]
    InvalidKey(String),

    /// Fetching blob content over HTTP failed.
    #[error("Blob fetch failed for {uri}: {reason}")]
    Fetch {
        /// The blob URI whose content could not be retrieved.
        uri: String,
        /// Underlying failure.
        reason: String,
    },
}
