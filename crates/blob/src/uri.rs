//! Blob URI parsing.
//!
//! Blobs are addressed two ways in result payloads: the short scheme
//! `azure://{container}/{blob}` used between services, and full
//! `https://{account}.blob.core.windows.net/{container}/{blob}` URLs.
//! Both parse into a [`BlobUri`].

use std::fmt;

use crate::error::BlobError;

/// A container/blob pair within a storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUri {
    pub container: String,
    /// Blob name, may contain `/` separators.
    pub blob: String,
}

impl BlobUri {
    pub fn new(container: impl Into<String>, blob: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blob: blob.into(),
        }
    }

    /// Parse a blob URI in either supported form.
    pub fn parse(uri: &str) -> Result<Self, BlobError> {
        if let Some(rest) = uri.strip_prefix("azure://") {
            return Self::split(rest, uri);
        }

        if let Some(rest) = uri.strip_prefix("https://") {
            // Strip the `{account}.blob.core.windows.net/` host part.
            if let Some((host, path)) = rest.split_once('/') {
                if host.ends_with(".blob.core.windows.net") {
                    // Drop any SAS query already attached.
                    let path = path.split('?').next().unwrap_or(path);
                    return Self::split(path, uri);
                }
            }
        }

        Err(BlobError::InvalidUri(uri.to_string()))
    }

    fn split(path: &str, original: &str) -> Result<Self, BlobError> {
        match path.split_once('/') {
            Some((container, blob)) if !container.is_empty() && !blob.is_empty() => {
                Ok(Self::new(container, blob))
            }
            _ => Err(BlobError::InvalidUri(original.to_string())),
        }
    }
}

impl fmt::Display for BlobUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "azure://{}/{}", self.container, self.blob)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_short_scheme() {
        let uri = BlobUri::parse("azure://masks/session-1/mask.png").unwrap();
        assert_eq!(uri.container, "masks");
        assert_eq!(uri.blob, "session-1/mask.png");
    }

    #[test]
    fn parses_https_form() {
        let uri =
            BlobUri::parse("https://acct.blob.core.windows.net/images/ring.jpg").unwrap();
        assert_eq!(uri.container, "images");
        assert_eq!(uri.blob, "ring.jpg");
    }

    #[test]
    fn https_form_drops_existing_query() {
        let uri = BlobUri::parse(
            "https://acct.blob.core.windows.net/images/ring.jpg?sv=2021-08-06&sig=x",
        )
        .unwrap();
        assert_eq!(uri.blob, "ring.jpg");
    }

    #[test]
    fn rejects_foreign_https_hosts() {
        assert_matches!(
            BlobUri::parse("https://example.com/images/ring.jpg"),
            Err(BlobError::InvalidUri(_))
        );
    }

    #[test]
    fn rejects_missing_blob_name() {
        assert_matches!(BlobUri::parse("azure://masks"), Err(BlobError::InvalidUri(_)));
        assert_matches!(BlobUri::parse("azure://masks/"), Err(BlobError::InvalidUri(_)));
    }

    #[test]
    fn display_uses_short_scheme() {
        let uri = BlobUri::new("masks", "a/b.png");
        assert_eq!(uri.to_string(), "azure://masks/a/b.png");
    }
}
