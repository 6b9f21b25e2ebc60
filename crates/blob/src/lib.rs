//! Azure Blob Storage access: blob URI parsing, service SAS signing,
//! and content fetching behind the job client's locator interface.

pub mod error;
pub mod fetch;
pub mod sas;
pub mod uri;

pub use error::BlobError;
pub use fetch::AzureLocatorFetcher;
pub use sas::SasSigner;
pub use uri::BlobUri;
