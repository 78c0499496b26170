//! Quote PDF storage.
//!
//! Backends share the [`PdfStorage`] trait and are chosen at startup from
//! `PDF_STORAGE_BACKEND`. The returned path is what the quote row keeps; it
//! carries its backend's scheme (`gcs://`, `azure://`) or is a local path.

mod azure;
mod gcs;
mod local;

pub use azure::AzureBlobStorage;
pub use gcs::GcsStorage;
pub use local::LocalStorage;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use thiserror::Error;

use crate::config::StorageConfig;

/// Content type of every stored document.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Errors from storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Local filesystem failure.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure talking to a remote backend.
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote backend answered with an error status.
    #[error("storage backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The stored path is not one this backend can read.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    /// The path resolves outside the storage directory.
    #[error("path is outside of the storage directory: {0}")]
    OutsideStorage(String),

    /// No access token could be obtained.
    #[error("storage credentials unavailable: {0}")]
    Credentials(String),
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Value to persist on the quote and hand back to [`PdfStorage::load`].
    pub path: String,
    /// Bare file name, used as the attachment name.
    pub filename: String,
}

/// Where quote PDFs live.
#[async_trait]
pub trait PdfStorage: Send + Sync + 'static {
    /// Persist a rendered quote.
    async fn store(&self, quote_number: &str, bytes: Vec<u8>) -> Result<StoredFile, StorageError>;

    /// Read back a document previously returned by [`PdfStorage::store`].
    async fn load(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build the configured backend.
#[must_use]
pub fn from_config(config: &StorageConfig) -> Arc<dyn PdfStorage> {
    match config {
        StorageConfig::Local { dir } => Arc::new(LocalStorage::new(dir.clone())),
        StorageConfig::Gcs { bucket, .. } => Arc::new(GcsStorage::new(bucket.clone())),
        StorageConfig::Azure {
            container_url,
            sas_token,
        } => Arc::new(AzureBlobStorage::new(container_url.clone(), sas_token.clone())),
    }
}

/// `<sanitized-number>-<millis>-<8 hex>.pdf`.
///
/// Anything but ASCII alphanumerics and `-` becomes `_`.
#[must_use]
pub fn build_file_name(quote_number: &str) -> String {
    let sanitized: String = quote_number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let random: [u8; 4] = rand::rng().random();
    format!(
        "{sanitized}-{}-{}.pdf",
        Utc::now().timestamp_millis(),
        hex::encode(random)
    )
}

/// Split `<scheme>://<container>/<object>` into its container and object.
pub(crate) fn split_uri<'a>(
    value: &'a str,
    scheme: &str,
) -> Result<(&'a str, &'a str), StorageError> {
    let rest = value
        .strip_prefix(scheme)
        .ok_or_else(|| StorageError::InvalidPath(value.to_string()))?;
    match rest.split_once('/') {
        Some((container, object)) if !container.is_empty() && !object.is_empty() => {
            Ok((container, object))
        }
        _ => Err(StorageError::InvalidPath(value.to_string())),
    }
}

/// Error for a non-success response, keeping a short body excerpt.
pub(crate) async fn backend_error(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let mut message = response.text().await.unwrap_or_default();
    message.truncate(512);
    StorageError::Backend { status, message }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_file_name() {
        let name = build_file_name("Q-2025-000042");
        assert!(name.starts_with("Q-2025-000042-"));
        assert!(name.ends_with(".pdf"));

        let parts: Vec<&str> = name.trim_end_matches(".pdf").rsplitn(3, '-').collect();
        assert_eq!(parts[0].len(), 8);
        assert!(parts[0].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(parts[1].parse::<i64>().is_ok());
    }

    #[test]
    fn test_build_file_name_sanitizes() {
        assert!(build_file_name("../Q 1/é").starts_with("___Q_1__-"));
    }

    #[test]
    fn test_split_uri() {
        assert_eq!(
            split_uri("gcs://quotes/2025/Q-1.pdf", "gcs://").unwrap(),
            ("quotes", "2025/Q-1.pdf")
        );
        assert!(split_uri("gcs://quotes", "gcs://").is_err());
        assert!(split_uri("gcs:///Q-1.pdf", "gcs://").is_err());
        assert!(split_uri("azure://c/b.pdf", "gcs://").is_err());
    }
}
