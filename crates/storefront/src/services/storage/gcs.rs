//! Google Cloud Storage backend.
//!
//! Talks to the JSON API directly. Access tokens come from the metadata
//! server of the instance the storefront runs on and are cached until
//! shortly before they expire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde::Deserialize;

use super::{
    PDF_CONTENT_TYPE, PdfStorage, StorageError, StoredFile, backend_error, build_file_name,
    split_uri,
};

/// Scheme of stored paths.
pub const GCS_URI_SCHEME: &str = "gcs://";

const API_BASE: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are dropped this long before Google expires them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Clone)]
struct CachedToken {
    value: Arc<str>,
    lifetime: Duration,
}

struct TokenExpiry;

impl Expiry<(), CachedToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &(),
        value: &CachedToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.lifetime)
    }
}

/// Stores documents as objects under `quotes/` in one bucket.
#[derive(Clone)]
pub struct GcsStorage {
    inner: Arc<GcsStorageInner>,
}

struct GcsStorageInner {
    client: reqwest::Client,
    bucket: String,
    api_base: String,
    token_url: String,
    tokens: Cache<(), CachedToken>,
}

impl GcsStorage {
    #[must_use]
    pub fn new(bucket: String) -> Self {
        Self::with_endpoints(bucket, API_BASE, METADATA_TOKEN_URL)
    }

    fn with_endpoints(bucket: String, api_base: &str, token_url: &str) -> Self {
        Self {
            inner: Arc::new(GcsStorageInner {
                client: reqwest::Client::new(),
                bucket,
                api_base: api_base.to_string(),
                token_url: token_url.to_string(),
                tokens: Cache::builder()
                    .max_capacity(1)
                    .expire_after(TokenExpiry)
                    .build(),
            }),
        }
    }

    async fn access_token(&self) -> Result<Arc<str>, StorageError> {
        if let Some(token) = self.inner.tokens.get(&()).await {
            return Ok(token.value);
        }

        let response = self
            .inner
            .client
            .get(&self.inner.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Credentials(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Credentials(format!(
                "metadata server returned {}",
                response.status()
            )));
        }
        let token: MetadataToken = response.json().await?;

        let cached = CachedToken {
            value: Arc::from(token.access_token),
            lifetime: Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN),
        };
        self.inner.tokens.insert((), cached.clone()).await;
        tracing::debug!(lifetime = ?cached.lifetime, "GCS access token refreshed");
        Ok(cached.value)
    }

    /// Bucket and object of a stored path. Bare object names fall back to
    /// the configured bucket.
    fn locate<'a>(&'a self, path: &'a str) -> Result<(&'a str, &'a str), StorageError> {
        if path.starts_with(GCS_URI_SCHEME) {
            split_uri(path, GCS_URI_SCHEME)
        } else {
            let object = path.trim_start_matches('/');
            if object.is_empty() {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
            Ok((self.inner.bucket.as_str(), object))
        }
    }
}

#[async_trait]
impl PdfStorage for GcsStorage {
    async fn store(&self, quote_number: &str, bytes: Vec<u8>) -> Result<StoredFile, StorageError> {
        let filename = build_file_name(quote_number);
        let object = format!("quotes/{filename}");
        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.inner.api_base,
                urlencoding::encode(&self.inner.bucket)
            ))
            .query(&[("uploadType", "media"), ("name", object.as_str())])
            .bearer_auth(&*token)
            .header(reqwest::header::CONTENT_TYPE, PDF_CONTENT_TYPE)
            .header(reqwest::header::CACHE_CONTROL, "private, max-age=31536000")
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        tracing::debug!(bucket = %self.inner.bucket, object = %object, "Quote PDF uploaded");
        Ok(StoredFile {
            path: format!("{GCS_URI_SCHEME}{}/{object}", self.inner.bucket),
            filename,
        })
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let (bucket, object) = self.locate(path)?;
        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .get(format!(
                "{}/storage/v1/b/{}/o/{}",
                self.inner.api_base,
                urlencoding::encode(bucket),
                urlencoding::encode(object)
            ))
            .query(&[("alt", "media")])
            .bearer_auth(&*token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_locate() {
        let storage = GcsStorage::new("kf-quotes".to_string());
        assert_eq!(
            storage.locate("gcs://other/quotes/Q-1.pdf").unwrap(),
            ("other", "quotes/Q-1.pdf")
        );
        assert_eq!(
            storage.locate("/quotes/Q-1.pdf").unwrap(),
            ("kf-quotes", "quotes/Q-1.pdf")
        );
        assert!(storage.locate("gcs://only-bucket").is_err());
        assert!(storage.locate("/").is_err());
    }

    #[test]
    fn test_token_expiry_uses_lifetime() {
        let token = CachedToken {
            value: Arc::from("ya29.token"),
            lifetime: Duration::from_secs(3539),
        };
        assert_eq!(
            TokenExpiry.expire_after_create(&(), &token, Instant::now()),
            Some(Duration::from_secs(3539))
        );
    }

    #[tokio::test]
    async fn test_unreachable_metadata_server() {
        let storage = GcsStorage::with_endpoints(
            "kf-quotes".to_string(),
            "http://127.0.0.1:9",
            "http://127.0.0.1:9/token",
        );
        assert!(matches!(
            storage.load("gcs://kf-quotes/quotes/Q-1.pdf").await,
            Err(StorageError::Credentials(_))
        ));
    }
}
