//! Azure Blob Storage backend, authenticated with a container SAS token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{
    PDF_CONTENT_TYPE, PdfStorage, StorageError, StoredFile, backend_error, build_file_name,
    split_uri,
};

/// Scheme of stored paths.
pub const AZURE_URI_SCHEME: &str = "azure://";

/// Stores documents as block blobs in one container.
pub struct AzureBlobStorage {
    client: reqwest::Client,
    container_url: String,
    container: String,
    sas_token: SecretString,
}

impl AzureBlobStorage {
    /// `container_url` is `https://<account>.blob.core.windows.net/<container>`.
    #[must_use]
    pub fn new(container_url: String, sas_token: SecretString) -> Self {
        let container = container_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            client: reqwest::Client::new(),
            container_url: container_url.trim_end_matches('/').to_string(),
            container,
            sas_token,
        }
    }

    fn blob_url(&self, blob: &str) -> String {
        let encoded: Vec<_> = blob
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}?{}",
            self.container_url,
            encoded.join("/"),
            self.sas_token.expose_secret()
        )
    }

    fn blob_of<'a>(&self, path: &'a str) -> Result<&'a str, StorageError> {
        let (container, blob) = split_uri(path, AZURE_URI_SCHEME)?;
        if container == self.container {
            Ok(blob)
        } else {
            Err(StorageError::InvalidPath(path.to_string()))
        }
    }
}

#[async_trait]
impl PdfStorage for AzureBlobStorage {
    async fn store(&self, quote_number: &str, bytes: Vec<u8>) -> Result<StoredFile, StorageError> {
        let filename = build_file_name(quote_number);
        let blob = format!("quotes/{filename}");

        let response = self
            .client
            .put(self.blob_url(&blob))
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, PDF_CONTENT_TYPE)
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        tracing::debug!(container = %self.container, blob = %blob, "Quote PDF uploaded");
        Ok(StoredFile {
            path: format!("{AZURE_URI_SCHEME}{}/{blob}", self.container),
            filename,
        })
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let blob = self.blob_of(path)?;

        let response = self.client.get(self.blob_url(blob)).send().await?;
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

    fn storage() -> AzureBlobStorage {
        AzureBlobStorage::new(
            "https://kforge.blob.core.windows.net/quotes/".to_string(),
            SecretString::from("sv=2024-05-04&sig=abc%3D"),
        )
    }

    #[test]
    fn test_container_from_url() {
        assert_eq!(storage().container, "quotes");
    }

    #[test]
    fn test_blob_url_appends_sas() {
        assert_eq!(
            storage().blob_url("quotes/Q-2025-000001-1-ab.pdf"),
            "https://kforge.blob.core.windows.net/quotes/quotes/Q-2025-000001-1-ab.pdf?sv=2024-05-04&sig=abc%3D"
        );
    }

    #[test]
    fn test_blob_of_checks_container() {
        let storage = storage();
        assert_eq!(
            storage.blob_of("azure://quotes/quotes/Q-1.pdf").unwrap(),
            "quotes/Q-1.pdf"
        );
        assert!(storage.blob_of("azure://other/Q-1.pdf").is_err());
        assert!(storage.blob_of("/tmp/Q-1.pdf").is_err());
    }
}
