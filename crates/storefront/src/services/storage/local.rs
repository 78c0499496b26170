//! Local filesystem backend.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{PdfStorage, StorageError, StoredFile, build_file_name};

/// Stores documents under one directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Absolute form of the storage directory, without `.` or `..`.
    fn root(&self) -> Result<PathBuf, StorageError> {
        Ok(normalize(&std::path::absolute(&self.dir)?))
    }

    /// Resolve a stored path, refusing anything outside the directory.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let root = self.root()?;
        let candidate = normalize(&std::path::absolute(Path::new(path))?);
        if candidate.starts_with(&root) && candidate != root {
            Ok(candidate)
        } else {
            Err(StorageError::OutsideStorage(path.to_string()))
        }
    }
}

/// Lexically drop `.` and fold `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[async_trait]
impl PdfStorage for LocalStorage {
    async fn store(&self, quote_number: &str, bytes: Vec<u8>) -> Result<StoredFile, StorageError> {
        let root = self.root()?;
        fs::create_dir_all(&root).await?;

        let filename = build_file_name(quote_number);
        let path = root.join(&filename);
        fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), "Quote PDF written");
        Ok(StoredFile {
            path: path.to_string_lossy().into_owned(),
            filename,
        })
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let resolved = self.resolve(path)?;
        Ok(fs::read(resolved).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_storage() -> LocalStorage {
        LocalStorage::new(
            std::env::temp_dir()
                .join("katana-forge-storage-tests")
                .join(uuid::Uuid::new_v4().to_string()),
        )
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let storage = temp_storage();
        let stored = storage
            .store("Q-2025-000001", b"%PDF-1.3 test".to_vec())
            .await
            .unwrap();

        assert!(stored.filename.starts_with("Q-2025-000001-"));
        assert!(stored.path.ends_with(&stored.filename));
        assert_eq!(storage.load(&stored.path).await.unwrap(), b"%PDF-1.3 test");
    }

    #[tokio::test]
    async fn test_load_refuses_paths_outside_directory() {
        let storage = temp_storage();
        let root = storage.root().unwrap();
        let escape = root.join("..").join("secret.pdf");

        assert!(matches!(
            storage.load(&escape.to_string_lossy()).await,
            Err(StorageError::OutsideStorage(_))
        ));
        assert!(matches!(
            storage.load("/etc/passwd").await,
            Err(StorageError::OutsideStorage(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let storage = temp_storage();
        let missing = storage.root().unwrap().join("nope.pdf");
        assert!(matches!(
            storage.load(&missing.to_string_lossy()).await,
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/./b/../c.pdf")),
            PathBuf::from("/a/c.pdf")
        );
    }
}
