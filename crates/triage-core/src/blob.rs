//! Blob storage collaborator
//!
//! Accepts raw bytes plus a storage path and hands back a public URL.
//! Associating that URL with an attachment record is a separate step
//! owned by the façade.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{Error, Result};

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadedBlob {
    pub public_url: String,
}

/// Where attachment bytes go
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `path`. With `overwrite` unset, an existing
    /// blob at the same path is an `AlreadyExists` error.
    async fn upload(&self, bytes: &[u8], path: &str, overwrite: bool) -> Result<UploadedBlob>;
}

/// Filesystem-backed blob store
///
/// Writes under a root directory and serves URLs either from a
/// configured public base or as file:// paths.
pub struct FsBlobStore {
    root: PathBuf,
    public_base: Option<String>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base: None,
        }
    }

    /// URLs become `<base>/<path>` instead of file:// paths
    pub fn with_public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = Some(base.into());
        self
    }

    fn check_path(path: &str) -> Result<()> {
        let p = Path::new(path);
        let escapes = p.is_absolute()
            || p.components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if path.is_empty() || escapes {
            return Err(Error::Blob(format!("invalid blob path: {path}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, bytes: &[u8], path: &str, overwrite: bool) -> Result<UploadedBlob> {
        Self::check_path(path)?;
        let dest = self.root.join(path);

        if !overwrite && dest.exists() {
            return Err(Error::AlreadyExists(path.to_string()));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Blob(e.to_string()))?;
        }
        tokio::fs::write(&dest, bytes)
            .await
            .map_err(|e| Error::Blob(e.to_string()))?;

        let public_url = match &self.public_base {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), path),
            None => format!("file://{}", dest.display()),
        };

        Ok(UploadedBlob { public_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let blob = store
            .upload(b"hello", "issues/attachments/readme.txt", true)
            .await
            .unwrap();
        assert!(blob.public_url.starts_with("file://"));

        let written = std::fs::read(dir.path().join("issues/attachments/readme.txt")).unwrap();
        assert_eq!(written, b"hello");
    }

    #[tokio::test]
    async fn test_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.upload(b"one", "a.txt", false).await.unwrap();
        let err = store.upload(b"two", "a.txt", false).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        store.upload(b"two", "a.txt", true).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(store.upload(b"x", "../escape.txt", true).await.is_err());
        assert!(store.upload(b"x", "/etc/passwd", true).await.is_err());
    }

    #[tokio::test]
    async fn test_public_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).with_public_base("https://cdn.example.com/");
        let blob = store.upload(b"x", "a/b.png", true).await.unwrap();
        assert_eq!(blob.public_url, "https://cdn.example.com/a/b.png");
    }
}
