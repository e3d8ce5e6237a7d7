//! Filesystem blob store: one directory per bucket under a root.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::ports::{BlobStore, Bucket, RepositoryError, RepositoryResult};

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, bucket: Bucket, filename: &str) -> RepositoryResult<PathBuf> {
        validate_filename(filename)?;
        Ok(self.root.join(bucket.as_str()).join(filename))
    }
}

/// Filenames are flat: no separators, no leading dot, nothing empty.
fn validate_filename(filename: &str) -> RepositoryResult<()> {
    let valid = !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\'])
        && !filename.chars().any(char::is_control);

    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidKey(filename.to_string()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bucket: Bucket, filename: &str, bytes: &[u8]) -> RepositoryResult<String> {
        let path = self.path_for(bucket, filename)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(bucket = bucket.as_str(), filename, size = bytes.len(), "blob stored");
        Ok(format!("/{}/{}", bucket.as_str(), filename))
    }

    async fn get(&self, bucket: Bucket, filename: &str) -> RepositoryResult<Vec<u8>> {
        let path = self.path_for(bucket, filename)?;
        Ok(tokio::fs::read(&path).await?)
    }
}
