use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use revdoc_core::{GeneratedArtifact, RetrievalHandle};

use crate::keys::validate_key;
use crate::traits::{ArtifactStore, StorageError, StorageResult};

/// Local filesystem artifact store for development and tests
#[derive(Clone)]
pub struct LocalArtifactStore {
    base_path: PathBuf,
    base_url: String,
    handle_ttl: chrono::Duration,
}

impl LocalArtifactStore {
    /// Create a new LocalArtifactStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for artifact storage
    /// * `base_url` - Base URL for serving artifacts
    /// * `url_ttl` - Nominal lifetime stamped onto retrieval handles
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        url_ttl: Duration,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let handle_ttl = chrono::Duration::from_std(url_ttl)
            .map_err(|e| StorageError::ConfigError(format!("invalid URL TTL: {}", e)))?;

        Ok(LocalArtifactStore {
            base_path,
            base_url,
            handle_ttl,
        })
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(
        &self,
        artifact: GeneratedArtifact,
        key: &str,
    ) -> StorageResult<RetrievalHandle> {
        let path = self.key_to_path(key)?;
        let size = artifact.size_bytes;

        if fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&artifact.bytes).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local artifact upload successful"
        );

        Ok(RetrievalHandle {
            url: self.generate_url(key),
            expires_at: Utc::now() + self.handle_ttl,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}
