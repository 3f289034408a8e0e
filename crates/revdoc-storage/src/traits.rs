//! Artifact store abstraction
//!
//! This module defines the ArtifactStore trait that all storage backends
//! must implement.

use async_trait::async_trait;
use thiserror::Error;

use revdoc_core::{GeneratedArtifact, ReportError, RetrievalHandle};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Presigning failed: {0}")]
    PresignFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for ReportError {
    fn from(err: StorageError) -> Self {
        ReportError::StorageFailure(err.to_string())
    }
}

/// Artifact store abstraction
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// Keys are write-once: storing under an existing key fails with
/// `AlreadyExists`. Key derivation is centralized in the `keys` module so
/// all backends stay consistent.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist the artifact under `key` and return a time-limited retrieval
    /// handle. The handle's expiry is enforced by the backend.
    async fn store(
        &self,
        artifact: GeneratedArtifact,
        key: &str,
    ) -> StorageResult<RetrievalHandle>;

    /// Check if an artifact exists under `key`
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}
