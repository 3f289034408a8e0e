use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload, Result as ObjectResult,
};

use revdoc_core::{GeneratedArtifact, RetrievalHandle};

use crate::keys::validate_key;
use crate::traits::{ArtifactStore, StorageError, StorageResult};

/// S3 artifact store implementation
#[derive(Clone)]
pub struct S3ArtifactStore {
    store: AmazonS3,
    bucket: String,
    url_ttl: Duration,
    handle_ttl: chrono::Duration,
}

impl S3ArtifactStore {
    /// Create a new S3ArtifactStore instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    /// * `url_ttl` - Lifetime of presigned download URLs
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        url_ttl: Duration,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let handle_ttl = chrono::Duration::from_std(url_ttl)
            .map_err(|e| StorageError::ConfigError(format!("invalid URL TTL: {}", e)))?;

        Ok(S3ArtifactStore {
            store,
            bucket,
            url_ttl,
            handle_ttl,
        })
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn store(
        &self,
        artifact: GeneratedArtifact,
        key: &str,
    ) -> StorageResult<RetrievalHandle> {
        validate_key(key)?;

        let location = Path::from(key.to_string());
        let size = artifact.size_bytes;
        let start = std::time::Instant::now();

        // Create-mode put enforces write-once per key.
        let result: ObjectResult<_> = self
            .store
            .put_opts(
                &location,
                PutPayload::from(artifact.bytes),
                PutOptions::from(PutMode::Create),
            )
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 artifact upload failed"
            );
            match e {
                ObjectStoreError::AlreadyExists { .. } => {
                    StorageError::AlreadyExists(key.to_string())
                }
                other => StorageError::UploadFailed(other.to_string()),
            }
        })?;

        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, self.url_ttl)
            .await;
        let url = url_result
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?
            .to_string();

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 artifact upload successful"
        );

        Ok(RetrievalHandle {
            url,
            expires_at: Utc::now() + self.handle_ttl,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let location = Path::from(key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }
}
