use std::sync::Arc;

use revdoc_core::{Config, StorageBackend};

use crate::local::LocalArtifactStore;
use crate::s3::S3ArtifactStore;
use crate::traits::{ArtifactStore, StorageError, StorageResult};

/// Create an artifact store backend based on configuration
pub async fn create_store(config: &Config) -> StorageResult<Arc<dyn ArtifactStore>> {
    let backend = config.storage_backend.unwrap_or(StorageBackend::S3);

    match backend {
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint.clone();

            let store =
                S3ArtifactStore::new(bucket, region, endpoint, config.download_url_ttl()).await?;
            Ok(Arc::new(store))
        }

        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let store =
                LocalArtifactStore::new(base_path, base_url, config.download_url_ttl()).await?;
            Ok(Arc::new(store))
        }
    }
}
