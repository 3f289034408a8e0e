//! Artifact key derivation
//!
//! Keys are derived from the run's correlation id so concurrent runs can
//! never collide on a write-once key: `reports/{correlation_id}/{filename}`.
//! Keys must not contain `..` or a leading `/`.

use crate::traits::{StorageError, StorageResult};

/// Build the storage key for a generated report artifact.
pub fn artifact_key(correlation_id: &str, filename: &str) -> String {
    format!("reports/{}/{}", correlation_id, filename)
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
