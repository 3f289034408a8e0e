use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rendered document bytes, owned by the generator until handed to the
/// artifact store for persistence.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub bytes: Bytes,
    pub size_bytes: usize,
    pub content_type: String,
}

impl GeneratedArtifact {
    pub fn new(bytes: Bytes, content_type: impl Into<String>) -> Self {
        let size_bytes = bytes.len();
        GeneratedArtifact {
            bytes,
            size_bytes,
            content_type: content_type.into(),
        }
    }
}

/// Time-limited reference to a stored artifact. The expiry is enforced by
/// the storage backend, not recomputed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHandle {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
