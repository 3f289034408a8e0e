use serde::{Deserialize, Serialize};

/// Unstructured upstream payload: project metadata plus the full control
/// listing, exactly as returned by the compliance platform. Exists only
/// within a single pipeline run and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub project: serde_json::Value,
    pub controls: Vec<serde_json::Value>,
}

impl RawRecord {
    pub fn new(project: serde_json::Value, controls: Vec<serde_json::Value>) -> Self {
        RawRecord { project, controls }
    }
}
