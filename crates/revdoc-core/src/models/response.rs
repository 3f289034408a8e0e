use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::models::request::ReportType;

/// Denormalized summary attached to the success response for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub recipient_name: String,
    pub review_type: String,
    pub review_area_count: usize,
    pub deficiency_count: usize,
    pub generation_time_ms: u64,
}

/// Final response for a completed generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReportResponse {
    /// Always "completed" for a synchronous run
    pub status: String,
    pub report_id: String,
    pub record_id: i64,
    pub report_type: ReportType,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub file_size_bytes: usize,
    pub metadata: ReportMetadata,
    /// Elapsed wall-clock per pipeline stage, keyed by stage name
    pub stage_timings_ms: BTreeMap<String, u64>,
    pub correlation_id: String,
}

/// Error response for a failed generation run. Carries the correlation id
/// and whatever stage timings were recorded before the failure so partial
/// progress stays diagnosable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReportError {
    /// Always "error"
    pub status: String,
    pub error_kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    pub stage_timings_ms: BTreeMap<String, u64>,
    pub correlation_id: String,
}

impl GenerateReportError {
    pub fn from_report_error(
        err: &ReportError,
        correlation_id: String,
        stage_timings_ms: BTreeMap<String, u64>,
    ) -> Self {
        GenerateReportError {
            status: "error".to_string(),
            error_kind: err.kind().to_string(),
            message: err.client_message(),
            occurred_at: Utc::now(),
            stage_timings_ms,
            correlation_id,
        }
    }
}
