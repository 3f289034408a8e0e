//! Canonical schema types
//!
//! The canonical record is the versioned internal shape all upstream project
//! data is normalized into before validation and rendering. It is produced
//! once per run by the transformer and immutable afterwards; the validator
//! selects its rule set from the embedded schema version.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical schema version targeted by the transformer.
pub const SCHEMA_VERSION: &str = "1.0";

/// Finding code for a control entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Finding {
    #[serde(rename = "D")]
    Deficient,
    #[serde(rename = "ND")]
    NotDeficient,
    #[serde(rename = "NA")]
    NotApplicable,
}

impl Finding {
    pub fn as_code(&self) -> &'static str {
        match self {
            Finding::Deficient => "D",
            Finding::NotDeficient => "ND",
            Finding::NotApplicable => "NA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub record_id: String,
    pub recipient_name: Option<String>,
    pub recipient_id: Option<String>,
    pub review_type: Option<String>,
    pub region_number: Option<i64>,
    pub recipient_city_state: Option<String>,
    pub site_visit_dates: Option<String>,
    pub report_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEntry {
    pub control_id: String,
    pub name: String,
    pub review_area: String,
    pub finding: Finding,
    pub description: Option<String>,
    pub corrective_action: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub date_closed: Option<NaiveDate>,
}

/// Derived summary fields, computed from the control entries at transform
/// time so downstream stages never re-derive them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub has_deficiencies: bool,
    pub deficiency_count: usize,
    pub deficiency_areas: Vec<String>,
    pub total_controls: usize,
}

impl RecordMetadata {
    pub fn derive(controls: &[ControlEntry]) -> Self {
        let deficiency_areas: Vec<String> = controls
            .iter()
            .filter(|c| c.finding == Finding::Deficient)
            .map(|c| c.review_area.clone())
            .collect();

        RecordMetadata {
            has_deficiencies: !deficiency_areas.is_empty(),
            deficiency_count: deficiency_areas.len(),
            deficiency_areas,
            total_controls: controls.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub schema_version: String,
    pub project: ProjectInfo,
    pub controls: Vec<ControlEntry>,
    pub metadata: RecordMetadata,
}
