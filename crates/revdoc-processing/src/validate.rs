//! Canonical record validation
//!
//! Two independent checks run over every record, and both always run so a
//! single pass surfaces every problem: a schema check (required fields for
//! the record's schema version) and a completeness check (domain rules
//! driven by a configurable policy). An invalid result is a normal terminal
//! outcome for the pipeline, not an exception.

use std::collections::BTreeSet;

use revdoc_core::{CanonicalRecord, Config, Finding, SCHEMA_VERSION};

/// Review types the schema check recognizes. Anything else is flagged as a
/// warning rather than a hard failure.
const KNOWN_REVIEW_TYPES: &[&str] = &[
    "Triennial Review",
    "State Management Review",
    "Combined Triennial and State Management Review",
];

/// Result of validating one canonical record.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    pub missing_fields: BTreeSet<String>,
    pub warnings: Vec<String>,
}

/// Completeness thresholds. These encode business rules that are still
/// settling, so they are policy values rather than hard-coded logic.
#[derive(Debug, Clone)]
pub struct CompletenessPolicy {
    /// Below this control count the record cannot produce a report.
    pub min_control_entries: usize,
    /// Below this control count the record is suspicious but renderable.
    pub expected_control_entries: Option<usize>,
    /// Above this deficiency count the data deserves a second look.
    pub max_plausible_deficiencies: usize,
}

impl Default for CompletenessPolicy {
    fn default() -> Self {
        CompletenessPolicy {
            min_control_entries: 1,
            expected_control_entries: Some(21),
            max_plausible_deficiencies: 10,
        }
    }
}

impl CompletenessPolicy {
    pub fn from_config(config: &Config) -> Self {
        CompletenessPolicy {
            min_control_entries: config.min_control_entries,
            expected_control_entries: Some(config.expected_control_entries),
            max_plausible_deficiencies: config.max_plausible_deficiencies,
        }
    }
}

pub struct Validator {
    policy: CompletenessPolicy,
}

impl Validator {
    pub fn new(policy: CompletenessPolicy) -> Self {
        Validator { policy }
    }

    /// Run the schema check and the completeness check. Both contribute to
    /// the same result regardless of whether the other fails.
    pub fn validate(&self, record: &CanonicalRecord) -> ValidationResult {
        let mut missing_fields = BTreeSet::new();
        let mut warnings = Vec::new();

        self.check_schema(record, &mut missing_fields, &mut warnings);
        self.check_completeness(record, &mut missing_fields, &mut warnings);

        let valid = missing_fields.is_empty();

        tracing::info!(
            valid,
            missing_count = missing_fields.len(),
            warning_count = warnings.len(),
            "canonical record validated"
        );

        ValidationResult {
            valid,
            missing_fields,
            warnings,
        }
    }

    fn check_schema(
        &self,
        record: &CanonicalRecord,
        missing_fields: &mut BTreeSet<String>,
        warnings: &mut Vec<String>,
    ) {
        if record.schema_version != SCHEMA_VERSION {
            missing_fields.insert("schema_version".to_string());
            warnings.push(format!(
                "schema_version: unsupported version '{}', expected '{}'",
                record.schema_version, SCHEMA_VERSION
            ));
        }

        if record.project.record_id.trim().is_empty() {
            missing_fields.insert("project.record_id".to_string());
        }
        if is_blank(&record.project.recipient_name) {
            missing_fields.insert("project.recipient_name".to_string());
        }
        if is_blank(&record.project.recipient_id) {
            missing_fields.insert("project.recipient_id".to_string());
        }
        match record.project.review_type.as_deref() {
            None | Some("") => {
                missing_fields.insert("project.review_type".to_string());
            }
            Some(review_type) if !KNOWN_REVIEW_TYPES.contains(&review_type) => {
                warnings.push(format!(
                    "project.review_type: unrecognized value '{}'",
                    review_type
                ));
            }
            _ => {}
        }

        for (index, control) in record.controls.iter().enumerate() {
            if control.name.trim().is_empty() {
                missing_fields.insert(format!("controls[{}].name", index));
            }
            if control.review_area.trim().is_empty() {
                missing_fields.insert(format!("controls[{}].review_area", index));
            }
        }
    }

    fn check_completeness(
        &self,
        record: &CanonicalRecord,
        missing_fields: &mut BTreeSet<String>,
        warnings: &mut Vec<String>,
    ) {
        let control_count = record.controls.len();

        if control_count < self.policy.min_control_entries {
            missing_fields.insert("controls".to_string());
            warnings.push(format!(
                "controls: {} entries, at least {} required",
                control_count, self.policy.min_control_entries
            ));
        } else if let Some(expected) = self.policy.expected_control_entries {
            if control_count < expected {
                warnings.push(format!(
                    "controls: only {} review entries (expected {})",
                    control_count, expected
                ));
            }
        }

        if record.metadata.deficiency_count > self.policy.max_plausible_deficiencies {
            warnings.push(format!(
                "metadata.deficiency_count: {} exceeds plausibility threshold {}, verify accuracy",
                record.metadata.deficiency_count, self.policy.max_plausible_deficiencies
            ));
        }

        for (index, control) in record.controls.iter().enumerate() {
            if control.finding == Finding::Deficient && is_blank(&control.description) {
                warnings.push(format!(
                    "controls[{}]: deficient finding without a description",
                    index
                ));
            }

            if let (Some(due), Some(closed)) = (control.due_date, control.date_closed) {
                if closed < due {
                    missing_fields.insert(format!("controls[{}].date_closed", index));
                    warnings.push(format!(
                        "controls[{}]: date_closed {} precedes due_date {}",
                        index, closed, due
                    ));
                }
            }
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use revdoc_core::{ControlEntry, ProjectInfo, RecordMetadata};

    fn control(area: &str, finding: Finding) -> ControlEntry {
        ControlEntry {
            control_id: "1".to_string(),
            name: format!("{} : C1", area),
            review_area: area.to_string(),
            finding,
            description: Some("observed during review".to_string()),
            corrective_action: None,
            due_date: None,
            date_closed: None,
        }
    }

    fn valid_record(controls: Vec<ControlEntry>) -> CanonicalRecord {
        let metadata = RecordMetadata::derive(&controls);
        CanonicalRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            project: ProjectInfo {
                record_id: "33".to_string(),
                recipient_name: Some("Metro Transit Authority".to_string()),
                recipient_id: Some("1648".to_string()),
                review_type: Some("Triennial Review".to_string()),
                region_number: Some(5),
                recipient_city_state: Some("Springfield, IL".to_string()),
                site_visit_dates: None,
                report_date: None,
            },
            controls,
            metadata,
        }
    }

    fn validator() -> Validator {
        Validator::new(CompletenessPolicy::default())
    }

    #[test]
    fn test_valid_record_passes_both_checks() {
        let controls: Vec<ControlEntry> = (0..21)
            .map(|i| {
                control(
                    &format!("Area {}", i),
                    if i < 2 {
                        Finding::Deficient
                    } else {
                        Finding::NotDeficient
                    },
                )
            })
            .collect();
        let record = valid_record(controls);

        let result = validator().validate(&record);
        assert!(result.valid);
        assert!(result.missing_fields.is_empty());
        assert_eq!(record.metadata.deficiency_count, 2);
        assert_eq!(record.metadata.total_controls, 21);
    }

    #[test]
    fn test_missing_recipient_name_is_reported() {
        let mut record = valid_record(vec![control("Legal", Finding::NotDeficient)]);
        record.project.recipient_name = None;

        let result = validator().validate(&record);
        assert!(!result.valid);
        assert!(result.missing_fields.contains("project.recipient_name"));
    }

    #[test]
    fn test_schema_and_completeness_findings_surface_together() {
        // Missing field (schema check) AND zero controls (completeness
        // check) must both appear in a single result.
        let mut record = valid_record(vec![]);
        record.project.recipient_name = None;

        let result = validator().validate(&record);
        assert!(!result.valid);
        assert!(result.missing_fields.contains("project.recipient_name"));
        assert!(result.missing_fields.contains("controls"));
    }

    #[test]
    fn test_below_expected_control_count_is_warning_not_failure() {
        let controls: Vec<ControlEntry> =
            (0..3).map(|_| control("Legal", Finding::NotDeficient)).collect();
        let record = valid_record(controls);

        let result = validator().validate(&record);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("expected 21")));
    }

    #[test]
    fn test_implausible_deficiency_count_warns() {
        let controls: Vec<ControlEntry> = (0..21)
            .map(|i| control(&format!("Area {}", i), Finding::Deficient))
            .collect();
        let record = valid_record(controls);

        let result = validator().validate(&record);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("plausibility threshold")));
    }

    #[test]
    fn test_inconsistent_dates_fail_hard() {
        let mut entry = control("Maintenance", Finding::Deficient);
        entry.due_date = NaiveDate::from_ymd_opt(2026, 9, 30);
        entry.date_closed = NaiveDate::from_ymd_opt(2026, 6, 1);
        let record = valid_record(vec![entry]);

        let result = validator().validate(&record);
        assert!(!result.valid);
        assert!(result.missing_fields.contains("controls[0].date_closed"));
    }

    #[test]
    fn test_deficient_without_description_warns() {
        let mut entry = control("Maintenance", Finding::Deficient);
        entry.description = None;
        let record = valid_record(vec![entry]);

        let result = validator().validate(&record);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("without a description")));
    }

    #[test]
    fn test_unknown_review_type_warns() {
        let mut record = valid_record(vec![control("Legal", Finding::NotDeficient)]);
        record.project.review_type = Some("Annual Checkup".to_string());

        let result = validator().validate(&record);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Annual Checkup")));
    }

    #[test]
    fn test_unsupported_schema_version_fails() {
        let mut record = valid_record(vec![control("Legal", Finding::NotDeficient)]);
        record.schema_version = "0.9".to_string();

        let result = validator().validate(&record);
        assert!(!result.valid);
        assert!(result.missing_fields.contains("schema_version"));
    }
}
