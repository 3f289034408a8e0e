//! Raw-to-canonical transformation
//!
//! Maps the upstream payload into the canonical schema. The mapping is a
//! pure function of its input: no clock, no I/O, identical input always
//! produces identical output. Project fields follow an explicit
//! field-correspondence table, so adding a canonical field is a table change;
//! unknown upstream fields are dropped with a recorded warning instead of
//! failing the transform. Pass/fail is the validator's call, not ours.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde_json::Value;

use revdoc_core::{
    CanonicalRecord, ControlEntry, Finding, ProjectInfo, RawRecord, RecordMetadata, SCHEMA_VERSION,
};

/// Transform output: the canonical record plus any warnings recorded while
/// mapping. Warnings feed into the validator's result, they never fail the
/// transform.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub record: CanonicalRecord,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Coercion {
    Text,
    Integer,
}

struct FieldMap {
    upstream: &'static str,
    canonical: &'static str,
    coerce: Coercion,
}

/// Field-correspondence table for project metadata: upstream key on the
/// project object, canonical path, coercion rule.
const PROJECT_FIELDS: &[FieldMap] = &[
    FieldMap {
        upstream: "id",
        canonical: "project.record_id",
        coerce: Coercion::Text,
    },
    FieldMap {
        upstream: "name",
        canonical: "project.recipient_name",
        coerce: Coercion::Text,
    },
    FieldMap {
        upstream: "recipient_id",
        canonical: "project.recipient_id",
        coerce: Coercion::Text,
    },
    FieldMap {
        upstream: "review_type",
        canonical: "project.review_type",
        coerce: Coercion::Text,
    },
    FieldMap {
        upstream: "region",
        canonical: "project.region_number",
        coerce: Coercion::Integer,
    },
    FieldMap {
        upstream: "city_state",
        canonical: "project.recipient_city_state",
        coerce: Coercion::Text,
    },
    FieldMap {
        upstream: "site_visit_dates",
        canonical: "project.site_visit_dates",
        coerce: Coercion::Text,
    },
    FieldMap {
        upstream: "report_date",
        canonical: "project.report_date",
        coerce: Coercion::Text,
    },
];

/// Control-item keys consumed by the mapping; everything else on an item is
/// dropped (one warning per distinct key).
const CONTROL_ITEM_KEYS: &[&str] = &["id", "control", "control_family", "assessment"];

pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Transformer
    }

    pub fn transform(&self, raw: &RawRecord) -> TransformOutcome {
        let mut warnings = Vec::new();

        let project = self.transform_project(&raw.project, &mut warnings);
        let controls = self.transform_controls(&raw.controls, &mut warnings);
        let metadata = RecordMetadata::derive(&controls);

        let record = CanonicalRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            project,
            controls,
            metadata,
        };

        tracing::debug!(
            control_count = record.controls.len(),
            deficiency_count = record.metadata.deficiency_count,
            warning_count = warnings.len(),
            "raw record transformed"
        );

        TransformOutcome { record, warnings }
    }

    fn transform_project(&self, project: &Value, warnings: &mut Vec<String>) -> ProjectInfo {
        let mut mapped: BTreeMap<&'static str, Value> = BTreeMap::new();

        if let Some(object) = project.as_object() {
            for (key, value) in object {
                match PROJECT_FIELDS.iter().find(|f| f.upstream == key.as_str()) {
                    Some(field) => {
                        if let Some(coerced) = coerce(value, field.coerce) {
                            mapped.insert(field.canonical, coerced);
                        } else if !value.is_null() {
                            warnings.push(format!(
                                "{}: could not coerce upstream value, dropped",
                                field.canonical
                            ));
                        }
                    }
                    None => warnings.push(format!(
                        "project.{}: unrecognized upstream field dropped",
                        key
                    )),
                }
            }
        } else {
            warnings.push("project: upstream payload is not an object".to_string());
        }

        ProjectInfo {
            record_id: text(&mapped, "project.record_id").unwrap_or_default(),
            recipient_name: text(&mapped, "project.recipient_name"),
            recipient_id: text(&mapped, "project.recipient_id"),
            review_type: text(&mapped, "project.review_type"),
            region_number: integer(&mapped, "project.region_number"),
            recipient_city_state: text(&mapped, "project.recipient_city_state"),
            site_visit_dates: text(&mapped, "project.site_visit_dates"),
            report_date: text(&mapped, "project.report_date"),
        }
    }

    fn transform_controls(&self, items: &[Value], warnings: &mut Vec<String>) -> Vec<ControlEntry> {
        let mut controls = Vec::with_capacity(items.len());
        let mut dropped_keys: BTreeSet<String> = BTreeSet::new();

        for (index, item) in items.iter().enumerate() {
            if let Some(object) = item.as_object() {
                for key in object.keys() {
                    if !CONTROL_ITEM_KEYS.contains(&key.as_str()) {
                        dropped_keys.insert(key.clone());
                    }
                }
            }

            let control_id = lookup_text(item, "control.id");
            let name = lookup_text(item, "control.name");

            if control_id.is_none() && name.is_none() {
                warnings.push(format!(
                    "controls[{}]: missing control identity, entry dropped",
                    index
                ));
                continue;
            }

            let review_area =
                lookup_text(item, "control_family.name").unwrap_or_else(|| "Unknown".to_string());
            let finding = map_finding(
                lookup_text(item, "assessment.review_status").as_deref(),
                lookup_text(item, "assessment.status").as_deref(),
            );
            let description = lookup_text(item, "assessment.comments")
                .or_else(|| lookup_text(item, "assessment.description"));

            controls.push(ControlEntry {
                control_id: control_id.unwrap_or_default(),
                name: name.unwrap_or_default(),
                review_area,
                finding,
                description,
                corrective_action: lookup_text(item, "assessment.corrective_action"),
                due_date: lookup_date(item, "assessment.due_date", index, warnings),
                date_closed: lookup_date(item, "assessment.date_closed", index, warnings),
            });
        }

        for key in dropped_keys {
            warnings.push(format!(
                "controls.{}: unrecognized upstream field dropped",
                key
            ));
        }

        controls
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the upstream review status text onto a finding code. Explicit
/// deficiency or failure wording wins, then not-applicable wording, then the
/// overall assessment status decides.
fn map_finding(review_status: Option<&str>, status: Option<&str>) -> Finding {
    if let Some(review_status) = review_status {
        let lowered = review_status.to_lowercase();
        if lowered.contains("deficien") || lowered.contains("fail") {
            return Finding::Deficient;
        }
        if lowered.contains("not applicable") || lowered.contains("n/a") {
            return Finding::NotApplicable;
        }
    }

    match status {
        Some("Complete") | Some("Completed") => Finding::NotDeficient,
        Some("Not Started") => Finding::NotApplicable,
        _ => Finding::NotDeficient,
    }
}

fn coerce(value: &Value, coercion: Coercion) -> Option<Value> {
    match coercion {
        Coercion::Text => match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Value::String(trimmed.to_string()))
                }
            }
            Value::Number(n) => Some(Value::String(n.to_string())),
            _ => None,
        },
        Coercion::Integer => match value {
            Value::Number(n) => n.as_i64().map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
    }
}

fn text(mapped: &BTreeMap<&'static str, Value>, canonical: &str) -> Option<String> {
    mapped
        .get(canonical)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn integer(mapped: &BTreeMap<&'static str, Value>, canonical: &str) -> Option<i64> {
    mapped.get(canonical).and_then(|v| v.as_i64())
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |acc, segment| acc.get(segment))
}

fn lookup_text(value: &Value, path: &str) -> Option<String> {
    match lookup(value, path)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lookup_date(
    value: &Value,
    path: &str,
    index: usize,
    warnings: &mut Vec<String>,
) -> Option<NaiveDate> {
    let raw = lookup_text(value, path)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warnings.push(format!(
                "controls[{}].{}: unparseable date '{}', dropped",
                index,
                path.rsplit('.').next().unwrap_or(path),
                raw
            ));
            None
        }
    }
}
