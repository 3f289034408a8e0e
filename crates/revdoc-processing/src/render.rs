//! Document rendering
//!
//! Binds a canonical record into a named text template: scalar placeholders
//! (`{{ project.recipient_name }}`) plus one repeating section
//! (`{{#controls}}...{{/controls}}`) that emits a block per control entry.
//! A placeholder with no corresponding canonical field fails with a template
//! binding error, which separates template-authoring bugs from data bugs.
//! Rendering is CPU-bound and performs no I/O beyond the template load.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use bytes::Bytes;
use regex::Regex;
use serde_json::Value;

use revdoc_core::{CanonicalRecord, GeneratedArtifact, ReportError};

const CONTENT_TYPE: &str = "text/markdown";
const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\s*\}\}";
const CONTROLS_SECTION_PATTERN: &str = r"(?s)\{\{#controls\}\}(.*?)\{\{/controls\}\}";

/// Read-only template source. Template storage itself is an external
/// collaborator; the pipeline only ever loads by identifier.
pub trait TemplateStore: Send + Sync {
    fn load(&self, template_id: &str) -> Result<String, ReportError>;
}

/// Filesystem template store with an in-memory cache, one `.md` file per
/// template identifier.
pub struct FsTemplateStore {
    template_dir: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FsTemplateStore {
    pub fn new(template_dir: impl Into<PathBuf>) -> Result<Self> {
        let template_dir = template_dir.into();
        if !template_dir.is_dir() {
            anyhow::bail!(
                "template directory does not exist: {}",
                template_dir.display()
            );
        }
        Ok(FsTemplateStore {
            template_dir,
            cache: Mutex::new(HashMap::new()),
        })
    }
}

impl TemplateStore for FsTemplateStore {
    fn load(&self, template_id: &str) -> Result<String, ReportError> {
        if template_id.contains("..") || template_id.contains('/') {
            return Err(ReportError::TemplateBinding(format!(
                "invalid template identifier: {}",
                template_id
            )));
        }

        if let Ok(cache) = self.cache.lock() {
            if let Some(text) = cache.get(template_id) {
                return Ok(text.clone());
            }
        }

        let path = self.template_dir.join(format!("{}.md", template_id));
        let text = std::fs::read_to_string(&path).map_err(|_| {
            ReportError::TemplateBinding(format!("template not found: {}", template_id))
        })?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(template_id.to_string(), text.clone());
        }

        tracing::debug!(template_id, path = %path.display(), "template loaded");
        Ok(text)
    }
}

pub struct DocumentGenerator {
    store: Arc<dyn TemplateStore>,
    placeholder: Regex,
    controls_section: Regex,
}

impl DocumentGenerator {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        DocumentGenerator {
            store,
            placeholder: Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"),
            controls_section: Regex::new(CONTROLS_SECTION_PATTERN)
                .expect("controls section pattern is valid"),
        }
    }

    /// Render the record through the named template, producing the final
    /// document bytes.
    pub fn render(
        &self,
        record: &CanonicalRecord,
        template_id: &str,
    ) -> Result<GeneratedArtifact, ReportError> {
        let template = self.store.load(template_id)?;

        let root = serde_json::to_value(record).map_err(|e| {
            ReportError::TemplateBinding(format!("canonical record is not serializable: {}", e))
        })?;

        let expanded = self.expand_controls_sections(&template, &root, template_id)?;
        let body = self.bind_placeholders(&expanded, &root, None, template_id)?;

        tracing::info!(
            template_id,
            size_bytes = body.len(),
            "document rendered"
        );

        Ok(GeneratedArtifact::new(Bytes::from(body), CONTENT_TYPE))
    }

    /// Replace each `{{#controls}}...{{/controls}}` section with one copy of
    /// its body per control entry, binding `control.*` paths against that
    /// entry.
    fn expand_controls_sections(
        &self,
        template: &str,
        root: &Value,
        template_id: &str,
    ) -> Result<String, ReportError> {
        let controls = root
            .get("controls")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in self.controls_section.captures_iter(template) {
            let section = caps.get(0).map(|m| (m.start(), m.end()));
            let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let (start, end) = match section {
                Some(range) => range,
                None => continue,
            };

            out.push_str(&template[last..start]);
            for control in &controls {
                out.push_str(&self.bind_placeholders(body, root, Some(control), template_id)?);
            }
            last = end;
        }

        out.push_str(&template[last..]);
        Ok(out)
    }

    fn bind_placeholders(
        &self,
        text: &str,
        root: &Value,
        control: Option<&Value>,
        template_id: &str,
    ) -> Result<String, ReportError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.placeholder.captures_iter(text) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let path = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

            out.push_str(&text[last..whole.start()]);
            out.push_str(&resolve(root, control, path, template_id)?);
            last = whole.end();
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

/// Resolve a dotted placeholder path to its rendered text. `control.*` paths
/// bind against the current repeating-section entry; everything else binds
/// against the record root. An unresolvable path is a template bug.
fn resolve(
    root: &Value,
    control: Option<&Value>,
    path: &str,
    template_id: &str,
) -> Result<String, ReportError> {
    let unknown = || {
        ReportError::TemplateBinding(format!(
            "template '{}' has no binding for placeholder '{}'",
            template_id, path
        ))
    };

    let (scope, remainder) = match path.strip_prefix("control.") {
        Some(remainder) => (control.ok_or_else(|| unknown())?, remainder),
        None => (root, path),
    };

    let mut current = scope;
    for segment in remainder.split('.') {
        current = current.get(segment).ok_or_else(|| unknown())?;
    }

    match current {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) | Value::Object(_) => Err(ReportError::TemplateBinding(format!(
            "template '{}' placeholder '{}' resolves to a non-scalar value",
            template_id, path
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revdoc_core::{ControlEntry, Finding, ProjectInfo, RecordMetadata, SCHEMA_VERSION};
    use tempfile::TempDir;

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

    fn record() -> CanonicalRecord {
        let controls = vec![
            control("Legal", Finding::NotDeficient),
            control("Maintenance", Finding::Deficient),
            control("Procurement", Finding::NotApplicable),
        ];
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

    fn generator_with_template(body: &str) -> (TempDir, DocumentGenerator) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("draft-review-report.md"), body).unwrap();
        let store = Arc::new(FsTemplateStore::new(dir.path()).unwrap());
        (dir, DocumentGenerator::new(store))
    }

    #[test]
    fn test_render_binds_scalar_placeholders() {
        let (_dir, generator) = generator_with_template(
            "# {{ project.recipient_name }}\nReview: {{ project.review_type }}\nRegion {{ project.region_number }}\n",
        );

        let artifact = generator.render(&record(), "draft-review-report").unwrap();
        let text = String::from_utf8(artifact.bytes.to_vec()).unwrap();

        assert!(text.contains("# Metro Transit Authority"));
        assert!(text.contains("Review: Triennial Review"));
        assert!(text.contains("Region 5"));
        assert_eq!(artifact.content_type, "text/markdown");
        assert_eq!(artifact.size_bytes, artifact.bytes.len());
    }

    #[test]
    fn test_render_repeats_controls_section_per_entry() {
        let (_dir, generator) = generator_with_template(
            "{{#controls}}- {{ control.review_area }}: {{ control.finding }}\n{{/controls}}",
        );

        let artifact = generator.render(&record(), "draft-review-report").unwrap();
        let text = String::from_utf8(artifact.bytes.to_vec()).unwrap();

        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("- Legal: ND"));
        assert!(text.contains("- Maintenance: D"));
        assert!(text.contains("- Procurement: NA"));
    }

    #[test]
    fn test_render_allows_root_paths_inside_section() {
        let (_dir, generator) = generator_with_template(
            "{{#controls}}{{ project.recipient_name }} / {{ control.name }}\n{{/controls}}",
        );

        let artifact = generator.render(&record(), "draft-review-report").unwrap();
        let text = String::from_utf8(artifact.bytes.to_vec()).unwrap();
        assert!(text.contains("Metro Transit Authority / Legal : C1"));
    }

    #[test]
    fn test_unknown_placeholder_is_a_binding_error() {
        let (_dir, generator) =
            generator_with_template("Budget: {{ project.total_budget }}\n");

        let err = generator
            .render(&record(), "draft-review-report")
            .unwrap_err();
        assert_eq!(err.kind(), "TemplateBindingError");
        assert!(err.to_string().contains("project.total_budget"));
    }

    #[test]
    fn test_absent_optional_value_renders_empty() {
        let (_dir, generator) = generator_with_template("Report date: [{{ project.report_date }}]");

        let artifact = generator.render(&record(), "draft-review-report").unwrap();
        let text = String::from_utf8(artifact.bytes.to_vec()).unwrap();
        assert!(text.contains("Report date: []"));
    }

    #[test]
    fn test_missing_template_is_a_binding_error() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FsTemplateStore::new(dir.path()).unwrap());
        let generator = DocumentGenerator::new(store);

        let err = generator.render(&record(), "no-such-template").unwrap_err();
        assert_eq!(err.kind(), "TemplateBindingError");
    }

    #[test]
    fn test_template_identifier_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsTemplateStore::new(dir.path()).unwrap();
        assert!(store.load("../secrets").is_err());
    }

    #[test]
    fn test_metadata_counts_render() {
        let (_dir, generator) = generator_with_template(
            "{{ metadata.deficiency_count }} deficiencies across {{ metadata.total_controls }} areas",
        );

        let artifact = generator.render(&record(), "draft-review-report").unwrap();
        let text = String::from_utf8(artifact.bytes.to_vec()).unwrap();
        assert!(text.contains("1 deficiencies across 3 areas"));
    }
}
