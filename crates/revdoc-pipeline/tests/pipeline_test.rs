//! End-to-end pipeline scenarios against fake collaborators: a canned
//! upstream source, a static token exchange, and a recording artifact store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;

use revdoc_client::{IssuedToken, RecordSource, TokenCache, TokenSource};
use revdoc_core::{GenerateRequest, GeneratedArtifact, RawRecord, ReportError, ReportType, RetrievalHandle};
use revdoc_pipeline::Orchestrator;
use revdoc_processing::{CompletenessPolicy, DocumentGenerator, FsTemplateStore, Transformer, Validator};
use revdoc_storage::{ArtifactStore, StorageError, StorageResult};

struct StaticTokenSource;

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn issue(&self, _credential: &str) -> Result<IssuedToken, ReportError> {
        Ok(IssuedToken {
            token: "sess-test".to_string(),
            ttl: Duration::from_secs(300),
        })
    }
}

/// Upstream fake: either returns a canned record or a classified error,
/// counting calls either way.
struct FakeSource {
    raw: Option<RawRecord>,
    error_kind: Option<&'static str>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn with_record(raw: RawRecord) -> Self {
        FakeSource {
            raw: Some(raw),
            error_kind: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(error_kind: &'static str) -> Self {
        FakeSource {
            raw: None,
            error_kind: Some(error_kind),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch(
        &self,
        _record_id: i64,
        _token: &str,
        _budget: Duration,
        _correlation_id: &str,
    ) -> Result<RawRecord, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.error_kind {
            Some("AccessDenied") => Err(ReportError::AccessDenied("403 on control listing".to_string())),
            Some("UpstreamUnavailable") => {
                Err(ReportError::UpstreamUnavailable("503 from upstream".to_string()))
            }
            Some(other) => Err(ReportError::UpstreamUnavailable(other.to_string())),
            None => Ok(self.raw.clone().expect("fake source configured with a record")),
        }
    }
}

/// Artifact store fake that records stored keys and fabricates handles.
struct RecordingStore {
    calls: AtomicUsize,
    fail_with: Option<fn() -> StorageError>,
}

impl RecordingStore {
    fn new() -> Self {
        RecordingStore {
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    fn failing(fail_with: fn() -> StorageError) -> Self {
        RecordingStore {
            calls: AtomicUsize::new(0),
            fail_with: Some(fail_with),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn store(
        &self,
        _artifact: GeneratedArtifact,
        key: &str,
    ) -> StorageResult<RetrievalHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        Ok(RetrievalHandle {
            url: format!("https://storage.test/{}", key),
            expires_at: Utc::now() + chrono::Duration::hours(24),
        })
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }
}

fn raw_control(id: usize, area: &str, review_status: &str) -> Value {
    json!({
        "id": id.to_string(),
        "control": {"id": id.to_string(), "name": format!("{} : C{}", area, id)},
        "control_family": {"name": area},
        "assessment": {
            "id": format!("a-{}", id),
            "status": "Complete",
            "review_status": review_status,
            "comments": "reviewed on site"
        }
    })
}

/// 21 review areas, two of them deficient.
fn complete_raw_record() -> RawRecord {
    let mut controls: Vec<Value> = (1..=19)
        .map(|i| raw_control(i, &format!("Area {}", i), "Satisfactory"))
        .collect();
    controls.push(raw_control(20, "Maintenance", "Deficient - repair logs missing"));
    controls.push(raw_control(21, "Drug and Alcohol", "Deficient - testing gap"));

    RawRecord::new(
        json!({
            "id": 33,
            "name": "Metro Transit Authority",
            "recipient_id": "1648",
            "review_type": "Triennial Review",
            "region": 5,
            "city_state": "Springfield, IL"
        }),
        controls,
    )
}

fn write_templates(dir: &TempDir) {
    let draft = "\
# Draft Review Report: {{ project.recipient_name }}

Review type: {{ project.review_type }}
Deficiencies: {{ metadata.deficiency_count }} of {{ metadata.total_controls }} review areas

{{#controls}}
- {{ control.review_area }}: {{ control.finding }}
{{/controls}}
";
    let rir = "\
# Recipient Information Request

To: {{ project.recipient_name }} ({{ project.recipient_city_state }})
";
    std::fs::write(dir.path().join("draft-review-report.md"), draft).unwrap();
    std::fs::write(dir.path().join("recipient-info-request.md"), rir).unwrap();
}

fn orchestrator(
    source: Arc<dyn RecordSource>,
    store: Arc<dyn ArtifactStore>,
    templates: &TempDir,
    deadline: Duration,
) -> Orchestrator {
    let tokens = Arc::new(TokenCache::new(
        Arc::new(StaticTokenSource),
        Duration::from_secs(30),
    ));
    let generator =
        DocumentGenerator::new(Arc::new(FsTemplateStore::new(templates.path()).unwrap()));

    Orchestrator::new(
        tokens,
        source,
        Transformer::new(),
        Validator::new(CompletenessPolicy::default()),
        generator,
        store,
        deadline,
    )
}

fn request() -> GenerateRequest {
    GenerateRequest {
        record_id: 33,
        report_type: ReportType::DraftReviewReport,
        auth_token: "cred-abc".to_string(),
    }
}

const DEADLINE: Duration = Duration::from_secs(120);

#[tokio::test]
async fn test_successful_run_reports_metadata_and_timings() {
    let templates = TempDir::new().unwrap();
    write_templates(&templates);
    let source = Arc::new(FakeSource::with_record(complete_raw_record()));
    let store = Arc::new(RecordingStore::new());

    let orchestrator = orchestrator(source.clone(), store.clone(), &templates, DEADLINE);
    let response = orchestrator
        .generate(request(), Some("corr-success".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status, "completed");
    assert_eq!(response.correlation_id, "corr-success");
    assert_eq!(response.metadata.recipient_name, "Metro Transit Authority");
    assert_eq!(response.metadata.review_type, "Triennial Review");
    assert_eq!(response.metadata.review_area_count, 21);
    assert_eq!(response.metadata.deficiency_count, 2);
    assert!(response.report_id.starts_with("rpt-"));
    assert!(response
        .download_url
        .starts_with("https://storage.test/reports/corr-success/"));
    assert!(response.file_size_bytes > 0);
    assert!(response.expires_at > response.generated_at);

    for stage in [
        "received",
        "authenticating",
        "fetching",
        "transforming",
        "validating",
        "generating",
        "uploading",
    ] {
        assert!(
            response.stage_timings_ms.contains_key(stage),
            "missing stage timing '{}'",
            stage
        );
    }

    assert_eq!(source.calls(), 1);
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_access_denied_short_circuits_pipeline() {
    let templates = TempDir::new().unwrap();
    write_templates(&templates);
    let source = Arc::new(FakeSource::failing("AccessDenied"));
    let store = Arc::new(RecordingStore::new());

    let orchestrator = orchestrator(source.clone(), store.clone(), &templates, DEADLINE);
    let error = orchestrator.generate(request(), None).await.unwrap_err();

    assert_eq!(error.status, "error");
    assert_eq!(error.error_kind, "AccessDenied");
    assert_eq!(store.calls(), 0, "no artifact may be stored after a fetch failure");
    // The failing stage still reports its timing.
    assert!(error.stage_timings_ms.contains_key("fetching"));
    assert!(!error.stage_timings_ms.contains_key("transforming"));
}

#[tokio::test]
async fn test_validation_failure_halts_before_generating() {
    let templates = TempDir::new().unwrap();
    write_templates(&templates);

    let mut raw = complete_raw_record();
    raw.project.as_object_mut().unwrap().remove("name");

    let source = Arc::new(FakeSource::with_record(raw));
    let store = Arc::new(RecordingStore::new());

    let orchestrator = orchestrator(source, store.clone(), &templates, DEADLINE);
    let error = orchestrator.generate(request(), None).await.unwrap_err();

    assert_eq!(error.error_kind, "ValidationFailed");
    assert!(error.message.contains("project.recipient_name"));
    assert_eq!(store.calls(), 0);
    assert!(error.stage_timings_ms.contains_key("validating"));
    assert!(!error.stage_timings_ms.contains_key("generating"));
    assert!(!error.stage_timings_ms.contains_key("uploading"));
}

#[tokio::test]
async fn test_exhausted_deadline_enters_no_stage() {
    let templates = TempDir::new().unwrap();
    write_templates(&templates);
    let source = Arc::new(FakeSource::with_record(complete_raw_record()));
    let store = Arc::new(RecordingStore::new());

    let orchestrator = orchestrator(source.clone(), store.clone(), &templates, Duration::ZERO);
    let error = orchestrator.generate(request(), None).await.unwrap_err();

    assert_eq!(error.error_kind, "DeadlineExceeded");
    assert_eq!(source.calls(), 0);
    assert_eq!(store.calls(), 0);
    assert!(error.stage_timings_ms.is_empty());
}

#[tokio::test]
async fn test_invalid_request_is_rejected_up_front() {
    let templates = TempDir::new().unwrap();
    write_templates(&templates);
    let source = Arc::new(FakeSource::with_record(complete_raw_record()));
    let store = Arc::new(RecordingStore::new());

    let orchestrator = orchestrator(source.clone(), store.clone(), &templates, DEADLINE);
    let bad_request = GenerateRequest {
        record_id: 0,
        report_type: ReportType::DraftReviewReport,
        auth_token: "cred".to_string(),
    };
    let error = orchestrator.generate(bad_request, None).await.unwrap_err();

    assert_eq!(error.error_kind, "InvalidRequest");
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_storage_conflict_maps_to_storage_failure() {
    let templates = TempDir::new().unwrap();
    write_templates(&templates);
    let source = Arc::new(FakeSource::with_record(complete_raw_record()));
    let store = Arc::new(RecordingStore::failing(|| {
        StorageError::AlreadyExists("reports/corr/x.md".to_string())
    }));

    let orchestrator = orchestrator(source, store.clone(), &templates, DEADLINE);
    let error = orchestrator.generate(request(), None).await.unwrap_err();

    assert_eq!(error.error_kind, "StorageFailure");
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_rendered_document_lists_each_review_area() {
    // Capture the artifact through a store fake that remembers the bytes.
    struct CapturingStore {
        body: std::sync::Mutex<Option<Vec<u8>>>,
    }

    #[async_trait]
    impl ArtifactStore for CapturingStore {
        async fn store(
            &self,
            artifact: GeneratedArtifact,
            key: &str,
        ) -> StorageResult<RetrievalHandle> {
            *self.body.lock().unwrap() = Some(artifact.bytes.to_vec());
            Ok(RetrievalHandle {
                url: format!("https://storage.test/{}", key),
                expires_at: Utc::now() + chrono::Duration::hours(24),
            })
        }

        async fn exists(&self, _key: &str) -> StorageResult<bool> {
            Ok(false)
        }
    }

    let templates = TempDir::new().unwrap();
    write_templates(&templates);
    let source = Arc::new(FakeSource::with_record(complete_raw_record()));
    let store = Arc::new(CapturingStore {
        body: std::sync::Mutex::new(None),
    });

    let orchestrator = orchestrator(source, store.clone(), &templates, DEADLINE);
    orchestrator.generate(request(), None).await.unwrap();

    let body = store.body.lock().unwrap().clone().unwrap();
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("# Draft Review Report: Metro Transit Authority"));
    assert!(text.contains("Deficiencies: 2 of 21 review areas"));
    assert!(text.contains("- Maintenance: D"));
    assert!(text.contains("- Area 1: ND"));
    assert_eq!(text.matches("\n- ").count(), 21);
}

#[tokio::test]
async fn test_token_cache_reused_across_runs() {
    struct CountingTokenSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for CountingTokenSource {
        async fn issue(&self, _credential: &str) -> Result<IssuedToken, ReportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(IssuedToken {
                token: "sess-shared".to_string(),
                ttl: Duration::from_secs(300),
            })
        }
    }

    let templates = TempDir::new().unwrap();
    write_templates(&templates);
    let token_source = Arc::new(CountingTokenSource {
        calls: AtomicUsize::new(0),
    });
    let tokens = Arc::new(TokenCache::new(token_source.clone(), Duration::from_secs(30)));
    let generator =
        DocumentGenerator::new(Arc::new(FsTemplateStore::new(templates.path()).unwrap()));

    let orchestrator = Orchestrator::new(
        tokens,
        Arc::new(FakeSource::with_record(complete_raw_record())),
        Transformer::new(),
        Validator::new(CompletenessPolicy::default()),
        generator,
        Arc::new(RecordingStore::new()),
        DEADLINE,
    );

    orchestrator
        .generate(request(), Some("corr-a".to_string()))
        .await
        .unwrap();
    orchestrator
        .generate(request(), Some("corr-b".to_string()))
        .await
        .unwrap();

    assert_eq!(
        token_source.calls.load(Ordering::SeqCst),
        1,
        "second run must reuse the cached session token"
    );
}
