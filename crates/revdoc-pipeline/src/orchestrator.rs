//! Generation pipeline orchestrator
//!
//! Sequences the stages of one report generation run: authenticate, fetch,
//! transform, validate, generate, upload. Stages run strictly in order, each
//! consuming the previous stage's output; the deadline is checked before
//! every stage and network stages are additionally bounded by the remaining
//! budget. The first classified failure short-circuits the run, and this is
//! the single place a failure becomes a caller-visible error response.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use revdoc_client::{HttpTokenSource, RecordSource, TokenCache, UpstreamClient};
use revdoc_core::{
    CanonicalRecord, Config, GenerateReportError, GenerateReportResponse, GenerateRequest,
    LogLevel, ReportError, ReportMetadata,
};
use revdoc_processing::{
    CompletenessPolicy, DocumentGenerator, FsTemplateStore, Transformer, Validator,
};
use revdoc_storage::{artifact_key, create_store, ArtifactStore};

use crate::run::{PipelineRun, Stage};

pub struct Orchestrator {
    tokens: Arc<TokenCache>,
    source: Arc<dyn RecordSource>,
    transformer: Transformer,
    validator: Validator,
    generator: DocumentGenerator,
    store: Arc<dyn ArtifactStore>,
    deadline: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tokens: Arc<TokenCache>,
        source: Arc<dyn RecordSource>,
        transformer: Transformer,
        validator: Validator,
        generator: DocumentGenerator,
        store: Arc<dyn ArtifactStore>,
        deadline: Duration,
    ) -> Self {
        Orchestrator {
            tokens,
            source,
            transformer,
            validator,
            generator,
            store,
            deadline,
        }
    }

    /// Wire up the production pipeline from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let token_source = Arc::new(HttpTokenSource::from_config(config)?);
        let tokens = Arc::new(TokenCache::new(token_source, config.token_safety_margin()));
        let source = Arc::new(UpstreamClient::from_config(config)?);
        let generator = DocumentGenerator::new(Arc::new(FsTemplateStore::new(
            config.template_dir.clone(),
        )?));
        let store = create_store(config)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create artifact store: {}", e))?;

        Ok(Orchestrator::new(
            tokens,
            source,
            Transformer::new(),
            Validator::new(CompletenessPolicy::from_config(config)),
            generator,
            store,
            config.pipeline_deadline(),
        ))
    }

    /// Run the full pipeline for one request. The returned error response is
    /// terminal; the pipeline never retries on the caller's behalf.
    pub async fn generate(
        &self,
        request: GenerateRequest,
        correlation_id: Option<String>,
    ) -> Result<GenerateReportResponse, GenerateReportError> {
        let mut run = PipelineRun::new(correlation_id, self.deadline);

        tracing::info!(
            correlation_id = %run.correlation_id,
            record_id = request.record_id,
            report_type = request.report_type.as_str(),
            "report generation started"
        );

        match self.run_pipeline(&request, &mut run).await {
            Ok(response) => {
                tracing::info!(
                    correlation_id = %run.correlation_id,
                    report_id = %response.report_id,
                    file_size_bytes = response.file_size_bytes,
                    duration_ms = run.elapsed().as_secs_f64() * 1000.0,
                    "report generation completed"
                );
                Ok(response)
            }
            Err(err) => {
                let timings = run.timings_ms();
                match err.log_level() {
                    LogLevel::Error => tracing::error!(
                        correlation_id = %run.correlation_id,
                        error_kind = err.kind(),
                        error = %err,
                        "report generation failed"
                    ),
                    LogLevel::Warn => tracing::warn!(
                        correlation_id = %run.correlation_id,
                        error_kind = err.kind(),
                        error = %err,
                        "report generation failed"
                    ),
                    LogLevel::Debug => tracing::debug!(
                        correlation_id = %run.correlation_id,
                        error_kind = err.kind(),
                        error = %err,
                        "report generation rejected"
                    ),
                }
                Err(GenerateReportError::from_report_error(
                    &err,
                    run.correlation_id.clone(),
                    timings,
                ))
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &GenerateRequest,
        run: &mut PipelineRun,
    ) -> Result<GenerateReportResponse, ReportError> {
        let report_id = format!(
            "rpt-{}-{}",
            run.started_at.format("%Y%m%d-%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );

        timed_sync(run, Stage::Received, || request.ensure_valid())?;

        let token = {
            let fut = self.tokens.acquire(&request.auth_token);
            timed(run, Stage::Authenticating, fut).await?
        };

        let raw = {
            let budget = run.remaining();
            let correlation_id = run.correlation_id.clone();
            let fut = self
                .source
                .fetch(request.record_id, &token, budget, &correlation_id);
            timed(run, Stage::Fetching, fut).await?
        };

        let outcome = timed_sync(run, Stage::Transforming, || {
            Ok(self.transformer.transform(&raw))
        })?;

        let validation = timed_sync(run, Stage::Validating, || {
            Ok(self.validator.validate(&outcome.record))
        })?;

        let mut warnings = outcome.warnings;
        warnings.extend(validation.warnings);
        if !warnings.is_empty() {
            tracing::warn!(
                correlation_id = %run.correlation_id,
                warning_count = warnings.len(),
                first = %warnings[0],
                "record produced warnings"
            );
        }

        if !validation.valid {
            return Err(ReportError::ValidationFailed {
                missing_fields: validation.missing_fields.into_iter().collect(),
                warnings,
            });
        }

        let record = outcome.record;
        let template_id = request.report_type.template_id();

        let artifact = timed_sync(run, Stage::Generating, || {
            self.generator.render(&record, template_id)
        })?;
        let file_size_bytes = artifact.size_bytes;

        let handle = {
            let key = artifact_key(
                &run.correlation_id,
                &format!("{}_{}.md", report_id, template_id),
            );
            let fut = async { self.store.store(artifact, &key).await.map_err(Into::into) };
            timed(run, Stage::Uploading, fut).await?
        };

        let generated_at = Utc::now();
        let metadata = report_metadata(&record, run.elapsed());

        Ok(GenerateReportResponse {
            status: "completed".to_string(),
            report_id,
            record_id: request.record_id,
            report_type: request.report_type,
            download_url: handle.url,
            expires_at: handle.expires_at,
            generated_at,
            file_size_bytes,
            metadata,
            stage_timings_ms: run.timings_ms(),
            correlation_id: run.correlation_id.clone(),
        })
    }
}

/// Run one CPU-bound stage: deadline check on entry, elapsed recorded on
/// exit, failure or success.
fn timed_sync<T>(
    run: &mut PipelineRun,
    stage: Stage,
    f: impl FnOnce() -> Result<T, ReportError>,
) -> Result<T, ReportError> {
    run.check_deadline(stage)?;
    let started = Instant::now();
    let result = f();
    run.record(stage, started.elapsed());
    result
}

/// Run one suspension-point stage under the remaining deadline budget. A
/// mid-flight deadline converts the stage outcome to `DeadlineExceeded`
/// instead of letting the call hang.
async fn timed<T, F>(run: &mut PipelineRun, stage: Stage, fut: F) -> Result<T, ReportError>
where
    F: Future<Output = Result<T, ReportError>>,
{
    run.check_deadline(stage)?;
    let started = Instant::now();
    let result = tokio::time::timeout(run.remaining(), fut).await;
    run.record(stage, started.elapsed());
    match result {
        Ok(inner) => inner,
        Err(_) => Err(run.deadline_error(stage)),
    }
}

fn report_metadata(record: &CanonicalRecord, elapsed: Duration) -> ReportMetadata {
    ReportMetadata {
        recipient_name: record.project.recipient_name.clone().unwrap_or_default(),
        review_type: record.project.review_type.clone().unwrap_or_default(),
        review_area_count: record.metadata.total_controls,
        deficiency_count: record.metadata.deficiency_count,
        generation_time_ms: elapsed.as_millis() as u64,
    }
}
