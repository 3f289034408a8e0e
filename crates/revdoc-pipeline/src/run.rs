//! Pipeline run context
//!
//! One `PipelineRun` exists per generation request: the correlation id, the
//! hard deadline, and the per-stage timings accumulated as the orchestrator
//! walks the state machine. The run is owned by the orchestrator and passed
//! by reference into stage helpers; it is dropped when the response returns.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use revdoc_core::ReportError;

/// Orchestrator states. Transitions are strictly sequential; `Failed` is
/// reachable from any non-terminal state and is represented by the error
/// path rather than a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authenticating,
    Fetching,
    Transforming,
    Validating,
    Generating,
    Uploading,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Authenticating => "authenticating",
            Stage::Fetching => "fetching",
            Stage::Transforming => "transforming",
            Stage::Validating => "validating",
            Stage::Generating => "generating",
            Stage::Uploading => "uploading",
            Stage::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation context for one pipeline run.
pub struct PipelineRun {
    pub correlation_id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    deadline: Instant,
    stage_timings: Vec<(Stage, Duration)>,
}

impl PipelineRun {
    pub fn new(correlation_id: Option<String>, deadline: Duration) -> Self {
        let started = Instant::now();
        let correlation_id = correlation_id.unwrap_or_else(|| {
            format!("gen-sync-{}", &Uuid::new_v4().simple().to_string()[..12])
        });

        PipelineRun {
            correlation_id,
            started_at: Utc::now(),
            started,
            deadline: started + deadline,
            stage_timings: Vec::new(),
        }
    }

    /// Wall-clock budget left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Refuse to enter `stage` once the deadline is spent.
    pub fn check_deadline(&self, stage: Stage) -> Result<(), ReportError> {
        if self.remaining().is_zero() {
            Err(self.deadline_error(stage))
        } else {
            Ok(())
        }
    }

    pub fn deadline_error(&self, stage: Stage) -> ReportError {
        ReportError::DeadlineExceeded {
            stage: stage.as_str().to_string(),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.stage_timings.push((stage, elapsed));
    }

    pub fn timings_ms(&self) -> BTreeMap<String, u64> {
        self.stage_timings
            .iter()
            .map(|(stage, elapsed)| (stage.as_str().to_string(), elapsed.as_millis() as u64))
            .collect()
    }

    /// Stages recorded so far, in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        self.stage_timings.iter().map(|(stage, _)| *stage).collect()
    }
}
