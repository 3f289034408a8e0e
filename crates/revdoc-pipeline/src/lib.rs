//! Revdoc Pipeline Library
//!
//! The synchronous generation pipeline: one `Orchestrator::generate` call
//! takes a validated request through authentication, fetch, transformation,
//! validation, rendering, and artifact storage under a single wall-clock
//! deadline, returning either a download handle or a classified error.

pub mod orchestrator;
pub mod run;
pub mod telemetry;

// Re-export commonly used types
pub use orchestrator::Orchestrator;
pub use run::{PipelineRun, Stage};
pub use telemetry::init_telemetry;
