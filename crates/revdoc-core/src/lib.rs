//! Revdoc Core Library
//!
//! This crate provides the domain models, error taxonomy, and configuration
//! shared across all revdoc components.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, StorageBackend};
pub use error::{ErrorClass, LogLevel, ReportError};
pub use models::{
    CanonicalRecord, ControlEntry, Finding, GenerateReportError, GenerateReportResponse,
    GenerateRequest, GeneratedArtifact, ProjectInfo, RawRecord, RecordMetadata, ReportMetadata,
    ReportType, RetrievalHandle, SCHEMA_VERSION,
};
