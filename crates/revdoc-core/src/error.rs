//! Error types module
//!
//! This module provides the classified error type used throughout the revdoc
//! pipeline. Every failure a stage can produce is represented by one
//! `ReportError` variant, and each variant carries enough metadata (kind
//! string, HTTP status class, recoverability, log level) for the transport
//! layer to build a response without inspecting stage internals.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like request validation failures
    Debug,
    /// Warning level - for data problems and recoverable upstream issues
    Warn,
    /// Error level - for unexpected internal failures
    Error,
}

/// Caller-visible classification of an error, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself was malformed
    Client,
    /// Authentication with the upstream platform failed
    Auth,
    /// The caller lacks permission on the upstream platform
    Permission,
    /// The upstream platform failed or was unreachable
    Upstream,
    /// The fetched data is incomplete; not a system fault
    Data,
    /// A fault inside this service
    Internal,
    /// The pipeline deadline was exhausted
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("validation failed: {} field(s) missing", missing_fields.len())]
    ValidationFailed {
        missing_fields: Vec<String>,
        warnings: Vec<String>,
    },

    #[error("template binding failed: {0}")]
    TemplateBinding(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("deadline exceeded before stage '{stage}' after {elapsed_ms} ms")]
    DeadlineExceeded { stage: String, elapsed_ms: u64 },
}

/// Static metadata for each variant: (kind, error_code, http_status, class, recoverable, log_level).
/// The kind string is the stable taxonomy value surfaced in error responses.
fn report_error_static_metadata(
    err: &ReportError,
) -> (&'static str, &'static str, u16, ErrorClass, bool, LogLevel) {
    match err {
        ReportError::InvalidRequest(_) => (
            "InvalidRequest",
            "INVALID_REQUEST",
            400,
            ErrorClass::Client,
            false,
            LogLevel::Debug,
        ),
        ReportError::AuthFailure(_) => (
            "AuthFailure",
            "AUTH_FAILURE",
            401,
            ErrorClass::Auth,
            false,
            LogLevel::Debug,
        ),
        ReportError::AccessDenied(_) => (
            "AccessDenied",
            "ACCESS_DENIED",
            403,
            ErrorClass::Permission,
            false,
            LogLevel::Debug,
        ),
        ReportError::UpstreamUnavailable(_) => (
            "UpstreamUnavailable",
            "UPSTREAM_UNAVAILABLE",
            502,
            ErrorClass::Upstream,
            true,
            LogLevel::Warn,
        ),
        ReportError::UpstreamTimeout(_) => (
            "UpstreamTimeout",
            "UPSTREAM_TIMEOUT",
            504,
            ErrorClass::Upstream,
            true,
            LogLevel::Warn,
        ),
        ReportError::ValidationFailed { .. } => (
            "ValidationFailed",
            "VALIDATION_FAILED",
            400,
            ErrorClass::Data,
            false,
            LogLevel::Warn,
        ),
        ReportError::TemplateBinding(_) => (
            "TemplateBindingError",
            "TEMPLATE_BINDING_ERROR",
            500,
            ErrorClass::Internal,
            false,
            LogLevel::Error,
        ),
        ReportError::StorageFailure(_) => (
            "StorageFailure",
            "STORAGE_FAILURE",
            500,
            ErrorClass::Internal,
            true,
            LogLevel::Error,
        ),
        ReportError::DeadlineExceeded { .. } => (
            "DeadlineExceeded",
            "DEADLINE_EXCEEDED",
            504,
            ErrorClass::Timeout,
            false,
            LogLevel::Warn,
        ),
    }
}

impl ReportError {
    /// Stable taxonomy value surfaced as `error_kind` in error responses.
    pub fn kind(&self) -> &'static str {
        report_error_static_metadata(self).0
    }

    /// Machine-readable error code (e.g., "STORAGE_FAILURE")
    pub fn error_code(&self) -> &'static str {
        report_error_static_metadata(self).1
    }

    /// HTTP status code a transport layer should return
    pub fn http_status_code(&self) -> u16 {
        report_error_static_metadata(self).2
    }

    /// Caller-visible classification
    pub fn class(&self) -> ErrorClass {
        report_error_static_metadata(self).3
    }

    /// Whether the caller can reasonably retry the whole request
    pub fn is_recoverable(&self) -> bool {
        report_error_static_metadata(self).4
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        report_error_static_metadata(self).5
    }

    /// Client-facing message. `ValidationFailed` enumerates the missing
    /// fields so the caller can fix the upstream data instead of retrying.
    pub fn client_message(&self) -> String {
        match self {
            ReportError::ValidationFailed { missing_fields, .. } => {
                if missing_fields.is_empty() {
                    "record failed completeness checks".to_string()
                } else {
                    format!("record is missing required fields: {}", missing_fields.join(", "))
                }
            }
            other => other.to_string(),
        }
    }
}
