use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ReportError;

/// Report template selection. Each variant corresponds to one named template
/// in the template store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    DraftReviewReport,
    RecipientInfoRequest,
}

impl ReportType {
    /// Parse a report type string into a ReportType
    ///
    /// # Errors
    ///
    /// Returns an error if the report type is not recognized.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "draft_review_report" | "draft-review-report" => Ok(Self::DraftReviewReport),
            "recipient_info_request" | "recipient-info-request" => Ok(Self::RecipientInfoRequest),
            _ => Err(format!(
                "Unknown report type '{}'. Available types: draft_review_report, recipient_info_request",
                s
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DraftReviewReport => "draft_review_report",
            Self::RecipientInfoRequest => "recipient_info_request",
        }
    }

    /// Identifier of the template this report type renders from.
    pub fn template_id(&self) -> &'static str {
        match self {
            Self::DraftReviewReport => "draft-review-report",
            Self::RecipientInfoRequest => "recipient-info-request",
        }
    }
}

/// Inbound request for one report generation run. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateRequest {
    /// Upstream record identifier of the project under review
    #[validate(range(min = 1, message = "record_id must be a positive integer"))]
    pub record_id: i64,
    pub report_type: ReportType,
    /// Opaque upstream credential, exchanged for a session token
    #[validate(length(min = 1, message = "auth_token must not be empty"))]
    pub auth_token: String,
}

impl GenerateRequest {
    /// Validate the request, mapping violations to `InvalidRequest`.
    pub fn ensure_valid(&self) -> Result<(), ReportError> {
        self.validate()
            .map_err(|e| ReportError::InvalidRequest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_report_types() {
        assert_eq!(
            ReportType::parse("draft_review_report").unwrap(),
            ReportType::DraftReviewReport
        );
        assert_eq!(
            ReportType::parse("recipient-info-request").unwrap(),
            ReportType::RecipientInfoRequest
        );
        assert_eq!(
            ReportType::parse("DRAFT_REVIEW_REPORT").unwrap(),
            ReportType::DraftReviewReport
        );
    }

    #[test]
    fn test_parse_invalid_report_type() {
        let err = ReportType::parse("quarterly_summary").unwrap_err();
        assert!(err.contains("quarterly_summary"));
    }

    #[test]
    fn test_template_id_mapping() {
        assert_eq!(
            ReportType::DraftReviewReport.template_id(),
            "draft-review-report"
        );
        assert_eq!(
            ReportType::RecipientInfoRequest.template_id(),
            "recipient-info-request"
        );
    }

    #[test]
    fn test_request_validation_rejects_bad_record_id() {
        let request = GenerateRequest {
            record_id: 0,
            report_type: ReportType::DraftReviewReport,
            auth_token: "tok-123".to_string(),
        };
        let err = request.ensure_valid().unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }

    #[test]
    fn test_request_validation_rejects_empty_token() {
        let request = GenerateRequest {
            record_id: 33,
            report_type: ReportType::DraftReviewReport,
            auth_token: String::new(),
        };
        assert!(request.ensure_valid().is_err());
    }

    #[test]
    fn test_request_validation_accepts_valid_request() {
        let request = GenerateRequest {
            record_id: 33,
            report_type: ReportType::RecipientInfoRequest,
            auth_token: "tok-123".to_string(),
        };
        assert!(request.ensure_valid().is_ok());
    }
}
