pub mod artifact;
pub mod canonical;
pub mod raw;
pub mod request;
pub mod response;

pub use artifact::{GeneratedArtifact, RetrievalHandle};
pub use canonical::{
    CanonicalRecord, ControlEntry, Finding, ProjectInfo, RecordMetadata, SCHEMA_VERSION,
};
pub use raw::RawRecord;
pub use request::{GenerateRequest, ReportType};
pub use response::{GenerateReportError, GenerateReportResponse, ReportMetadata};
