//! DentalScan Core Library
//!
//! Domain rules shared by the DentalScan backend:
//! - Uploads are validated against a MIME whitelist and a 10MB ceiling
//! - A mock analyzer turns an image reference into detected issues,
//!   an overall severity and a prioritised list of recommendations
//! - Submissions move through a small status state machine
//! - Admin statistics are folded from stored analysis results

pub mod analysis;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod severity;
pub mod stats;
pub mod upload;

pub use analysis::{
    AnalysisReport, DetectedIssue, IssueType, MockAnalyzer, Priority, Recommendation,
    DISCLAIMER, MODEL_VERSION,
};
pub use error::Error;
pub use lifecycle::SubmissionStatus;
pub use notification::EmailTemplate;
pub use severity::{overall_severity, Severity};
pub use stats::{AnalysisStats, IssueCount, SeverityDistribution};
pub use upload::{ImageMime, MAX_UPLOAD_BYTES};

/// Result type for dentalscan-core operations
pub type Result<T> = std::result::Result<T, Error>;
