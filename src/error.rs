//! Unified error types for vulngate.
//!
//! Structural failures (a payload missing its results array, a source format
//! nobody registered a normalizer for) surface as typed errors. Field-level
//! gaps never do: a finding without a severity or a package name is absorbed
//! with documented defaults so one malformed entry cannot abort a whole scan.

use thiserror::Error;

/// Errors that can occur while normalizing raw scanner output.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NormalizeError {
    /// The payload lacks the minimum structure for its format
    /// (e.g. a Trivy report without a `Results` array).
    #[error("malformed {format} payload: {reason}")]
    MalformedInput { format: String, reason: String },

    /// The requested source format has no registered normalizer.
    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    /// The payload is not parseable JSON at all.
    #[error("JSON parse error: {0}")]
    Json(String),
}

impl NormalizeError {
    /// Create a malformed-input error for a given format.
    pub fn malformed(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            format: format.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for NormalizeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Convenient Result type for vulngate operations.
pub type Result<T> = std::result::Result<T, NormalizeError>;
