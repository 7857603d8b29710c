//! Raw scanner-output normalizers.
//!
//! One normalizer per supported format (Trivy JSON, Trivy SARIF, Grype JSON,
//! Snyk JSON), each converting its raw payload into the canonical
//! [`NormalizedScanResult`](crate::model::NormalizedScanResult).
//!
//! ## Format detection
//!
//! A confidence-based detection system identifies formats without
//! trial-and-error parsing:
//! - each normalizer reports a confidence score (0.0-1.0) for the content
//! - the highest-confidence normalizer above threshold wins
//! - nothing above threshold means no match (no default bias)
//!
//! ## Purity
//!
//! Normalization is a pure function of (payload, options): no I/O, no
//! randomness. The one wall-clock input, the scan timestamp, is injectable
//! through [`NormalizeOptions`], so identical inputs yield identical
//! canonical output.

mod detection;
mod grype;
mod sarif;
mod snyk;
mod traits;
mod trivy;

pub use detection::{
    detect_format, detect_schema_version, normalize, DetectedFormat, FormatDetector, SourceFormat,
    MIN_CONFIDENCE_THRESHOLD,
};
pub use grype::GrypeNormalizer;
pub use sarif::TrivySarifNormalizer;
pub use snyk::SnykNormalizer;
pub use traits::{FormatConfidence, FormatDetection, NormalizeOptions, ScanNormalizer};
pub use trivy::TrivyJsonNormalizer;
