//! Normalizer trait definitions and format-detection types.
//!
//! Each raw scanner format gets one [`ScanNormalizer`] implementation, and
//! confidence-scored detection lets callers pick a normalizer without
//! trial-and-error parsing.

use crate::error::{NormalizeError, Result};
use crate::model::NormalizedScanResult;
use chrono::{DateTime, Utc};

/// Confidence level for format detection.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FormatConfidence(f32);

impl FormatConfidence {
    /// No confidence - definitely not this format.
    pub const NONE: Self = Self(0.0);
    /// Low confidence - might be this format.
    pub const LOW: Self = Self(0.25);
    /// Medium confidence - likely this format.
    pub const MEDIUM: Self = Self(0.5);
    /// High confidence - almost certainly this format.
    pub const HIGH: Self = Self(0.75);
    /// Certain - definitely this format.
    pub const CERTAIN: Self = Self(1.0);

    /// Create a new confidence value, clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    /// Get the confidence value.
    #[must_use]
    pub const fn value(&self) -> f32 {
        self.0
    }

    /// Check if this confidence indicates the format can be normalized.
    #[must_use]
    pub fn can_normalize(&self) -> bool {
        self.0 >= 0.25
    }
}

impl Default for FormatConfidence {
    fn default() -> Self {
        Self::NONE
    }
}

/// Detection result from a normalizer.
#[derive(Debug, Clone)]
pub struct FormatDetection {
    /// Confidence that this normalizer can handle the payload.
    pub confidence: FormatConfidence,
    /// Raw schema version declared by the payload, if any.
    pub version: Option<String>,
    /// Any issues detected that might affect normalization.
    pub warnings: Vec<String>,
}

impl FormatDetection {
    /// A detection result indicating no match.
    #[must_use]
    pub const fn no_match() -> Self {
        Self {
            confidence: FormatConfidence::NONE,
            version: None,
            warnings: Vec::new(),
        }
    }

    /// A detection result with the given confidence.
    #[must_use]
    pub const fn with_confidence(confidence: FormatConfidence) -> Self {
        Self {
            confidence,
            version: None,
            warnings: Vec::new(),
        }
    }

    /// Set the detected raw schema version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a warning.
    #[must_use]
    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Options for one normalization pass.
///
/// Normalization is a pure function of (payload, options): the only
/// wall-clock input, `scanned_at`, is injectable so tests can pin it.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Raw schema version override. When absent, the version declared by the
    /// payload (or the format's current default) is used.
    pub schema_version: Option<String>,
    /// Scanner version override for payloads that do not declare one.
    pub scanner_version: Option<String>,
    /// Scan timestamp. Defaults to `Utc::now()` at call time.
    pub scanned_at: Option<DateTime<Utc>>,
}

impl NormalizeOptions {
    /// The effective scan timestamp for this pass.
    #[must_use]
    pub fn effective_scanned_at(&self) -> DateTime<Utc> {
        self.scanned_at.unwrap_or_else(Utc::now)
    }
}

/// Trait for raw scanner-output normalizers.
///
/// Implementors convert one raw format into [`NormalizedScanResult`].
/// A structural failure (payload missing its results array entirely) is the
/// only error path; every per-field absence degrades to a documented
/// default (UNKNOWN severity, `"unknown"` package name, empty lists).
pub trait ScanNormalizer {
    /// Normalize raw payload content.
    fn normalize_str(
        &self,
        content: &str,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult>;

    /// Format name, e.g. `"trivy-json"`.
    fn format_name(&self) -> &'static str;

    /// Raw schema versions this normalizer is known to handle.
    fn supported_versions(&self) -> Vec<&'static str>;

    /// Detect whether this normalizer can handle the given content.
    ///
    /// Performs lightweight structural checks without full normalization.
    fn detect(&self, content: &str) -> FormatDetection;

    /// Quick check whether this normalizer can likely handle the content.
    fn can_normalize(&self, content: &str) -> bool {
        self.detect(content).confidence.can_normalize()
    }
}

/// Parse payload content as a JSON object, mapping parse failures to
/// [`NormalizeError::Json`]. Shared entry step for all four normalizers.
pub(crate) fn parse_json_payload<T: serde::de::DeserializeOwned>(content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(NormalizeError::from)
}
