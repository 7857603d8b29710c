//! Centralized source-format detection and dispatch.
//!
//! Callers that know the source format dispatch explicitly through
//! [`SourceFormat`]; callers that do not can run confidence-scored detection
//! across all registered normalizers first.

use super::grype::GrypeNormalizer;
use super::snyk::SnykNormalizer;
use super::traits::{FormatConfidence, FormatDetection, NormalizeOptions, ScanNormalizer};
use super::trivy::TrivyJsonNormalizer;
use super::sarif::TrivySarifNormalizer;
use crate::error::{NormalizeError, Result};
use crate::model::NormalizedScanResult;
use serde::{Deserialize, Serialize};

/// Minimum confidence for accepting a detection result.
pub const MIN_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// The raw scanner formats with a registered normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    TrivyJson,
    TrivySarif,
    GrypeJson,
    SnykJson,
}

impl SourceFormat {
    /// Human-readable format name, matching each normalizer's
    /// `format_name()`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TrivyJson => "trivy-json",
            Self::TrivySarif => "trivy-sarif",
            Self::GrypeJson => "grype-json",
            Self::SnykJson => "snyk-json",
        }
    }

    /// Parse a format name as accepted at API boundaries.
    ///
    /// Returns [`NormalizeError::UnsupportedFormat`] for anything without a
    /// registered normalizer.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trivy-json" | "trivy" => Ok(Self::TrivyJson),
            "trivy-sarif" | "sarif" => Ok(Self::TrivySarif),
            "grype-json" | "grype" => Ok(Self::GrypeJson),
            "snyk-json" | "snyk" => Ok(Self::SnykJson),
            other => Err(NormalizeError::UnsupportedFormat(other.to_string())),
        }
    }

    /// All registered formats, in detection-preference order.
    #[must_use]
    pub const fn all() -> [SourceFormat; 4] {
        [
            Self::TrivyJson,
            Self::TrivySarif,
            Self::GrypeJson,
            Self::SnykJson,
        ]
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of running detection over every registered normalizer.
#[derive(Debug, Clone)]
pub struct DetectedFormat {
    /// The winning format.
    pub format: SourceFormat,
    /// Confidence score (0.0-1.0).
    pub confidence: f32,
    /// Raw schema version declared by the payload, if any.
    pub version: Option<String>,
    /// Any warnings about the detection.
    pub warnings: Vec<String>,
}

/// Detector holding one instance of every registered normalizer.
pub struct FormatDetector {
    trivy: TrivyJsonNormalizer,
    sarif: TrivySarifNormalizer,
    grype: GrypeNormalizer,
    snyk: SnykNormalizer,
    min_confidence: f32,
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatDetector {
    /// Create a detector with the default confidence threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trivy: TrivyJsonNormalizer::new(),
            sarif: TrivySarifNormalizer::new(),
            grype: GrypeNormalizer::new(),
            snyk: SnykNormalizer::new(),
            min_confidence: MIN_CONFIDENCE_THRESHOLD,
        }
    }

    /// Create a detector with a custom confidence threshold.
    #[must_use]
    pub fn with_threshold(min_confidence: f32) -> Self {
        Self {
            min_confidence: min_confidence.clamp(0.0, 1.0),
            ..Self::new()
        }
    }

    fn normalizer(&self, format: SourceFormat) -> &dyn ScanNormalizer {
        match format {
            SourceFormat::TrivyJson => &self.trivy,
            SourceFormat::TrivySarif => &self.sarif,
            SourceFormat::GrypeJson => &self.grype,
            SourceFormat::SnykJson => &self.snyk,
        }
    }

    /// Run detection across every normalizer and pick the best match.
    ///
    /// Returns `None` when nothing meets the confidence threshold - there is
    /// deliberately no default bias toward any format.
    #[must_use]
    pub fn detect(&self, content: &str) -> Option<DetectedFormat> {
        let mut best: Option<(SourceFormat, FormatDetection)> = None;

        for format in SourceFormat::all() {
            let detection = self.normalizer(format).detect(content);
            tracing::debug!(
                format = format.name(),
                confidence = detection.confidence.value(),
                "format detection"
            );
            let better = match &best {
                Some((_, current)) => detection.confidence.value() > current.confidence.value(),
                None => true,
            };
            if better {
                best = Some((format, detection));
            }
        }

        let (format, detection) = best?;
        if detection.confidence.value() < self.min_confidence {
            return None;
        }

        Some(DetectedFormat {
            format,
            confidence: detection.confidence.value(),
            version: detection.version,
            warnings: detection.warnings,
        })
    }

    /// Normalize content through the normalizer for an explicitly named
    /// format.
    pub fn normalize(
        &self,
        content: &str,
        format: SourceFormat,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult> {
        self.normalizer(format).normalize_str(content, options)
    }

    /// Detect the format, then normalize.
    pub fn normalize_detected(
        &self,
        content: &str,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult> {
        let detected = self.detect(content).ok_or_else(|| {
            NormalizeError::UnsupportedFormat(
                "could not detect scanner format with sufficient confidence".to_string(),
            )
        })?;

        for warning in &detected.warnings {
            tracing::warn!("{warning}");
        }

        self.normalize(content, detected.format, options)
    }
}

/// Detect the source format of raw content.
///
/// Returns `None` when no registered normalizer claims the content with
/// sufficient confidence.
#[must_use]
pub fn detect_format(content: &str) -> Option<DetectedFormat> {
    FormatDetector::new().detect(content)
}

/// Advisory raw-schema-version probe, used before [`normalize`] to pick
/// options. Returns `None` when the payload declares no version.
#[must_use]
pub fn detect_schema_version(content: &str) -> Option<String> {
    detect_format(content)?.version
}

/// Normalize raw scanner content in an explicitly named format.
///
/// This is the single ingestion integration point: one raw payload in, one
/// [`NormalizedScanResult`] out.
pub fn normalize(
    content: &str,
    format: SourceFormat,
    options: &NormalizeOptions,
) -> Result<NormalizedScanResult> {
    FormatDetector::new().normalize(content, format, options)
}
