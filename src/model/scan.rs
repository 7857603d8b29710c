//! The canonical scan result - the format-agnostic output of one
//! normalization pass.

use super::{ArtifactType, Ecosystem, NormalizedVulnerability, Severity};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Version of the canonical schema itself. Bumped when the normalized shape
/// changes in a way consumers must know about.
pub const CANONICAL_SCHEMA_VERSION: &str = "1.0";

/// Identity of the scanner that produced the raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerInfo {
    pub name: String,
    pub version: String,
    /// The raw schema version the payload declared, when it declared one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_schema_version: Option<String>,
}

/// What was scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub artifact_type: ArtifactType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// When and how the scan ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub scanned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Scanner configuration echo, passed through opaquely when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// Aggregate counts over the findings of one scan.
///
/// `by_severity` always carries all five canonical keys, zero-filled, so
/// consumers never need to distinguish "absent" from "zero".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub by_severity: IndexMap<Severity, usize>,
    pub by_package_type: IndexMap<Ecosystem, usize>,
    /// Findings with a known fixed version.
    pub fixable: usize,
}

impl ScanSummary {
    /// An empty summary with all severity keys present and zeroed.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total: 0,
            by_severity: Severity::ALL.iter().map(|s| (*s, 0)).collect(),
            by_package_type: IndexMap::new(),
            fixable: 0,
        }
    }

    /// Account for one finding. Normalizers call this while iterating so the
    /// summary is built in the same single pass that produces the findings.
    pub fn record(&mut self, finding: &NormalizedVulnerability) {
        self.total += 1;
        *self.by_severity.entry(finding.severity).or_insert(0) += 1;
        *self
            .by_package_type
            .entry(finding.package.ecosystem)
            .or_insert(0) += 1;
        if finding.patch_available() {
            self.fixable += 1;
        }
    }

    /// Build a summary from an already-materialized finding list.
    #[must_use]
    pub fn from_findings(findings: &[NormalizedVulnerability]) -> Self {
        let mut summary = Self::empty();
        for finding in findings {
            summary.record(finding);
        }
        summary
    }
}

impl Default for ScanSummary {
    fn default() -> Self {
        Self::empty()
    }
}

/// Canonical output of one normalization pass. Immutable once produced;
/// persistence and policy evaluation both consume it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScanResult {
    /// Always [`CANONICAL_SCHEMA_VERSION`].
    pub schema_version: String,
    pub scanner: ScannerInfo,
    pub artifact: ArtifactInfo,
    pub scan_metadata: ScanMetadata,
    /// Findings in the order the scanner produced them. Not sorted.
    pub vulnerabilities: Vec<NormalizedVulnerability>,
    pub summary: ScanSummary,
}

impl NormalizedScanResult {
    /// Content hash over everything except `scan_metadata` (whose
    /// `scanned_at` is wall-clock). Two normalizations of the same payload
    /// hash identically, which makes idempotence checks and persistence
    /// dedup cheap.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut input = Vec::new();
        if let Ok(bytes) = serde_json::to_vec(&self.scanner) {
            input.extend(bytes);
        }
        if let Ok(bytes) = serde_json::to_vec(&self.artifact) {
            input.extend(bytes);
        }
        for finding in &self.vulnerabilities {
            if let Ok(bytes) = serde_json::to_vec(finding) {
                input.extend(bytes);
            }
        }
        xxh3_64(&input)
    }

    /// Convenience view of the finding count by severity rank, highest first.
    #[must_use]
    pub fn severity_counts(&self) -> Vec<(Severity, usize)> {
        Severity::ALL
            .iter()
            .map(|s| (*s, self.summary.by_severity.get(s).copied().unwrap_or(0)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FindingId, FindingMetadata, PackageInfo};

    fn finding(severity: Severity, ecosystem: Ecosystem, fixed: Option<&str>) -> NormalizedVulnerability {
        NormalizedVulnerability {
            id: FindingId::new("CVE-2024-0001", "pkg", "1.0.0"),
            cve_id: "CVE-2024-0001".to_string(),
            title: String::new(),
            description: String::new(),
            severity,
            cvss_v2_score: None,
            cvss_v2_vector: None,
            cvss_v3_score: None,
            cvss_v3_vector: None,
            cwe_ids: vec![],
            references: vec![],
            package: PackageInfo {
                name: "pkg".to_string(),
                installed_version: "1.0.0".to_string(),
                fixed_version: fixed.map(String::from),
                ecosystem,
                path: None,
            },
            layer: None,
            published_at: None,
            last_modified_at: None,
            metadata: FindingMetadata::default(),
        }
    }

    #[test]
    fn test_empty_summary_has_all_severity_keys() {
        let summary = ScanSummary::empty();
        assert_eq!(summary.by_severity.len(), 5);
        for severity in Severity::ALL {
            assert_eq!(summary.by_severity.get(&severity), Some(&0));
        }
    }

    #[test]
    fn test_summary_counts_are_consistent() {
        let findings = vec![
            finding(Severity::Critical, Ecosystem::Npm, Some("2.0.0")),
            finding(Severity::Critical, Ecosystem::Npm, None),
            finding(Severity::Low, Ecosystem::Debian, None),
        ];
        let summary = ScanSummary::from_findings(&findings);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_severity[&Severity::Critical], 2);
        assert_eq!(summary.by_severity[&Severity::Low], 1);
        assert_eq!(summary.by_severity.values().sum::<usize>(), summary.total);
        assert_eq!(summary.by_package_type[&Ecosystem::Npm], 2);
        assert_eq!(summary.by_package_type[&Ecosystem::Debian], 1);
        assert_eq!(summary.fixable, 1);
    }

    #[test]
    fn test_content_hash_ignores_scan_time() {
        let make = |scanned_at| NormalizedScanResult {
            schema_version: CANONICAL_SCHEMA_VERSION.to_string(),
            scanner: ScannerInfo {
                name: "trivy".to_string(),
                version: "0.50.0".to_string(),
                original_schema_version: Some("2".to_string()),
            },
            artifact: ArtifactInfo {
                name: "alpine:3.19".to_string(),
                artifact_type: ArtifactType::ContainerImage,
                digest: None,
            },
            scan_metadata: ScanMetadata {
                scanned_at,
                duration_ms: None,
                config: None,
            },
            vulnerabilities: vec![finding(Severity::High, Ecosystem::Alpine, None)],
            summary: ScanSummary::from_findings(&[finding(
                Severity::High,
                Ecosystem::Alpine,
                None,
            )]),
        };

        let a = make("2024-01-01T00:00:00Z".parse().unwrap());
        let b = make("2025-06-15T12:30:00Z".parse().unwrap());
        assert_eq!(a.content_hash(), b.content_hash());
    }
}
