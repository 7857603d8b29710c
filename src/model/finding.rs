//! The normalized finding: one (CVE, package, version) occurrence in one scan.

use super::{Ecosystem, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable composite identifier for a finding.
///
/// Built from CVE × package name × installed version so the same
/// vulnerability observed in two scans of the same artifact deduplicates to
/// the same id. The package name is lower-cased for stability; the CVE id
/// and version are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingId(String);

impl FindingId {
    /// Compose a finding id from its three parts.
    #[must_use]
    pub fn new(cve_id: &str, package_name: &str, installed_version: &str) -> Self {
        Self(format!(
            "{}:{}:{}",
            cve_id,
            package_name.to_lowercase(),
            installed_version
        ))
    }

    /// The identifier string.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The affected package of a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub installed_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<String>,
    pub ecosystem: Ecosystem,
    /// Filesystem path of the package within the scanned artifact, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Container-image layer provenance, present only for image scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Auxiliary finding metadata.
///
/// `patch_available` is deliberately not a field here: it is derived from
/// `fixed_version` via [`NormalizedVulnerability::patch_available`] and can
/// never drift out of sync with it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FindingMetadata {
    /// Upstream data sources this finding was reported from.
    #[serde(default)]
    pub data_sources: Vec<String>,
    /// Whether a public exploit is known to exist.
    #[serde(default)]
    pub exploit_available: bool,
}

/// One package/CVE pairing found in one scan, in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVulnerability {
    /// Composite key, stable across re-scans of the same artifact.
    pub id: FindingId,
    pub cve_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_v2_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_v2_vector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_v3_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_v3_vector: Option<String>,
    /// CWE identifiers, deduplicated, original order preserved.
    #[serde(default)]
    pub cwe_ids: Vec<String>,
    /// Reference URLs, ordered as produced by the scanner.
    #[serde(default)]
    pub references: Vec<String>,
    pub package: PackageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<LayerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: FindingMetadata,
}

impl NormalizedVulnerability {
    /// The CVSS score to use for threshold decisions: V3 when present,
    /// otherwise V2, otherwise `None`.
    #[must_use]
    pub fn effective_cvss_score(&self) -> Option<f64> {
        self.cvss_v3_score.or(self.cvss_v2_score)
    }

    /// Whether an upstream fix exists. Derived from `fixed_version`.
    #[must_use]
    pub fn patch_available(&self) -> bool {
        self.package
            .fixed_version
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(fixed_version: Option<&str>) -> NormalizedVulnerability {
        NormalizedVulnerability {
            id: FindingId::new("CVE-2024-0001", "Lodash", "4.17.15"),
            cve_id: "CVE-2024-0001".to_string(),
            title: "Prototype pollution".to_string(),
            description: String::new(),
            severity: Severity::High,
            cvss_v2_score: Some(6.8),
            cvss_v2_vector: None,
            cvss_v3_score: None,
            cvss_v3_vector: None,
            cwe_ids: vec![],
            references: vec![],
            package: PackageInfo {
                name: "lodash".to_string(),
                installed_version: "4.17.15".to_string(),
                fixed_version: fixed_version.map(String::from),
                ecosystem: Ecosystem::Npm,
                path: None,
            },
            layer: None,
            published_at: None,
            last_modified_at: None,
            metadata: FindingMetadata::default(),
        }
    }

    #[test]
    fn test_finding_id_is_reproducible_and_case_folds_package() {
        let a = FindingId::new("CVE-2024-0001", "Lodash", "4.17.15");
        let b = FindingId::new("CVE-2024-0001", "lodash", "4.17.15");
        assert_eq!(a, b);
        assert_eq!(a.value(), "CVE-2024-0001:lodash:4.17.15");
    }

    #[test]
    fn test_finding_id_distinguishes_versions() {
        let a = FindingId::new("CVE-2024-0001", "lodash", "4.17.15");
        let b = FindingId::new("CVE-2024-0001", "lodash", "4.17.16");
        assert_ne!(a, b);
    }

    #[test]
    fn test_effective_cvss_prefers_v3() {
        let mut f = finding(None);
        assert_eq!(f.effective_cvss_score(), Some(6.8));
        f.cvss_v3_score = Some(8.1);
        assert_eq!(f.effective_cvss_score(), Some(8.1));
    }

    #[test]
    fn test_patch_available_derived_from_fixed_version() {
        assert!(!finding(None).patch_available());
        assert!(!finding(Some("  ")).patch_available());
        assert!(finding(Some("4.17.21")).patch_available());
    }
}
