//! Snyk test JSON output normalizer.
//!
//! Snyk reports one entry per vulnerable dependency path under
//! `vulnerabilities[]`. CVE ids live in `identifiers.CVE`; entries without
//! one keep the Snyk id (`SNYK-...`) so they remain addressable by policy
//! blocklists.

use super::traits::{
    parse_json_payload, FormatConfidence, FormatDetection, NormalizeOptions, ScanNormalizer,
};
use crate::error::{NormalizeError, Result};
use crate::model::{
    map_ecosystem, map_severity, ArtifactInfo, ArtifactType, FindingId, FindingMetadata,
    NormalizedScanResult, NormalizedVulnerability, PackageInfo, ScanMetadata, ScanSummary,
    ScannerInfo, CANONICAL_SCHEMA_VERSION,
};
use serde::Deserialize;

/// Exploit-maturity values that indicate a usable public exploit.
const EXPLOITABLE_MATURITIES: [&str; 4] = ["mature", "high", "functional", "proof of concept"];

/// Normalizer for Snyk's `snyk test --json` output.
pub struct SnykNormalizer;

impl SnykNormalizer {
    /// Create a new Snyk normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn convert(&self, report: SnykReport, options: &NormalizeOptions) -> Result<NormalizedScanResult> {
        let raw_vulns = report.vulnerabilities.ok_or_else(|| {
            NormalizeError::malformed(self.format_name(), "missing vulnerabilities array")
        })?;

        let mut vulnerabilities = Vec::new();
        let mut summary = ScanSummary::empty();

        for raw in &raw_vulns {
            let finding = convert_vulnerability(raw);
            summary.record(&finding);
            vulnerabilities.push(finding);
        }

        Ok(NormalizedScanResult {
            schema_version: CANONICAL_SCHEMA_VERSION.to_string(),
            scanner: ScannerInfo {
                name: "snyk".to_string(),
                version: options
                    .scanner_version
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                original_schema_version: options.schema_version.clone(),
            },
            artifact: ArtifactInfo {
                name: report
                    .project_name
                    .or(report.display_target_file)
                    .unwrap_or_else(|| "unknown".to_string()),
                artifact_type: ArtifactType::Repository,
                digest: None,
            },
            scan_metadata: ScanMetadata {
                scanned_at: options.effective_scanned_at(),
                duration_ms: None,
                config: None,
            },
            vulnerabilities,
            summary,
        })
    }
}

impl Default for SnykNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanNormalizer for SnykNormalizer {
    fn normalize_str(
        &self,
        content: &str,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult> {
        let report: SnykReport = parse_json_payload(content)?;
        self.convert(report, options)
    }

    fn format_name(&self) -> &'static str {
        "snyk-json"
    }

    fn supported_versions(&self) -> Vec<&'static str> {
        vec!["1"]
    }

    fn detect(&self, content: &str) -> FormatDetection {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
            return FormatDetection::no_match();
        };
        let Some(obj) = value.as_object() else {
            return FormatDetection::no_match();
        };

        let has_vulns = obj
            .get("vulnerabilities")
            .is_some_and(serde_json::Value::is_array);
        if !has_vulns {
            return FormatDetection::no_match();
        }

        // Distinguish from other formats that also have a top-level
        // vulnerabilities key by Snyk-specific markers.
        let snyk_markers = ["projectName", "packageManager", "ok", "org"]
            .iter()
            .filter(|k| obj.contains_key(**k))
            .count();

        match snyk_markers {
            0 => FormatDetection::with_confidence(FormatConfidence::LOW)
                .warning("vulnerabilities array present but no Snyk markers"),
            1 => FormatDetection::with_confidence(FormatConfidence::MEDIUM),
            _ => FormatDetection::with_confidence(FormatConfidence::HIGH),
        }
    }
}

fn convert_vulnerability(raw: &SnykVulnerability) -> NormalizedVulnerability {
    // Prefer the CVE id; keep the Snyk id for entries without one.
    let cve_id = raw
        .identifiers
        .as_ref()
        .and_then(|i| i.cve.first().cloned())
        .or_else(|| raw.id.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let name = raw
        .package_name
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let installed = raw.version.clone().unwrap_or_else(|| "unknown".to_string());

    let fixed_version = raw
        .fixed_in
        .first()
        .cloned()
        .or_else(|| raw.nearest_fixed_in_version.clone())
        .filter(|v| !v.is_empty());

    let exploit_available = raw
        .exploit
        .as_deref()
        .is_some_and(|e| EXPLOITABLE_MATURITIES.contains(&e.to_lowercase().as_str()));

    NormalizedVulnerability {
        id: FindingId::new(&cve_id, &name, &installed),
        cve_id,
        title: raw.title.clone().unwrap_or_default(),
        description: raw.description.clone().unwrap_or_default(),
        severity: map_severity(raw.severity.as_deref().unwrap_or("")),
        cvss_v2_score: None,
        cvss_v2_vector: None,
        cvss_v3_score: raw.cvss_score,
        cvss_v3_vector: raw.cvss_v3.clone(),
        cwe_ids: raw
            .identifiers
            .as_ref()
            .map(|i| i.cwe.clone())
            .unwrap_or_default(),
        references: raw
            .references
            .iter()
            .filter_map(|r| r.url.clone())
            .collect(),
        package: PackageInfo {
            name,
            installed_version: installed,
            fixed_version,
            ecosystem: map_ecosystem(raw.package_manager.as_deref().unwrap_or("")),
            path: raw.from.first().cloned(),
        },
        layer: None,
        published_at: super::trivy::parse_timestamp(raw.publication_time.as_deref()),
        last_modified_at: super::trivy::parse_timestamp(raw.modification_time.as_deref()),
        metadata: FindingMetadata {
            data_sources: vec!["snyk".to_string()],
            exploit_available,
        },
    }
}

// ============================================================================
// Raw Snyk report shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SnykReport {
    vulnerabilities: Option<Vec<SnykVulnerability>>,
    #[serde(rename = "projectName")]
    project_name: Option<String>,
    #[serde(rename = "displayTargetFile")]
    display_target_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnykVulnerability {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    severity: Option<String>,
    #[serde(rename = "cvssScore")]
    cvss_score: Option<f64>,
    #[serde(rename = "CVSSv3")]
    cvss_v3: Option<String>,
    identifiers: Option<SnykIdentifiers>,
    #[serde(rename = "packageName")]
    package_name: Option<String>,
    version: Option<String>,
    #[serde(rename = "fixedIn", default)]
    fixed_in: Vec<String>,
    #[serde(rename = "nearestFixedInVersion")]
    nearest_fixed_in_version: Option<String>,
    #[serde(rename = "packageManager")]
    package_manager: Option<String>,
    exploit: Option<String>,
    #[serde(rename = "publicationTime")]
    publication_time: Option<String>,
    #[serde(rename = "modificationTime")]
    modification_time: Option<String>,
    #[serde(default)]
    references: Vec<SnykReference>,
    #[serde(default)]
    from: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnykIdentifiers {
    #[serde(rename = "CVE", default)]
    cve: Vec<String>,
    #[serde(rename = "CWE", default)]
    cwe: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnykReference {
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ecosystem, Severity};

    fn pinned_options() -> NormalizeOptions {
        NormalizeOptions {
            scanned_at: Some("2024-06-01T00:00:00Z".parse().unwrap()),
            ..Default::default()
        }
    }

    const SNYK_REPORT: &str = r#"{
        "ok": false,
        "projectName": "my-app",
        "org": "acme",
        "vulnerabilities": [
            {
                "id": "SNYK-JS-LODASH-567746",
                "title": "Prototype Pollution",
                "description": "Affected versions of lodash...",
                "severity": "high",
                "cvssScore": 7.3,
                "CVSSv3": "CVSS:3.1/AV:N/AC:H/PR:N/UI:N/S:U/C:L/I:H/A:H",
                "identifiers": {"CVE": ["CVE-2020-8203"], "CWE": ["CWE-400"]},
                "packageName": "lodash",
                "version": "4.17.15",
                "fixedIn": ["4.17.19"],
                "packageManager": "npm",
                "exploit": "Proof of Concept",
                "publicationTime": "2020-04-28T00:00:00Z",
                "references": [{"url": "https://snyk.io/vuln/SNYK-JS-LODASH-567746"}],
                "from": ["my-app@1.0.0", "lodash@4.17.15"]
            }
        ]
    }"#;

    #[test]
    fn test_normalize_snyk_report() {
        let result = SnykNormalizer::new()
            .normalize_str(SNYK_REPORT, &pinned_options())
            .unwrap();

        assert_eq!(result.scanner.name, "snyk");
        assert_eq!(result.artifact.name, "my-app");
        assert_eq!(result.artifact.artifact_type, ArtifactType::Repository);

        let finding = &result.vulnerabilities[0];
        assert_eq!(finding.cve_id, "CVE-2020-8203");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.cvss_v3_score, Some(7.3));
        assert_eq!(finding.package.ecosystem, Ecosystem::Npm);
        assert_eq!(finding.package.fixed_version.as_deref(), Some("4.17.19"));
        assert_eq!(finding.cwe_ids, vec!["CWE-400".to_string()]);
        assert!(finding.metadata.exploit_available);
        assert!(finding.published_at.is_some());
    }

    #[test]
    fn test_snyk_id_kept_when_no_cve() {
        let content = r#"{
            "ok": false,
            "vulnerabilities": [
                {"id": "SNYK-JS-FOO-1", "severity": "low", "packageName": "foo", "version": "1.0.0"}
            ]
        }"#;
        let result = SnykNormalizer::new()
            .normalize_str(content, &pinned_options())
            .unwrap();
        assert_eq!(result.vulnerabilities[0].cve_id, "SNYK-JS-FOO-1");
    }

    #[test]
    fn test_exploit_maturity_mapping() {
        for (maturity, expected) in [
            ("Mature", true),
            ("Proof of Concept", true),
            ("Unproven", false),
            ("Not Defined", false),
        ] {
            let content = format!(
                r#"{{"ok": false, "vulnerabilities": [
                    {{"id": "X", "severity": "low", "packageName": "p", "version": "1", "exploit": "{maturity}"}}
                ]}}"#
            );
            let result = SnykNormalizer::new()
                .normalize_str(&content, &pinned_options())
                .unwrap();
            assert_eq!(
                result.vulnerabilities[0].metadata.exploit_available, expected,
                "maturity {maturity:?}"
            );
        }
    }

    #[test]
    fn test_missing_vulnerabilities_is_malformed() {
        let err = SnykNormalizer::new()
            .normalize_str(r#"{"ok": true}"#, &pinned_options())
            .unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedInput { .. }));
    }

    #[test]
    fn test_detect_snyk() {
        let detection = SnykNormalizer::new().detect(SNYK_REPORT);
        assert!(detection.confidence.value() >= 0.75);
    }
}
