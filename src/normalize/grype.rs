//! Grype JSON output normalizer.
//!
//! Single pass over `matches[]`; each match pairs one vulnerability record
//! with the artifact (package) it was found in. CVSS entries are a list
//! tagged with their metric version rather than Trivy's per-source map.

use super::traits::{
    parse_json_payload, FormatConfidence, FormatDetection, NormalizeOptions, ScanNormalizer,
};
use crate::error::{NormalizeError, Result};
use crate::model::{
    map_artifact_type, map_ecosystem, map_severity, ArtifactInfo, FindingId, FindingMetadata,
    LayerInfo, NormalizedScanResult, NormalizedVulnerability, PackageInfo, ScanMetadata,
    ScanSummary, ScannerInfo, CANONICAL_SCHEMA_VERSION,
};
use serde::Deserialize;

/// Normalizer for Grype's JSON output.
pub struct GrypeNormalizer;

impl GrypeNormalizer {
    /// Create a new Grype normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn convert(&self, report: GrypeReport, options: &NormalizeOptions) -> Result<NormalizedScanResult> {
        let matches = report.matches.ok_or_else(|| {
            NormalizeError::malformed(self.format_name(), "missing matches array")
        })?;

        let mut vulnerabilities = Vec::new();
        let mut summary = ScanSummary::empty();

        for entry in &matches {
            let finding = convert_match(entry);
            summary.record(&finding);
            vulnerabilities.push(finding);
        }

        let (artifact_name, artifact_type, digest) = match &report.source {
            Some(source) => (
                source
                    .target
                    .as_ref()
                    .and_then(GrypeTarget::display_name)
                    .unwrap_or_else(|| "unknown".to_string()),
                map_artifact_type(source.source_type.as_deref().unwrap_or("")),
                source.target.as_ref().and_then(GrypeTarget::digest),
            ),
            None => (
                "unknown".to_string(),
                map_artifact_type(""),
                None,
            ),
        };

        Ok(NormalizedScanResult {
            schema_version: CANONICAL_SCHEMA_VERSION.to_string(),
            scanner: ScannerInfo {
                name: report
                    .descriptor
                    .as_ref()
                    .and_then(|d| d.name.clone())
                    .unwrap_or_else(|| "grype".to_string()),
                version: options
                    .scanner_version
                    .clone()
                    .or_else(|| report.descriptor.as_ref().and_then(|d| d.version.clone()))
                    .unwrap_or_else(|| "unknown".to_string()),
                original_schema_version: options.schema_version.clone(),
            },
            artifact: ArtifactInfo {
                name: artifact_name,
                artifact_type,
                digest,
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

impl Default for GrypeNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanNormalizer for GrypeNormalizer {
    fn normalize_str(
        &self,
        content: &str,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult> {
        let report: GrypeReport = parse_json_payload(content)?;
        self.convert(report, options)
    }

    fn format_name(&self) -> &'static str {
        "grype-json"
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

        let has_matches = obj.get("matches").is_some_and(serde_json::Value::is_array);
        if !has_matches {
            return FormatDetection::no_match();
        }

        let descriptor_name = obj
            .get("descriptor")
            .and_then(|d| d.get("name"))
            .and_then(|n| n.as_str());

        let detection = if descriptor_name == Some("grype") {
            FormatDetection::with_confidence(FormatConfidence::CERTAIN)
        } else {
            FormatDetection::with_confidence(FormatConfidence::MEDIUM)
                .warning("matches array present but no grype descriptor")
        };

        match obj
            .get("descriptor")
            .and_then(|d| d.get("version"))
            .and_then(|v| v.as_str())
        {
            Some(v) => detection.version(v),
            None => detection,
        }
    }
}

fn convert_match(entry: &GrypeMatch) -> NormalizedVulnerability {
    let vuln = entry.vulnerability.as_ref();
    let artifact = entry.artifact.as_ref();

    let cve_id = vuln
        .and_then(|v| v.id.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let name = artifact
        .and_then(|a| a.name.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let installed = artifact
        .and_then(|a| a.version.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let (cvss_v2_score, cvss_v2_vector, cvss_v3_score, cvss_v3_vector) =
        select_cvss(vuln.map(|v| v.cvss.as_slice()).unwrap_or(&[]));

    let fixed_version = vuln
        .and_then(|v| v.fix.as_ref())
        .filter(|f| f.state.as_deref() == Some("fixed") || !f.versions.is_empty())
        .and_then(|f| f.versions.first().cloned())
        .filter(|v| !v.is_empty());

    // Ecosystem: the language field is set for library packages, the type
    // field for OS packages. Try language first, then type.
    let ecosystem = artifact
        .map(|a| {
            let by_language = a
                .language
                .as_deref()
                .filter(|l| !l.is_empty())
                .map(map_ecosystem);
            match by_language {
                Some(eco) if eco != crate::model::Ecosystem::Other => eco,
                _ => map_ecosystem(a.artifact_type.as_deref().unwrap_or("")),
            }
        })
        .unwrap_or(crate::model::Ecosystem::Other);

    let first_location = artifact.and_then(|a| a.locations.first());

    NormalizedVulnerability {
        id: FindingId::new(&cve_id, &name, &installed),
        cve_id,
        title: String::new(),
        description: vuln
            .and_then(|v| v.description.clone())
            .unwrap_or_default(),
        severity: map_severity(vuln.and_then(|v| v.severity.as_deref()).unwrap_or("")),
        cvss_v2_score,
        cvss_v2_vector,
        cvss_v3_score,
        cvss_v3_vector,
        cwe_ids: Vec::new(),
        references: vuln.map(|v| v.urls.clone()).unwrap_or_default(),
        package: PackageInfo {
            name,
            installed_version: installed,
            fixed_version,
            ecosystem,
            path: first_location.and_then(|l| l.path.clone()),
        },
        layer: first_location.and_then(|l| {
            l.layer_id.as_ref().map(|id| LayerInfo {
                digest: Some(id.clone()),
                diff_id: None,
                created_by: None,
            })
        }),
        published_at: None,
        last_modified_at: None,
        metadata: FindingMetadata {
            data_sources: vuln
                .and_then(|v| v.data_source.clone())
                .into_iter()
                .collect(),
            exploit_available: false,
        },
    }
}

/// Split Grype's version-tagged CVSS list into (v2, v3) score/vector pairs.
fn select_cvss(entries: &[GrypeCvss]) -> (Option<f64>, Option<String>, Option<f64>, Option<String>) {
    let mut v2: (Option<f64>, Option<String>) = (None, None);
    let mut v3: (Option<f64>, Option<String>) = (None, None);

    for entry in entries {
        let version = entry.version.as_deref().unwrap_or("");
        let score = entry.metrics.as_ref().and_then(|m| m.base_score);
        if version.starts_with('3') && v3.0.is_none() {
            v3 = (score, entry.vector.clone());
        } else if version.starts_with('2') && v2.0.is_none() {
            v2 = (score, entry.vector.clone());
        }
    }

    (v2.0, v2.1, v3.0, v3.1)
}

// ============================================================================
// Raw Grype report shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct GrypeReport {
    matches: Option<Vec<GrypeMatch>>,
    source: Option<GrypeSource>,
    descriptor: Option<GrypeDescriptor>,
}

#[derive(Debug, Deserialize)]
struct GrypeMatch {
    vulnerability: Option<GrypeVulnerability>,
    artifact: Option<GrypeArtifact>,
}

#[derive(Debug, Deserialize)]
struct GrypeVulnerability {
    id: Option<String>,
    severity: Option<String>,
    description: Option<String>,
    #[serde(rename = "dataSource")]
    data_source: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    cvss: Vec<GrypeCvss>,
    fix: Option<GrypeFix>,
}

#[derive(Debug, Deserialize)]
struct GrypeCvss {
    version: Option<String>,
    vector: Option<String>,
    metrics: Option<GrypeCvssMetrics>,
}

#[derive(Debug, Deserialize)]
struct GrypeCvssMetrics {
    #[serde(rename = "baseScore")]
    base_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GrypeFix {
    #[serde(default)]
    versions: Vec<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrypeArtifact {
    name: Option<String>,
    version: Option<String>,
    #[serde(rename = "type")]
    artifact_type: Option<String>,
    language: Option<String>,
    #[serde(default)]
    locations: Vec<GrypeLocation>,
}

#[derive(Debug, Deserialize)]
struct GrypeLocation {
    path: Option<String>,
    #[serde(rename = "layerID")]
    layer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrypeSource {
    #[serde(rename = "type")]
    source_type: Option<String>,
    target: Option<GrypeTarget>,
}

/// Grype's source target is an object for image scans and a bare string for
/// directory scans.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GrypeTarget {
    Image {
        #[serde(rename = "userInput")]
        user_input: Option<String>,
        #[serde(rename = "imageID")]
        image_id: Option<String>,
    },
    Path(String),
}

impl GrypeTarget {
    fn display_name(&self) -> Option<String> {
        match self {
            Self::Image { user_input, .. } => user_input.clone(),
            Self::Path(p) => Some(p.clone()),
        }
    }

    fn digest(&self) -> Option<String> {
        match self {
            Self::Image { image_id, .. } => image_id.clone(),
            Self::Path(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GrypeDescriptor {
    name: Option<String>,
    version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactType, Ecosystem, Severity};

    fn pinned_options() -> NormalizeOptions {
        NormalizeOptions {
            scanned_at: Some("2024-06-01T00:00:00Z".parse().unwrap()),
            ..Default::default()
        }
    }

    const GRYPE_REPORT: &str = r#"{
        "matches": [
            {
                "vulnerability": {
                    "id": "CVE-2023-5678",
                    "severity": "High",
                    "description": "Buffer overflow in libfoo",
                    "dataSource": "https://nvd.nist.gov/vuln/detail/CVE-2023-5678",
                    "urls": ["https://nvd.nist.gov/vuln/detail/CVE-2023-5678"],
                    "cvss": [
                        {"version": "2.0", "vector": "AV:N/AC:L", "metrics": {"baseScore": 5.0}},
                        {"version": "3.1", "vector": "CVSS:3.1/AV:N", "metrics": {"baseScore": 7.5}}
                    ],
                    "fix": {"versions": ["2.4.1"], "state": "fixed"}
                },
                "artifact": {
                    "name": "libfoo",
                    "version": "2.4.0",
                    "type": "apk",
                    "language": "",
                    "locations": [{"path": "/lib/apk/db/installed", "layerID": "sha256:abc"}]
                }
            }
        ],
        "source": {
            "type": "image",
            "target": {"userInput": "alpine:3.19", "imageID": "sha256:deadbeef"}
        },
        "descriptor": {"name": "grype", "version": "0.74.0"}
    }"#;

    #[test]
    fn test_normalize_grype_report() {
        let result = GrypeNormalizer::new()
            .normalize_str(GRYPE_REPORT, &pinned_options())
            .unwrap();

        assert_eq!(result.scanner.name, "grype");
        assert_eq!(result.scanner.version, "0.74.0");
        assert_eq!(result.artifact.name, "alpine:3.19");
        assert_eq!(result.artifact.artifact_type, ArtifactType::ContainerImage);
        assert_eq!(result.artifact.digest.as_deref(), Some("sha256:deadbeef"));

        let finding = &result.vulnerabilities[0];
        assert_eq!(finding.cve_id, "CVE-2023-5678");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.cvss_v3_score, Some(7.5));
        assert_eq!(finding.cvss_v2_score, Some(5.0));
        assert_eq!(finding.package.ecosystem, Ecosystem::Alpine);
        assert_eq!(finding.package.fixed_version.as_deref(), Some("2.4.1"));
        assert_eq!(finding.layer.as_ref().unwrap().digest.as_deref(), Some("sha256:abc"));
    }

    #[test]
    fn test_language_preferred_over_type_for_ecosystem() {
        let content = r#"{
            "matches": [{
                "vulnerability": {"id": "CVE-1", "severity": "Low"},
                "artifact": {"name": "flask", "version": "2.0.0", "type": "python-pkg", "language": "python"}
            }],
            "descriptor": {"name": "grype", "version": "0.74.0"}
        }"#;
        let result = GrypeNormalizer::new()
            .normalize_str(content, &pinned_options())
            .unwrap();
        assert_eq!(result.vulnerabilities[0].package.ecosystem, Ecosystem::Pip);
    }

    #[test]
    fn test_missing_matches_is_malformed() {
        let err = GrypeNormalizer::new()
            .normalize_str(r#"{"descriptor": {"name": "grype"}}"#, &pinned_options())
            .unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedInput { .. }));
    }

    #[test]
    fn test_unfixed_finding_has_no_fixed_version() {
        let content = r#"{
            "matches": [{
                "vulnerability": {"id": "CVE-1", "severity": "Low", "fix": {"versions": [], "state": "not-fixed"}},
                "artifact": {"name": "a", "version": "1", "type": "deb"}
            }],
            "descriptor": {"name": "grype"}
        }"#;
        let result = GrypeNormalizer::new()
            .normalize_str(content, &pinned_options())
            .unwrap();
        assert!(result.vulnerabilities[0].package.fixed_version.is_none());
        assert_eq!(result.summary.fixable, 0);
    }

    #[test]
    fn test_detect_grype() {
        let detection = GrypeNormalizer::new().detect(GRYPE_REPORT);
        assert_eq!(detection.confidence.value(), 1.0);
        assert_eq!(detection.version.as_deref(), Some("0.74.0"));
    }

    #[test]
    fn test_directory_target() {
        let content = r#"{
            "matches": [],
            "source": {"type": "directory", "target": "/srv/app"},
            "descriptor": {"name": "grype"}
        }"#;
        let result = GrypeNormalizer::new()
            .normalize_str(content, &pinned_options())
            .unwrap();
        assert_eq!(result.artifact.name, "/srv/app");
        assert_eq!(result.artifact.artifact_type, ArtifactType::Filesystem);
    }
}
