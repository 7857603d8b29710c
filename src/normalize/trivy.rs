//! Trivy native JSON report normalizer.
//!
//! Handles the `Results[].Vulnerabilities[]` nesting of Trivy schema v2
//! reports. CVSS metrics live under per-source namespaces (`nvd`, `redhat`,
//! vendor ids); NVD is preferred, then Red Hat, then whatever remains.

use super::traits::{
    parse_json_payload, FormatConfidence, FormatDetection, NormalizeOptions, ScanNormalizer,
};
use crate::error::{NormalizeError, Result};
use crate::model::{
    map_artifact_type, map_ecosystem, map_severity, ArtifactInfo, FindingId, FindingMetadata,
    LayerInfo, NormalizedScanResult, NormalizedVulnerability, PackageInfo, ScanMetadata,
    ScanSummary, ScannerInfo, CANONICAL_SCHEMA_VERSION,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

/// Normalizer for Trivy's native JSON report format.
pub struct TrivyJsonNormalizer;

impl TrivyJsonNormalizer {
    /// Create a new Trivy JSON normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn convert(
        &self,
        report: TrivyReport,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult> {
        let results = report.results.ok_or_else(|| {
            NormalizeError::malformed(self.format_name(), "missing Results array")
        })?;

        let digest = report.metadata.as_ref().and_then(|m| {
            m.image_id
                .clone()
                .or_else(|| m.repo_digests.first().cloned())
        });

        let mut vulnerabilities = Vec::new();
        let mut summary = ScanSummary::empty();

        for result in &results {
            // Ecosystem comes from the result's Type, falling back to Class
            // for results that omit it.
            let raw_type = result
                .result_type
                .as_deref()
                .or(result.class.as_deref())
                .unwrap_or("");
            let ecosystem = map_ecosystem(raw_type);

            for raw in result.vulnerabilities.iter().flatten() {
                let finding = convert_vulnerability(raw, ecosystem, result.target.as_deref());
                summary.record(&finding);
                vulnerabilities.push(finding);
            }
        }

        Ok(NormalizedScanResult {
            schema_version: CANONICAL_SCHEMA_VERSION.to_string(),
            scanner: ScannerInfo {
                name: "trivy".to_string(),
                version: options
                    .scanner_version
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                original_schema_version: options
                    .schema_version
                    .clone()
                    .or_else(|| report.schema_version.map(|v| v.to_string())),
            },
            artifact: ArtifactInfo {
                name: report.artifact_name.unwrap_or_else(|| "unknown".to_string()),
                artifact_type: map_artifact_type(report.artifact_type.as_deref().unwrap_or("")),
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

impl Default for TrivyJsonNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanNormalizer for TrivyJsonNormalizer {
    fn normalize_str(
        &self,
        content: &str,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult> {
        let report: TrivyReport = parse_json_payload(content)?;
        self.convert(report, options)
    }

    fn format_name(&self) -> &'static str {
        "trivy-json"
    }

    fn supported_versions(&self) -> Vec<&'static str> {
        vec!["2"]
    }

    fn detect(&self, content: &str) -> FormatDetection {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
            return FormatDetection::no_match();
        };
        let Some(obj) = value.as_object() else {
            return FormatDetection::no_match();
        };

        let has_results = obj.get("Results").is_some_and(serde_json::Value::is_array);
        let schema_version = obj.get("SchemaVersion").and_then(serde_json::Value::as_i64);
        let has_artifact = obj.contains_key("ArtifactName");

        let detection = match (has_results, schema_version.is_some(), has_artifact) {
            (true, true, _) => FormatDetection::with_confidence(FormatConfidence::CERTAIN),
            (true, false, true) => FormatDetection::with_confidence(FormatConfidence::HIGH),
            (true, false, false) => FormatDetection::with_confidence(FormatConfidence::LOW)
                .warning("Results array present but no Trivy markers"),
            (false, true, _) => FormatDetection::with_confidence(FormatConfidence::LOW)
                .warning("SchemaVersion present but no Results array"),
            _ => return FormatDetection::no_match(),
        };

        match schema_version {
            Some(v) => detection.version(v.to_string()),
            None => detection,
        }
    }
}

fn convert_vulnerability(
    raw: &TrivyVulnerability,
    ecosystem: crate::model::Ecosystem,
    target: Option<&str>,
) -> NormalizedVulnerability {
    let cve_id = raw
        .vulnerability_id
        .clone()
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let name = raw.pkg_name.clone().unwrap_or_else(|| "unknown".to_string());
    let installed = raw
        .installed_version
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    let (cvss_v2_score, cvss_v2_vector, cvss_v3_score, cvss_v3_vector) =
        select_cvss(raw.cvss.as_ref());

    // First occurrence wins; duplicates are not necessarily adjacent.
    let mut cwe_ids: Vec<String> = Vec::new();
    for cwe in raw.cwe_ids.iter().flatten() {
        if !cwe_ids.contains(cwe) {
            cwe_ids.push(cwe.clone());
        }
    }

    NormalizedVulnerability {
        id: FindingId::new(&cve_id, &name, &installed),
        cve_id,
        title: raw.title.clone().unwrap_or_default(),
        description: raw.description.clone().unwrap_or_default(),
        severity: map_severity(raw.severity.as_deref().unwrap_or("")),
        cvss_v2_score,
        cvss_v2_vector,
        cvss_v3_score,
        cvss_v3_vector,
        cwe_ids,
        references: raw.references.clone().unwrap_or_default(),
        package: PackageInfo {
            name,
            installed_version: installed,
            fixed_version: raw.fixed_version.clone().filter(|v| !v.is_empty()),
            ecosystem,
            path: raw.pkg_path.clone().or_else(|| target.map(String::from)),
        },
        layer: raw.layer.as_ref().and_then(convert_layer),
        published_at: parse_timestamp(raw.published_date.as_deref()),
        last_modified_at: parse_timestamp(raw.last_modified_date.as_deref()),
        metadata: FindingMetadata {
            data_sources: raw
                .data_source
                .as_ref()
                .and_then(|d| d.id.clone().or_else(|| d.name.clone()))
                .into_iter()
                .collect(),
            exploit_available: false,
        },
    }
}

/// Pick CVSS metrics from Trivy's per-source namespaces: NVD first, then
/// Red Hat, then the first remaining source that carries any score.
fn select_cvss(
    cvss: Option<&IndexMap<String, TrivyCvss>>,
) -> (Option<f64>, Option<String>, Option<f64>, Option<String>) {
    let Some(cvss) = cvss else {
        return (None, None, None, None);
    };

    let preferred = cvss
        .get("nvd")
        .or_else(|| cvss.get("redhat"))
        .or_else(|| {
            cvss.values()
                .find(|m| m.v3_score.is_some() || m.v2_score.is_some())
        });

    match preferred {
        Some(m) => (
            m.v2_score,
            m.v2_vector.clone(),
            m.v3_score,
            m.v3_vector.clone(),
        ),
        None => (None, None, None, None),
    }
}

fn convert_layer(raw: &TrivyLayer) -> Option<LayerInfo> {
    if raw.digest.is_none() && raw.diff_id.is_none() && raw.created_by.is_none() {
        return None;
    }
    Some(LayerInfo {
        digest: raw.digest.clone(),
        diff_id: raw.diff_id.clone(),
        created_by: raw.created_by.clone(),
    })
}

pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

// ============================================================================
// Raw Trivy report shapes (schema v2)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TrivyReport {
    #[serde(rename = "SchemaVersion")]
    schema_version: Option<i64>,
    #[serde(rename = "ArtifactName")]
    artifact_name: Option<String>,
    #[serde(rename = "ArtifactType")]
    artifact_type: Option<String>,
    #[serde(rename = "Metadata")]
    metadata: Option<TrivyMetadata>,
    #[serde(rename = "Results")]
    results: Option<Vec<TrivyResult>>,
}

#[derive(Debug, Deserialize)]
struct TrivyMetadata {
    #[serde(rename = "ImageID")]
    image_id: Option<String>,
    #[serde(rename = "RepoDigests", default)]
    repo_digests: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
    #[serde(rename = "Target")]
    target: Option<String>,
    #[serde(rename = "Class")]
    class: Option<String>,
    #[serde(rename = "Type")]
    result_type: Option<String>,
    #[serde(rename = "Vulnerabilities")]
    vulnerabilities: Option<Vec<TrivyVulnerability>>,
}

#[derive(Debug, Deserialize)]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: Option<String>,
    #[serde(rename = "PkgName")]
    pkg_name: Option<String>,
    #[serde(rename = "PkgPath")]
    pkg_path: Option<String>,
    #[serde(rename = "InstalledVersion")]
    installed_version: Option<String>,
    #[serde(rename = "FixedVersion")]
    fixed_version: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "Severity")]
    severity: Option<String>,
    #[serde(rename = "CweIDs")]
    cwe_ids: Option<Vec<String>>,
    #[serde(rename = "CVSS")]
    cvss: Option<IndexMap<String, TrivyCvss>>,
    #[serde(rename = "References")]
    references: Option<Vec<String>>,
    #[serde(rename = "PublishedDate")]
    published_date: Option<String>,
    #[serde(rename = "LastModifiedDate")]
    last_modified_date: Option<String>,
    #[serde(rename = "Layer")]
    layer: Option<TrivyLayer>,
    #[serde(rename = "DataSource")]
    data_source: Option<TrivyDataSource>,
}

#[derive(Debug, Deserialize)]
struct TrivyCvss {
    #[serde(rename = "V2Score")]
    v2_score: Option<f64>,
    #[serde(rename = "V2Vector")]
    v2_vector: Option<String>,
    #[serde(rename = "V3Score")]
    v3_score: Option<f64>,
    #[serde(rename = "V3Vector")]
    v3_vector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrivyLayer {
    #[serde(rename = "Digest")]
    digest: Option<String>,
    #[serde(rename = "DiffID")]
    diff_id: Option<String>,
    #[serde(rename = "CreatedBy")]
    created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrivyDataSource {
    #[serde(rename = "ID")]
    id: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
}
