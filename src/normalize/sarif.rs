//! Trivy SARIF 2.1.0 output normalizer.
//!
//! SARIF splits finding data between `results[]` and the rule table under
//! `tool.driver.rules[]`. The rule table is indexed by `ruleId` once, before
//! the main loop, so each finding resolves its metadata in O(1).
//!
//! Package name/version extraction is best-effort: structured result
//! properties are used when present, otherwise the finding's message text is
//! regex-parsed (`Package: X ... Version: Y`). Non-matching messages yield
//! `"unknown"`/`"unknown"` — lossy by design, the SARIF encoding simply does
//! not carry the data anywhere else.

use super::traits::{
    parse_json_payload, FormatConfidence, FormatDetection, NormalizeOptions, ScanNormalizer,
};
use crate::error::{NormalizeError, Result};
use crate::model::{
    map_sarif_severity, ArtifactInfo, ArtifactType, Ecosystem, FindingId,
    FindingMetadata, NormalizedScanResult, NormalizedVulnerability, PackageInfo, ScanMetadata,
    ScanSummary, ScannerInfo, Severity, CANONICAL_SCHEMA_VERSION,
};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

/// Normalizer for Trivy's SARIF output.
pub struct TrivySarifNormalizer {
    package_re: Regex,
}

impl TrivySarifNormalizer {
    /// Create a new SARIF normalizer.
    ///
    /// # Panics
    ///
    /// Never panics in practice; the embedded regex is a constant and valid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            // Dot-matches-newline so "Package: x\nInstalled Version: y"
            // message layouts parse too.
            #[allow(clippy::unwrap_used)]
            package_re: Regex::new(r"(?s)Package:\s*(\S+).*?Version:\s*(\S+)").unwrap(),
        }
    }

    fn convert(&self, log: SarifLog, options: &NormalizeOptions) -> Result<NormalizedScanResult> {
        let runs = log
            .runs
            .ok_or_else(|| NormalizeError::malformed(self.format_name(), "missing runs array"))?;
        let run = runs
            .into_iter()
            .next()
            .ok_or_else(|| NormalizeError::malformed(self.format_name(), "empty runs array"))?;
        let results = run
            .results
            .ok_or_else(|| NormalizeError::malformed(self.format_name(), "run has no results array"))?;

        let driver = run.tool.as_ref().and_then(|t| t.driver.as_ref());

        // Rule table indexed once; O(1) metadata lookup per finding.
        let rules: HashMap<&str, &SarifRule> = driver
            .and_then(|d| d.rules.as_ref())
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|r| r.id.as_deref().map(|id| (id, r)))
                    .collect()
            })
            .unwrap_or_default();

        let mut vulnerabilities = Vec::new();
        let mut summary = ScanSummary::empty();

        for result in &results {
            let finding = self.convert_result(result, &rules);
            summary.record(&finding);
            vulnerabilities.push(finding);
        }

        let artifact_name = run
            .properties
            .as_ref()
            .and_then(|p| p.image_name.clone())
            .or_else(|| {
                results
                    .iter()
                    .find_map(|r| r.first_location_uri().map(String::from))
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(NormalizedScanResult {
            schema_version: CANONICAL_SCHEMA_VERSION.to_string(),
            scanner: ScannerInfo {
                name: driver
                    .and_then(|d| d.name.clone())
                    .map(|n| n.to_lowercase())
                    .unwrap_or_else(|| "trivy".to_string()),
                version: options
                    .scanner_version
                    .clone()
                    .or_else(|| driver.and_then(|d| d.version.clone()))
                    .unwrap_or_else(|| "unknown".to_string()),
                original_schema_version: options.schema_version.clone().or(log.version),
            },
            artifact: ArtifactInfo {
                name: artifact_name,
                artifact_type: ArtifactType::Other,
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

    fn convert_result(
        &self,
        result: &SarifResult,
        rules: &HashMap<&str, &SarifRule>,
    ) -> NormalizedVulnerability {
        let cve_id = result
            .rule_id
            .clone()
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let rule = rules.get(cve_id.as_str());
        let rule_props = rule.and_then(|r| r.properties.as_ref());
        let message = result
            .message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .unwrap_or("");

        let (name, installed_version, fixed_version) = self.extract_package(result, message);

        let cvss_v3_score = rule_props
            .and_then(|p| p.security_severity.as_ref())
            .and_then(SarifNumberOrString::as_f64);

        let severity = match map_sarif_severity(cvss_v3_score) {
            // No usable score: fall back to the SARIF level.
            Severity::Unknown => map_level(result.level.as_deref()),
            s => s,
        };

        let cwe_ids: Vec<String> = rule_props
            .and_then(|p| p.tags.as_ref())
            .map(|tags| {
                tags.iter()
                    .filter(|t| t.starts_with("CWE-"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let mut references = Vec::new();
        if let Some(uri) = rule.and_then(|r| r.help_uri.clone()) {
            references.push(uri);
        }

        NormalizedVulnerability {
            id: FindingId::new(&cve_id, &name, &installed_version),
            cve_id,
            title: rule
                .and_then(|r| r.short_description.as_ref())
                .and_then(|d| d.text.clone())
                .unwrap_or_default(),
            description: rule
                .and_then(|r| r.full_description.as_ref())
                .and_then(|d| d.text.clone())
                .unwrap_or_else(|| message.to_string()),
            severity,
            cvss_v2_score: None,
            cvss_v2_vector: None,
            cvss_v3_score,
            cvss_v3_vector: rule_props.and_then(|p| p.cvss_v3_vector.clone()),
            cwe_ids,
            references,
            package: PackageInfo {
                name,
                installed_version,
                fixed_version,
                // SARIF carries no package-type field.
                ecosystem: Ecosystem::Other,
                path: result.first_location_uri().map(String::from),
            },
            layer: None,
            published_at: None,
            last_modified_at: None,
            metadata: FindingMetadata::default(),
        }
    }

    /// Structured result properties win; the message-text regex is the
    /// documented lossy fallback.
    fn extract_package(
        &self,
        result: &SarifResult,
        message: &str,
    ) -> (String, String, Option<String>) {
        if let Some(props) = &result.properties {
            if let Some(name) = &props.pkg_name {
                return (
                    name.clone(),
                    props
                        .installed_version
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    props.fixed_version.clone().filter(|v| !v.is_empty()),
                );
            }
        }

        match self.package_re.captures(message) {
            Some(caps) => (
                caps[1].to_string(),
                caps[2].to_string(),
                None,
            ),
            None => ("unknown".to_string(), "unknown".to_string(), None),
        }
    }
}

impl Default for TrivySarifNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanNormalizer for TrivySarifNormalizer {
    fn normalize_str(
        &self,
        content: &str,
        options: &NormalizeOptions,
    ) -> Result<NormalizedScanResult> {
        let log: SarifLog = parse_json_payload(content)?;
        self.convert(log, options)
    }

    fn format_name(&self) -> &'static str {
        "trivy-sarif"
    }

    fn supported_versions(&self) -> Vec<&'static str> {
        vec!["2.1.0"]
    }

    fn detect(&self, content: &str) -> FormatDetection {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
            return FormatDetection::no_match();
        };
        let Some(obj) = value.as_object() else {
            return FormatDetection::no_match();
        };

        let has_runs = obj.get("runs").is_some_and(serde_json::Value::is_array);
        if !has_runs {
            return FormatDetection::no_match();
        }

        let version = obj.get("version").and_then(|v| v.as_str());
        let schema_says_sarif = obj
            .get("$schema")
            .and_then(|v| v.as_str())
            .is_some_and(|s| s.to_lowercase().contains("sarif"));

        let detection = if schema_says_sarif || version == Some("2.1.0") {
            FormatDetection::with_confidence(FormatConfidence::CERTAIN)
        } else {
            FormatDetection::with_confidence(FormatConfidence::MEDIUM)
                .warning("runs array present but no SARIF schema marker")
        };

        match version {
            Some(v) => detection.version(v),
            None => detection,
        }
    }
}

fn map_level(level: Option<&str>) -> Severity {
    match level.unwrap_or("").to_ascii_lowercase().as_str() {
        "error" => Severity::High,
        "warning" => Severity::Medium,
        "note" => Severity::Low,
        _ => Severity::Unknown,
    }
}

// ============================================================================
// Raw SARIF shapes (the subset Trivy emits)
// ============================================================================

#[derive(Debug, Deserialize)]
struct SarifLog {
    version: Option<String>,
    runs: Option<Vec<SarifRun>>,
}

#[derive(Debug, Deserialize)]
struct SarifRun {
    tool: Option<SarifTool>,
    results: Option<Vec<SarifResult>>,
    properties: Option<SarifRunProperties>,
}

#[derive(Debug, Deserialize)]
struct SarifRunProperties {
    #[serde(rename = "imageName")]
    image_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SarifTool {
    driver: Option<SarifDriver>,
}

#[derive(Debug, Deserialize)]
struct SarifDriver {
    name: Option<String>,
    version: Option<String>,
    rules: Option<Vec<SarifRule>>,
}

#[derive(Debug, Deserialize)]
struct SarifRule {
    id: Option<String>,
    #[serde(rename = "shortDescription")]
    short_description: Option<SarifText>,
    #[serde(rename = "fullDescription")]
    full_description: Option<SarifText>,
    #[serde(rename = "helpUri")]
    help_uri: Option<String>,
    properties: Option<SarifRuleProperties>,
}

#[derive(Debug, Deserialize)]
struct SarifRuleProperties {
    #[serde(rename = "security-severity")]
    security_severity: Option<SarifNumberOrString>,
    #[serde(rename = "cvssV3_vector")]
    cvss_v3_vector: Option<String>,
    tags: Option<Vec<String>>,
}

/// SARIF emitters disagree on whether `security-severity` is a number or a
/// string; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SarifNumberOrString {
    Number(f64),
    String(String),
}

impl SarifNumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SarifText {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: Option<String>,
    level: Option<String>,
    message: Option<SarifText>,
    locations: Option<Vec<SarifLocation>>,
    properties: Option<SarifResultProperties>,
}

impl SarifResult {
    fn first_location_uri(&self) -> Option<&str> {
        self.locations
            .as_ref()?
            .first()?
            .physical_location
            .as_ref()?
            .artifact_location
            .as_ref()?
            .uri
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct SarifResultProperties {
    #[serde(rename = "pkgName")]
    pkg_name: Option<String>,
    #[serde(rename = "installedVersion")]
    installed_version: Option<String>,
    #[serde(rename = "fixedVersion")]
    fixed_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: Option<SarifPhysicalLocation>,
}

#[derive(Debug, Deserialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: Option<SarifArtifactLocation>,
}

#[derive(Debug, Deserialize)]
struct SarifArtifactLocation {
    uri: Option<String>,
}
