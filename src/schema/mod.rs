//! Raw-schema version registry.
//!
//! Tracks which raw scanner schema versions the normalizers are known to
//! handle, recommends a fallback mapping for unknown versions, and offers
//! advisory structural validation. Nothing here blocks normalization: the
//! registry annotates confidence, the normalizers stay tolerant.

use crate::normalize::SourceFormat;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Everything the registry knows about one raw schema version.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaMapping {
    /// Raw schema version this mapping describes.
    pub version: String,
    /// Top-level fields the payload must carry for normalization to work.
    pub required_fields: Vec<&'static str>,
    /// Top-level fields that improve output quality but are not required.
    pub recommended_fields: Vec<&'static str>,
}

/// Result of a compatibility check for a (format, version) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub is_supported: bool,
    /// Latest known mapping to fall back to when unsupported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_version: Option<String>,
    /// Heuristic flags for behavior differences across versions.
    pub breaking_changes: Vec<String>,
}

/// Advisory structural validation result. Never blocks normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Registry of known raw schema versions per source format.
pub struct SchemaRegistry {
    mappings: IndexMap<SourceFormat, Vec<SchemaMapping>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Build the registry with the versions the bundled normalizers handle.
    #[must_use]
    pub fn new() -> Self {
        let mut mappings = IndexMap::new();
        mappings.insert(
            SourceFormat::TrivyJson,
            vec![SchemaMapping {
                version: "2".to_string(),
                required_fields: vec!["Results"],
                recommended_fields: vec!["SchemaVersion", "ArtifactName", "ArtifactType"],
            }],
        );
        mappings.insert(
            SourceFormat::TrivySarif,
            vec![SchemaMapping {
                version: "2.1.0".to_string(),
                required_fields: vec!["runs"],
                recommended_fields: vec!["version", "$schema"],
            }],
        );
        mappings.insert(
            SourceFormat::GrypeJson,
            vec![SchemaMapping {
                version: "1".to_string(),
                required_fields: vec!["matches"],
                recommended_fields: vec!["descriptor", "source"],
            }],
        );
        mappings.insert(
            SourceFormat::SnykJson,
            vec![SchemaMapping {
                version: "1".to_string(),
                required_fields: vec!["vulnerabilities"],
                recommended_fields: vec!["projectName", "ok"],
            }],
        );
        Self { mappings }
    }

    /// Whether a (format, version) pair has a known mapping.
    #[must_use]
    pub fn is_supported(&self, format: SourceFormat, version: &str) -> bool {
        self.mapping(format, version).is_some()
    }

    /// The mapping for a (format, version) pair, if known.
    #[must_use]
    pub fn mapping(&self, format: SourceFormat, version: &str) -> Option<&SchemaMapping> {
        self.mappings
            .get(&format)?
            .iter()
            .find(|m| m.version == version.trim())
    }

    /// The latest known mapping for a format.
    #[must_use]
    pub fn latest_mapping(&self, format: SourceFormat) -> Option<&SchemaMapping> {
        self.mappings.get(&format)?.last()
    }

    /// Check a declared raw schema version against the registry.
    ///
    /// Unsupported versions get the latest known mapping as a
    /// recommendation plus heuristic breaking-change flags.
    #[must_use]
    pub fn check_compatibility(&self, format: SourceFormat, version: &str) -> CompatibilityReport {
        if self.is_supported(format, version) {
            return CompatibilityReport {
                is_supported: true,
                recommended_version: None,
                breaking_changes: Vec::new(),
            };
        }

        let recommended = self.latest_mapping(format).map(|m| m.version.clone());
        let mut breaking_changes = Vec::new();

        match (version_major(version), recommended.as_deref().and_then(version_major)) {
            (Some(declared), Some(latest)) if declared < latest => {
                if format == SourceFormat::TrivyJson && declared < 2 {
                    breaking_changes.push(
                        "schema versions before 2 carry no per-source CVSS metadata".to_string(),
                    );
                }
                breaking_changes.push(format!(
                    "declared version {version} predates the latest known mapping {latest}"
                ));
            }
            (Some(declared), Some(latest)) if declared > latest => {
                breaking_changes.push(format!(
                    "declared version {version} is newer than the latest known mapping; \
                     unrecognized fields will be ignored"
                ));
            }
            _ => {
                breaking_changes.push(format!("unrecognized version string: {version:?}"));
            }
        }

        CompatibilityReport {
            is_supported: false,
            recommended_version: recommended,
            breaking_changes,
        }
    }

    /// Advisory structural validation of a raw payload against the mapping
    /// for a (format, version) pair.
    ///
    /// Missing required fields become errors, missing recommended fields
    /// warnings. The report only annotates confidence; the normalizer makes
    /// its own (tolerant) pass regardless.
    #[must_use]
    pub fn validate_structure(
        &self,
        format: SourceFormat,
        payload: &serde_json::Value,
        version: &str,
    ) -> StructureReport {
        let mapping = self
            .mapping(format, version)
            .or_else(|| self.latest_mapping(format));

        let Some(mapping) = mapping else {
            return StructureReport {
                is_valid: false,
                errors: vec![format!("no known mapping for format {format}")],
                warnings: Vec::new(),
            };
        };

        let Some(obj) = payload.as_object() else {
            return StructureReport {
                is_valid: false,
                errors: vec!["payload is not a JSON object".to_string()],
                warnings: Vec::new(),
            };
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for field in &mapping.required_fields {
            if !obj.contains_key(*field) {
                errors.push(format!("missing required field: {field}"));
            }
        }
        for field in &mapping.recommended_fields {
            if !obj.contains_key(*field) {
                warnings.push(format!("missing recommended field: {field}"));
            }
        }

        if !errors.is_empty() {
            tracing::warn!(
                format = format.name(),
                version,
                errors = errors.len(),
                "advisory schema validation found structural gaps"
            );
        }

        StructureReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Major version of a raw version string. Accepts bare integers (`"2"`) and
/// dotted versions (`"2.1.0"`, parsed through semver when well-formed).
fn version_major(version: &str) -> Option<u64> {
    let trimmed = version.trim();
    if let Ok(major) = trimmed.parse::<u64>() {
        return Some(major);
    }
    if let Ok(parsed) = semver::Version::parse(trimmed) {
        return Some(parsed.major);
    }
    // Two-segment versions like "2.1".
    trimmed.split('.').next()?.parse().ok()
}
