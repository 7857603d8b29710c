//! **Scanner-output normalization and policy evaluation for vulnerability management.**
//!
//! `vulngate` ingests the raw JSON that container and dependency scanners
//! emit, converts it into one canonical scan-result model, and evaluates
//! security policies against the normalized findings. It is a pure
//! computation library: no network, no filesystem, no database - callers
//! hand in strings and structs, and get structs back.
//!
//! ## Key Features
//!
//! - **Multi-Scanner Normalization**: Ingests Trivy (JSON and SARIF), Grype,
//!   and Snyk output, with confidence-scored automatic format detection.
//! - **Canonical Model**: Every scanner maps to the same
//!   [`NormalizedScanResult`], so downstream policy and risk code never
//!   touches scanner-specific shapes.
//! - **Policy Evaluation**: Severity thresholds, CVSS thresholds, and CVE
//!   blocklists, layered across ordered policies with approval-gated,
//!   expiring exceptions.
//! - **Conditional Policies**: Environment-aware block/warn decisions keyed
//!   on finding novelty against prior scan history.
//! - **Contextual Risk Scoring**: CVSS adjusted for exposure, asset
//!   criticality, and exploit availability.
//!
//! ## Core Concepts & Modules
//!
//! - **[`model`]**: The canonical data structures - [`NormalizedScanResult`],
//!   [`NormalizedVulnerability`], and the total severity/ecosystem mappings.
//! - **[`normalize`]**: One [`ScanNormalizer`] per supported raw format plus
//!   the [`FormatDetector`] that picks among them.
//! - **[`policy`]**: Rule-based evaluation ([`evaluate_policies`]) and the
//!   environment decision table ([`evaluate_conditional`]).
//! - **[`risk`]**: Contextual risk scoring over normalized findings.
//! - **[`schema`]**: Advisory registry of known raw schema versions.
//!
//! ## Getting Started: Normalizing a Scan
//!
//! ```
//! use vulngate::{normalize, NormalizeOptions, SourceFormat};
//!
//! fn main() -> Result<(), vulngate::NormalizeError> {
//!     let payload = r#"{
//!         "SchemaVersion": 2,
//!         "ArtifactName": "alpine:3.19",
//!         "ArtifactType": "container_image",
//!         "Results": []
//!     }"#;
//!
//!     let scan = normalize(payload, SourceFormat::TrivyJson, &NormalizeOptions::default())?;
//!
//!     println!(
//!         "Normalized {} findings from {}",
//!         scan.summary.total, scan.artifact.name
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Evaluating Policies
//!
//! ```
//! use chrono::Utc;
//! use vulngate::{evaluate_policies, Policy, PolicyRule, RuleAction};
//!
//! let policy = Policy {
//!     id: "default".to_string(),
//!     name: "Block critical findings".to_string(),
//!     rules: vec![PolicyRule::from_raw(
//!         "r1",
//!         "no criticals",
//!         "SEVERITY_THRESHOLD",
//!         &serde_json::json!({"severity": "CRITICAL"}),
//!         RuleAction::Block,
//!         100,
//!         None,
//!     )],
//! };
//!
//! let result = evaluate_policies(&[], &[policy], &[], Utc::now());
//! assert!(result.allowed);
//! ```
//!
//! ## Purity
//!
//! Every operation is deterministic given its inputs. The two wall-clock
//! touch points are injectable: the scan timestamp through
//! [`NormalizeOptions::scanned_at`] and the policy reference time as an
//! explicit parameter. Identical inputs yield identical outputs, which
//! [`NormalizedScanResult::content_hash`] makes cheap to verify.

// Lint to discourage unwrap() in production code - prefer explicit error handling
#![warn(clippy::unwrap_used)]
#![allow(
    // Cast safety: usize↔f64 casts in summary/risk math are bounded in practice
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    // Doc completeness: # Errors / # Panics sections are aspirational
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    // Normalizer conversion functions are inherently long
    clippy::too_many_lines,
    clippy::module_name_repetitions
)]

pub mod error;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod risk;
pub mod schema;

// Re-export main types for convenience
pub use error::{NormalizeError, Result};
pub use model::{
    ArtifactInfo, ArtifactType, Ecosystem, FindingId, FindingMetadata, LayerInfo,
    NormalizedScanResult, NormalizedVulnerability, PackageInfo, ScanMetadata, ScanSummary,
    ScannerInfo, Severity, CANONICAL_SCHEMA_VERSION,
};
pub use normalize::{
    detect_format, detect_schema_version, normalize, DetectedFormat, FormatDetector,
    GrypeNormalizer, NormalizeOptions, ScanNormalizer, SnykNormalizer, SourceFormat,
    TrivyJsonNormalizer, TrivySarifNormalizer,
};
pub use policy::{
    evaluate_conditional, evaluate_policies, evaluate_rules, ConditionalPolicyResult, Environment,
    FindingAction, Policy, PolicyEvaluation, PolicyException, PolicyRule, RuleAction,
    RuleCondition, ScanSnapshot,
};
pub use risk::{
    score_finding, score_findings, AssetContext, AssetCriticality, ExposureLevel, RiskBreakdown,
    RiskLevel, RiskWeights,
};
pub use schema::{CompatibilityReport, SchemaMapping, SchemaRegistry, StructureReport};
