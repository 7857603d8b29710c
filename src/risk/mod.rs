//! Contextual risk scoring.
//!
//! Risk is the CVSS base score adjusted for where the asset sits and how
//! much it matters, with a bump when an exploit is known. The score is
//! clamped to the CVSS scale (0-10) so downstream consumers can band it the
//! same way they band raw CVSS.

use crate::model::NormalizedVulnerability;
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network exposure of the asset a finding lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExposureLevel {
    Internet,
    Dmz,
    Internal,
    Isolated,
}

impl ExposureLevel {
    /// Risk multiplier for this exposure level.
    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::Internet => 2.0,
            Self::Dmz => 1.5,
            Self::Internal => 1.0,
            Self::Isolated => 0.5,
        }
    }
}

impl Default for ExposureLevel {
    fn default() -> Self {
        Self::Internal
    }
}

/// Business criticality of the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetCriticality {
    Critical,
    High,
    Medium,
    Low,
}

impl AssetCriticality {
    /// Risk multiplier for this criticality tier.
    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::Critical => 2.0,
            Self::High => 1.5,
            Self::Medium => 1.0,
            Self::Low => 0.5,
        }
    }
}

impl Default for AssetCriticality {
    fn default() -> Self {
        Self::Medium
    }
}

/// Tunable weights for the risk formula. All default to a neutral 1.0
/// except the exploit bump.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskWeights {
    pub cvss_weight: f64,
    pub exposure_weight: f64,
    pub asset_weight: f64,
    /// Multiplier applied when an exploit is known to exist.
    pub exploit_weight: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            cvss_weight: 1.0,
            exposure_weight: 1.0,
            asset_weight: 1.0,
            exploit_weight: 1.5,
        }
    }
}

/// Asset context a finding is scored against.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetContext {
    pub exposure: ExposureLevel,
    pub criticality: AssetCriticality,
}

/// Risk band, aligned with the CVSS banding used elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Band a clamped risk score: >=9 Critical, >=7 High, >=4 Medium,
    /// else Low.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scored finding with the inputs that produced the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBreakdown {
    pub cve_id: String,
    pub score: f64,
    pub level: RiskLevel,
    pub cvss_score: f64,
    pub exposure: ExposureLevel,
    pub criticality: AssetCriticality,
    pub exploit_available: bool,
}

/// Score one finding against its asset context.
///
/// The CVSS input is the effective score (v3 preferred over v2); findings
/// with no CVSS data score 0. The result is clamped to 10.0.
#[must_use]
pub fn score_finding(
    finding: &NormalizedVulnerability,
    context: AssetContext,
    weights: &RiskWeights,
) -> RiskBreakdown {
    let cvss = finding.effective_cvss_score().unwrap_or(0.0);
    let exploit_available = finding.metadata.exploit_available;
    let score = compute_score(cvss, context, exploit_available, weights);

    RiskBreakdown {
        cve_id: finding.cve_id.clone(),
        score,
        level: RiskLevel::from_score(score),
        cvss_score: cvss,
        exposure: context.exposure,
        criticality: context.criticality,
        exploit_available,
    }
}

/// Score a batch of findings in parallel, preserving input order.
#[must_use]
pub fn score_findings(
    findings: &[NormalizedVulnerability],
    context: AssetContext,
    weights: &RiskWeights,
) -> Vec<RiskBreakdown> {
    findings
        .par_iter()
        .map(|finding| score_finding(finding, context, weights))
        .collect()
}

fn compute_score(
    cvss: f64,
    context: AssetContext,
    exploit_available: bool,
    weights: &RiskWeights,
) -> f64 {
    let exploit_component = if exploit_available {
        weights.exploit_weight
    } else {
        1.0
    };
    let raw = (cvss * weights.cvss_weight)
        * (context.exposure.multiplier() * weights.exposure_weight)
        * (context.criticality.multiplier() * weights.asset_weight)
        * exploit_component
        / 10.0;
    raw.min(10.0)
}
