//! Policy, rule, and exception records.
//!
//! Rule conditions are a tagged union keyed by rule type, with a fixed
//! payload shape per type. Conditions that arrive as untyped JSON (the usual
//! case when the caller loads them from storage) go through
//! [`RuleCondition::from_parts`], which degrades anything malformed to
//! `None` - a broken rule becomes a no-op, never a crash.

use crate::model::{NormalizedVulnerability, Severity};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What a matched rule does to the evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    Block,
    Warn,
}

/// Accepts both a bare value and a list where policy storage is inconsistent
/// about which one it saved.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    /// Materialize as a list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v.clone()],
            Self::Many(vs) => vs.clone(),
        }
    }
}

/// The condition side of a policy rule: a tagged union keyed by `ruleType`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "ruleType", content = "conditions")]
pub enum RuleCondition {
    /// Matches findings whose severity is in the configured set.
    #[serde(rename = "SEVERITY_THRESHOLD")]
    SeverityThreshold { severity: OneOrMany<Severity> },
    /// Matches findings whose CVSS v3 score is at least `gte`.
    /// Findings without a CVSS v3 score never match.
    #[serde(rename = "CVSS_THRESHOLD")]
    CvssThreshold { gte: f64 },
    /// Matches findings whose CVE id is in the configured list.
    #[serde(rename = "CVE_BLOCKLIST")]
    CveBlocklist { cve_ids: Vec<String> },
}

impl RuleCondition {
    /// Build a condition from a raw (`ruleType`, conditions JSON) pair.
    ///
    /// Unknown rule types and condition blobs that do not match the expected
    /// shape for their declared type return `None` with a warning - the
    /// owning rule becomes a no-op rather than poisoning the evaluation.
    #[must_use]
    pub fn from_parts(rule_type: &str, conditions: &serde_json::Value) -> Option<Self> {
        let parsed = match rule_type {
            "SEVERITY_THRESHOLD" => {
                #[derive(Deserialize)]
                struct Shape {
                    severity: OneOrMany<Severity>,
                }
                serde_json::from_value::<Shape>(conditions.clone())
                    .ok()
                    .map(|s| Self::SeverityThreshold { severity: s.severity })
            }
            "CVSS_THRESHOLD" => {
                #[derive(Deserialize)]
                struct Shape {
                    #[serde(rename = "cvssScore")]
                    cvss_score: GteShape,
                }
                #[derive(Deserialize)]
                struct GteShape {
                    gte: f64,
                }
                serde_json::from_value::<Shape>(conditions.clone())
                    .ok()
                    .filter(|s| s.cvss_score.gte.is_finite())
                    .map(|s| Self::CvssThreshold { gte: s.cvss_score.gte })
            }
            "CVE_BLOCKLIST" => {
                #[derive(Deserialize)]
                struct Shape {
                    #[serde(rename = "cveIds")]
                    cve_ids: Vec<String>,
                }
                serde_json::from_value::<Shape>(conditions.clone())
                    .ok()
                    .map(|s| Self::CveBlocklist { cve_ids: s.cve_ids })
            }
            _ => None,
        };

        if parsed.is_none() {
            tracing::warn!(
                rule_type,
                "unrecognized rule type or malformed conditions; rule degrades to no-op"
            );
        }
        parsed
    }

    /// Whether one finding matches this condition.
    #[must_use]
    pub fn matches(&self, finding: &NormalizedVulnerability) -> bool {
        match self {
            Self::SeverityThreshold { severity } => {
                severity.to_vec().contains(&finding.severity)
            }
            Self::CvssThreshold { gte } => finding
                .cvss_v3_score
                .is_some_and(|score| score >= *gte),
            Self::CveBlocklist { cve_ids } => cve_ids.iter().any(|c| c == &finding.cve_id),
        }
    }
}

/// One condition+action pair owned by a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub name: String,
    /// `None` means the stored conditions were malformed: the rule is kept
    /// for audit visibility but never matches anything.
    pub condition: Option<RuleCondition>,
    pub action: RuleAction,
    /// Evaluation order within the owning policy, descending.
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PolicyRule {
    /// Build a rule from raw storage parts, degrading malformed conditions
    /// to a no-op per [`RuleCondition::from_parts`].
    #[must_use]
    pub fn from_raw(
        id: impl Into<String>,
        name: impl Into<String>,
        rule_type: &str,
        conditions: &serde_json::Value,
        action: RuleAction,
        priority: i32,
        message: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            condition: RuleCondition::from_parts(rule_type, conditions),
            action,
            priority,
            message,
        }
    }
}

/// An ordered set of rules evaluated as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

/// Approval state of an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExceptionStatus {
    Pending,
    Approved,
    Rejected,
}

/// What an exception targets. Currently only CVE-scoped exceptions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExceptionType {
    Cve,
}

/// A scoped override that suppresses matching findings during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyException {
    pub id: String,
    pub exception_type: ExceptionType,
    /// The CVE id this exception targets.
    pub target_value: String,
    pub status: ExceptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PolicyException {
    /// Whether this exception suppresses findings at `now`: only APPROVED
    /// and non-expired exceptions do.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ExceptionStatus::Approved
            && self.expires_at.map_or(true, |expires| expires > now)
    }

    /// Whether this exception covers a given finding.
    #[must_use]
    pub fn covers(&self, finding: &NormalizedVulnerability) -> bool {
        match self.exception_type {
            ExceptionType::Cve => self.target_value == finding.cve_id,
        }
    }
}
