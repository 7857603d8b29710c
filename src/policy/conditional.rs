//! Environment-aware conditional evaluation.
//!
//! Classifies each finding by (environment, severity, novelty): a finding is
//! "new" when it is absent from every earlier scan snapshot, "existing"
//! otherwise. The decision table deliberately gets stricter the closer the
//! environment is to production, and development never blocks.

use crate::model::{NormalizedScanResult, NormalizedVulnerability, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deployment environment a conditional policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Production,
    Staging,
    Development,
    /// Environment-agnostic profile, used when the caller has no
    /// environment signal.
    All,
}

impl Environment {
    /// Canonical upper-case name, matching the serialized form.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Production => "PRODUCTION",
            Self::Staging => "STAGING",
            Self::Development => "DEVELOPMENT",
            Self::All => "ALL",
        }
    }
}

/// Per-finding decision from conditional evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingAction {
    Block,
    Warn,
    Info,
    Allow,
}

/// One prior scan, reduced to what novelty tracking needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub scanned_at: DateTime<Utc>,
    pub cve_ids: Vec<String>,
}

impl ScanSnapshot {
    /// Reduce a full canonical scan result to a snapshot.
    #[must_use]
    pub fn from_scan(scan: &NormalizedScanResult) -> Self {
        Self {
            scanned_at: scan.scan_metadata.scanned_at,
            cve_ids: scan
                .vulnerabilities
                .iter()
                .map(|f| f.cve_id.clone())
                .collect(),
        }
    }
}

/// Classification of one finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingClassification {
    pub cve_id: String,
    pub severity: Severity,
    pub action: FindingAction,
    /// Whether the finding was absent from every earlier snapshot.
    pub is_new: bool,
    /// When the finding first appeared in history, `None` for new findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    /// Whole days since the finding first appeared in history, `None` for
    /// new findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_first_seen: Option<i64>,
    pub reason: String,
}

/// Aggregate outcome of a conditional evaluation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalPolicyResult {
    pub environment: Environment,
    pub allowed: bool,
    pub blocked: usize,
    pub warned: usize,
    pub informational: usize,
    pub allowed_count: usize,
    pub classifications: Vec<FindingClassification>,
}

/// Evaluate findings against the environment decision table.
///
/// `history` holds earlier scans of the same artifact; order does not matter,
/// the earliest sighting of each CVE wins. `now` anchors the
/// days-since-first-seen arithmetic.
#[must_use]
pub fn evaluate_conditional(
    findings: &[NormalizedVulnerability],
    environment: Environment,
    history: &[ScanSnapshot],
    now: DateTime<Utc>,
) -> ConditionalPolicyResult {
    let first_seen = first_seen_index(history);

    let classifications: Vec<FindingClassification> = findings
        .iter()
        .map(|finding| classify(finding, environment, &first_seen, now))
        .collect();

    let blocked = count(&classifications, FindingAction::Block);
    let warned = count(&classifications, FindingAction::Warn);
    let informational = count(&classifications, FindingAction::Info);
    let allowed_count = count(&classifications, FindingAction::Allow);

    ConditionalPolicyResult {
        environment,
        allowed: blocked == 0,
        blocked,
        warned,
        informational,
        allowed_count,
        classifications,
    }
}

/// Earliest sighting per CVE across all snapshots.
fn first_seen_index(history: &[ScanSnapshot]) -> HashMap<&str, DateTime<Utc>> {
    let mut index: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for snapshot in history {
        for cve in &snapshot.cve_ids {
            index
                .entry(cve.as_str())
                .and_modify(|seen| {
                    if snapshot.scanned_at < *seen {
                        *seen = snapshot.scanned_at;
                    }
                })
                .or_insert(snapshot.scanned_at);
        }
    }
    index
}

fn classify(
    finding: &NormalizedVulnerability,
    environment: Environment,
    first_seen: &HashMap<&str, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> FindingClassification {
    let seen_at = first_seen.get(finding.cve_id.as_str()).copied();
    let is_new = seen_at.is_none();
    let days = seen_at.map(|seen| (now - seen).num_days());
    let severity = finding.severity;

    let (action, reason) = decide(environment, severity, is_new, days);

    FindingClassification {
        cve_id: finding.cve_id.clone(),
        severity,
        action,
        is_new,
        first_seen: seen_at,
        days_since_first_seen: days,
        reason,
    }
}

fn decide(
    environment: Environment,
    severity: Severity,
    is_new: bool,
    days: Option<i64>,
) -> (FindingAction, String) {
    use FindingAction::{Allow, Block, Info, Warn};
    use Severity::{Critical, High};

    let age = days.unwrap_or(0);
    match environment {
        Environment::Production => match (severity, is_new) {
            (Critical | High, true) => (
                Block,
                format!("new {severity} finding blocks production deploys"),
            ),
            (Critical, false) => (
                Warn,
                format!("known critical finding, first seen {age} days ago"),
            ),
            _ => (Allow, format!("{severity} finding allowed in production")),
        },
        Environment::Staging => match (severity, is_new) {
            (Critical, true) => (Block, "new critical finding blocks staging deploys".to_string()),
            (Critical, false) => (
                Warn,
                format!("known critical finding, first seen {age} days ago"),
            ),
            (High, _) => (Warn, "high severity finding in staging".to_string()),
            _ => (Allow, format!("{severity} finding allowed in staging")),
        },
        Environment::Development => match severity {
            Critical | High => (
                Warn,
                format!("{severity} finding noted; development never blocks"),
            ),
            _ => (Info, format!("{severity} finding recorded for development")),
        },
        Environment::All => match (severity, is_new) {
            (Critical, true) => (Block, "new critical finding".to_string()),
            (High, true) => (Warn, "new high severity finding".to_string()),
            (Critical | High, false) => (
                Warn,
                format!("known {severity} finding, first seen {age} days ago"),
            ),
            _ => (Allow, format!("{severity} finding allowed")),
        },
    }
}

fn count(classifications: &[FindingClassification], action: FindingAction) -> usize {
    classifications.iter().filter(|c| c.action == action).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ecosystem, FindingId, FindingMetadata, PackageInfo};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2024-06-01T00:00:00Z".parse().unwrap()
    }

    fn finding(cve: &str, severity: Severity) -> NormalizedVulnerability {
        NormalizedVulnerability {
            id: FindingId::new(cve, "pkg", "1.0.0"),
            cve_id: cve.to_string(),
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
                fixed_version: None,
                ecosystem: Ecosystem::Npm,
                path: None,
            },
            layer: None,
            published_at: None,
            last_modified_at: None,
            metadata: FindingMetadata::default(),
        }
    }

    fn snapshot(days_ago: i64, cves: &[&str]) -> ScanSnapshot {
        ScanSnapshot {
            scanned_at: now() - Duration::days(days_ago),
            cve_ids: cves.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_production_blocks_new_critical_and_high() {
        let findings = vec![
            finding("CVE-1", Severity::Critical),
            finding("CVE-2", Severity::High),
            finding("CVE-3", Severity::Medium),
        ];
        let result = evaluate_conditional(&findings, Environment::Production, &[], now());

        assert!(!result.allowed);
        assert_eq!(result.blocked, 2);
        assert_eq!(result.allowed_count, 1);
        assert!(result.classifications[0].is_new);
    }

    #[test]
    fn test_production_warns_on_existing_critical() {
        let findings = vec![finding("CVE-1", Severity::Critical)];
        let history = vec![snapshot(30, &["CVE-1"])];
        let result = evaluate_conditional(&findings, Environment::Production, &history, now());

        assert!(result.allowed);
        assert_eq!(result.warned, 1);
        let class = &result.classifications[0];
        assert!(!class.is_new);
        assert_eq!(class.first_seen, Some(now() - Duration::days(30)));
        assert_eq!(class.days_since_first_seen, Some(30));
        assert!(class.reason.contains("30 days"));
    }

    #[test]
    fn test_production_allows_existing_high() {
        let findings = vec![finding("CVE-1", Severity::High)];
        let history = vec![snapshot(7, &["CVE-1"])];
        let result = evaluate_conditional(&findings, Environment::Production, &history, now());
        assert_eq!(result.classifications[0].action, FindingAction::Allow);
    }

    #[test]
    fn test_staging_table() {
        let findings = vec![
            finding("CVE-NEW-CRIT", Severity::Critical),
            finding("CVE-OLD-CRIT", Severity::Critical),
            finding("CVE-HIGH", Severity::High),
            finding("CVE-LOW", Severity::Low),
        ];
        let history = vec![snapshot(10, &["CVE-OLD-CRIT"])];
        let result = evaluate_conditional(&findings, Environment::Staging, &history, now());

        assert!(!result.allowed);
        assert_eq!(result.blocked, 1);
        assert_eq!(result.warned, 2);
        assert_eq!(result.allowed_count, 1);
    }

    #[test]
    fn test_development_never_blocks() {
        let findings = vec![
            finding("CVE-1", Severity::Critical),
            finding("CVE-2", Severity::High),
            finding("CVE-3", Severity::Medium),
            finding("CVE-4", Severity::Low),
        ];
        let result = evaluate_conditional(&findings, Environment::Development, &[], now());

        assert!(result.allowed);
        assert_eq!(result.blocked, 0);
        assert_eq!(result.warned, 2);
        assert_eq!(result.informational, 2);
    }

    #[test]
    fn test_all_environment_table() {
        let findings = vec![
            finding("CVE-NEW-CRIT", Severity::Critical),
            finding("CVE-NEW-HIGH", Severity::High),
            finding("CVE-OLD-HIGH", Severity::High),
            finding("CVE-MED", Severity::Medium),
        ];
        let history = vec![snapshot(5, &["CVE-OLD-HIGH"])];
        let result = evaluate_conditional(&findings, Environment::All, &history, now());

        assert_eq!(result.blocked, 1);
        assert_eq!(result.warned, 2);
        assert_eq!(result.allowed_count, 1);
    }

    #[test]
    fn test_first_seen_takes_earliest_snapshot() {
        let history = vec![snapshot(3, &["CVE-1"]), snapshot(45, &["CVE-1"])];
        let findings = vec![finding("CVE-1", Severity::Critical)];
        let result = evaluate_conditional(&findings, Environment::Production, &history, now());
        assert_eq!(result.classifications[0].days_since_first_seen, Some(45));
    }

    #[test]
    fn test_days_floor_on_partial_day() {
        let history = vec![ScanSnapshot {
            scanned_at: now() - Duration::hours(36),
            cve_ids: vec!["CVE-1".to_string()],
        }];
        let findings = vec![finding("CVE-1", Severity::Critical)];
        let result = evaluate_conditional(&findings, Environment::Production, &history, now());
        assert_eq!(result.classifications[0].days_since_first_seen, Some(1));
    }
}
