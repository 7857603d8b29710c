//! Layered policy-rule evaluation over canonical findings.
//!
//! Exceptions are applied once, globally, before any rule runs. Policies are
//! then walked in caller order, each policy's rules in descending priority;
//! the first blocking rule wins the `blocked_by` slot. That first-wins
//! tie-break (not most-severe-wins) mirrors long-standing audit semantics
//! and is covered by tests - do not change it casually.

use super::rules::{Policy, PolicyException, PolicyRule, RuleAction};
use crate::model::{NormalizedVulnerability, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One violation or warning entry: a rule plus the findings that matched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatchRecord {
    pub rule_id: String,
    pub rule_name: String,
    pub action: RuleAction,
    /// Highest severity among the matched findings.
    pub severity: Severity,
    /// Number of findings that matched.
    pub count: usize,
    /// Distinct CVE ids among the matched findings, first-seen order.
    pub cve_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The first rule across all policies that blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedBy {
    pub policy_id: String,
    pub policy_name: String,
    pub rule_id: String,
    pub rule_name: String,
}

/// Record of an exception that suppressed at least one finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedException {
    pub exception_id: String,
    pub cve_id: String,
}

/// Outcome of one policy evaluation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<BlockedBy>,
    pub violations: Vec<RuleMatchRecord>,
    pub warnings: Vec<RuleMatchRecord>,
    /// Exceptions that suppressed findings, accumulated per policy
    /// (the same exception appears once per evaluated policy).
    pub applied_exceptions: Vec<AppliedException>,
}

/// Evaluate a layered set of policies against canonical findings.
///
/// `now` is the reference time for exception expiry; production callers pass
/// `Utc::now()`, tests pin it.
#[must_use]
pub fn evaluate_policies(
    findings: &[NormalizedVulnerability],
    policies: &[Policy],
    exceptions: &[PolicyException],
    now: DateTime<Utc>,
) -> PolicyEvaluation {
    // Step 1: exception filtering, applied once before any rule runs.
    let active: Vec<&PolicyException> =
        exceptions.iter().filter(|e| e.is_active(now)).collect();

    let remaining: Vec<&NormalizedVulnerability> = findings
        .iter()
        .filter(|f| !active.iter().any(|e| e.covers(f)))
        .collect();

    let applied: Vec<AppliedException> = active
        .iter()
        .filter(|e| findings.iter().any(|f| e.covers(f)))
        .map(|e| AppliedException {
            exception_id: e.id.clone(),
            cve_id: e.target_value.clone(),
        })
        .collect();

    let mut evaluation = PolicyEvaluation {
        allowed: true,
        blocked_by: None,
        violations: Vec::new(),
        warnings: Vec::new(),
        applied_exceptions: Vec::new(),
    };

    for policy in policies {
        // Each policy re-records the globally applied exceptions; consumers
        // rely on seeing them per policy even though that duplicates entries.
        evaluation.applied_exceptions.extend(applied.iter().cloned());

        let mut rules: Vec<&PolicyRule> = policy.rules.iter().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        for rule in rules {
            let Some(condition) = &rule.condition else {
                tracing::debug!(rule_id = %rule.id, "rule has no usable condition; skipped");
                continue;
            };

            let matched: Vec<&NormalizedVulnerability> = remaining
                .iter()
                .copied()
                .filter(|f| condition.matches(f))
                .collect();
            if matched.is_empty() {
                continue;
            }

            let record = build_record(rule, &matched);
            match rule.action {
                RuleAction::Block => {
                    if evaluation.allowed {
                        evaluation.allowed = false;
                        evaluation.blocked_by = Some(BlockedBy {
                            policy_id: policy.id.clone(),
                            policy_name: policy.name.clone(),
                            rule_id: rule.id.clone(),
                            rule_name: rule.name.clone(),
                        });
                    }
                    evaluation.violations.push(record);
                }
                RuleAction::Warn => evaluation.warnings.push(record),
            }
        }
    }

    evaluation
}

/// Evaluate a bare rule set (no policy grouping) against findings.
///
/// Convenience wrapper for callers holding rules outside any policy record;
/// semantics are identical to a single policy containing the rules.
#[must_use]
pub fn evaluate_rules(
    findings: &[NormalizedVulnerability],
    rules: &[PolicyRule],
    exceptions: &[PolicyException],
    now: DateTime<Utc>,
) -> PolicyEvaluation {
    let policy = Policy {
        id: "default".to_string(),
        name: "default".to_string(),
        rules: rules.to_vec(),
    };
    evaluate_policies(findings, std::slice::from_ref(&policy), exceptions, now)
}

fn build_record(rule: &PolicyRule, matched: &[&NormalizedVulnerability]) -> RuleMatchRecord {
    let severity = matched
        .iter()
        .map(|f| f.severity)
        .max_by_key(Severity::rank)
        .unwrap_or(Severity::Unknown);

    let mut cve_ids: Vec<String> = Vec::new();
    for finding in matched {
        if !cve_ids.contains(&finding.cve_id) {
            cve_ids.push(finding.cve_id.clone());
        }
    }

    RuleMatchRecord {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        action: rule.action,
        severity,
        count: matched.len(),
        cve_ids,
        message: rule.message.clone(),
    }
}
