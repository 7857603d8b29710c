//! Policy evaluation over canonical findings.
//!
//! Two evaluation styles:
//! - [`evaluate_policies`]: explicit rule sets (severity thresholds, CVSS
//!   thresholds, CVE blocklists) with exception handling, the gate most
//!   callers want.
//! - [`evaluate_conditional`]: an environment-aware decision table keyed on
//!   severity and finding novelty, for callers with scan history.
//!
//! Both are pure: the reference time is a parameter, never the wall clock.

mod conditional;
mod evaluator;
mod rules;

pub use conditional::{
    evaluate_conditional, ConditionalPolicyResult, Environment, FindingAction,
    FindingClassification, ScanSnapshot,
};
pub use evaluator::{
    evaluate_policies, evaluate_rules, AppliedException, BlockedBy, PolicyEvaluation,
    RuleMatchRecord,
};
pub use rules::{
    ExceptionStatus, ExceptionType, OneOrMany, Policy, PolicyException, PolicyRule, RuleAction,
    RuleCondition,
};
