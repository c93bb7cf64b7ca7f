mod outcomes;
mod policy;

pub use policy::confidence_score;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{CitizenSnapshot, Rule, RuleId, SchemeId};
use outcomes::tally_rules;
use policy::decide;

/// Stateless evaluator combining per-rule outcomes into one verdict per scheme.
///
/// Evaluation is a pure function of `(rules, snapshot, as_of)` and is safe to share
/// across threads without locking.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityEngine;

impl EligibilityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates the rules of `scheme_id` that are active on `as_of`. Rules of other
    /// schemes are ignored; inactive rules only count as skipped.
    pub fn evaluate(
        &self,
        scheme_id: &SchemeId,
        rules: &[Rule],
        snapshot: &CitizenSnapshot,
        as_of: NaiveDate,
    ) -> EligibilityReport {
        let tally = tally_rules(scheme_id, rules, snapshot, as_of);
        decide(scheme_id, as_of, tally)
    }
}

/// Citizen-facing verdict for one scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResult {
    pub scheme_id: SchemeId,
    pub eligible: bool,
    pub confidence: u8,
    pub satisfied_reasons: Vec<String>,
    pub missing_criteria: Vec<String>,
    pub unverified_criteria: Vec<String>,
    pub evaluated_rule_count: usize,
    pub skipped_rule_count: usize,
    pub evaluated_on: NaiveDate,
}

impl EligibilityResult {
    /// No rule could be checked, so the verdict carries no information.
    pub fn is_undetermined(&self) -> bool {
        self.evaluated_rule_count == 0
    }
}

/// Rule that could not be evaluated because its own configuration is broken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfigurationIssue {
    pub rule_id: RuleId,
    pub scheme_id: SchemeId,
    pub rule_name: String,
    pub version: u32,
    pub message: String,
}

/// Evaluation output for internal callers: the verdict plus administrator-only issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityReport {
    pub result: EligibilityResult,
    pub configuration_issues: Vec<RuleConfigurationIssue>,
}
