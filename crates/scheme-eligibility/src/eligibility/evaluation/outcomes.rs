use chrono::NaiveDate;
use tracing::warn;

use super::super::domain::{CitizenSnapshot, Rule, SchemeId};
use super::super::expression::{evaluate_condition, requirement, RuleOutcome};
use super::super::store::priority_order;
use super::RuleConfigurationIssue;

/// Per-rule outcomes partitioned for the decision policy, each list in priority order.
#[derive(Debug, Default)]
pub(crate) struct RuleTally {
    pub satisfied_reasons: Vec<String>,
    pub mandatory_failures: Vec<String>,
    pub optional_failures: usize,
    pub mandatory_unverified: Vec<String>,
    pub indeterminate: usize,
    pub inactive: usize,
    pub issues: Vec<RuleConfigurationIssue>,
}

impl RuleTally {
    pub fn failed(&self) -> usize {
        self.mandatory_failures.len() + self.optional_failures
    }
}

pub(crate) fn tally_rules(
    scheme_id: &SchemeId,
    rules: &[Rule],
    snapshot: &CitizenSnapshot,
    as_of: NaiveDate,
) -> RuleTally {
    let mut tally = RuleTally::default();

    let mut active: Vec<&Rule> = Vec::with_capacity(rules.len());
    for rule in rules.iter().filter(|rule| &rule.scheme_id == scheme_id) {
        if rule.is_active_on(as_of) {
            active.push(rule);
        } else {
            tally.inactive += 1;
        }
    }
    active.sort_by(|a, b| priority_order(a, b));

    for rule in active {
        match evaluate_condition(&rule.condition, snapshot) {
            Ok(verdict) => match verdict.outcome {
                RuleOutcome::Satisfied => tally.satisfied_reasons.push(verdict.reason),
                RuleOutcome::NotSatisfied if rule.mandatory => {
                    tally.mandatory_failures.push(verdict.reason)
                }
                RuleOutcome::NotSatisfied => tally.optional_failures += 1,
                RuleOutcome::Indeterminate => {
                    tally.indeterminate += 1;
                    if rule.mandatory {
                        tally
                            .mandatory_unverified
                            .push(format!("cannot verify {}", requirement(&rule.condition)));
                    }
                }
            },
            Err(error) => {
                warn!(
                    rule_id = %rule.id,
                    scheme_id = %rule.scheme_id,
                    error = %error,
                    "skipping misconfigured eligibility rule"
                );
                tally.issues.push(RuleConfigurationIssue {
                    rule_id: rule.id.clone(),
                    scheme_id: rule.scheme_id.clone(),
                    rule_name: rule.name.clone(),
                    version: rule.version,
                    message: error.to_string(),
                });
            }
        }
    }

    tally
}
