use chrono::NaiveDate;

use super::super::domain::SchemeId;
use super::outcomes::RuleTally;
use super::{EligibilityReport, EligibilityResult};

/// Share of checkable rules that were satisfied, as a rounded percentage.
///
/// Indeterminate rules stay in the denominator so verdicts built on sparse citizen data
/// score low. An empty denominator scores zero.
pub fn confidence_score(satisfied: usize, indeterminate: usize, failed: usize) -> u8 {
    let denominator = satisfied + indeterminate + failed;
    if denominator == 0 {
        return 0;
    }
    let rounded = (100 * satisfied + denominator / 2) / denominator;
    rounded.min(100) as u8
}

pub(crate) fn decide(scheme_id: &SchemeId, as_of: NaiveDate, tally: RuleTally) -> EligibilityReport {
    let satisfied = tally.satisfied_reasons.len();
    let failed = tally.failed();
    let confidence = confidence_score(satisfied, tally.indeterminate, failed);

    let result = EligibilityResult {
        scheme_id: scheme_id.clone(),
        eligible: tally.mandatory_failures.is_empty(),
        confidence,
        evaluated_rule_count: satisfied + failed,
        skipped_rule_count: tally.inactive + tally.indeterminate + tally.issues.len(),
        satisfied_reasons: tally.satisfied_reasons,
        missing_criteria: tally.mandatory_failures,
        unverified_criteria: tally.mandatory_unverified,
        evaluated_on: as_of,
    };

    EligibilityReport {
        result,
        configuration_issues: tally.issues,
    }
}
