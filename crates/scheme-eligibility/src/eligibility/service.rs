use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cache::ActiveRuleCache;
use super::domain::{
    CitizenSnapshot, LineageKey, Rule, RuleCondition, RuleDraft, RuleId, SchemeId,
};
use super::evaluation::{EligibilityEngine, EligibilityReport, EligibilityResult};
use super::expression::{coerce_operand, evaluate_condition, RuleConfigurationError, RuleOutcome};
use super::repository::{IssueReporter, RuleRepository};
use super::store::{RuleStore, RuleStoreError};

/// Service composing the rule store, active-rule cache, evaluator and issue reporter.
pub struct EligibilityService<R, I> {
    store: Arc<RuleStore<R>>,
    cache: Arc<ActiveRuleCache>,
    engine: EligibilityEngine,
    issues: Arc<I>,
}

/// Dry-run request: a structured condition and a throwaway snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTestRequest {
    pub rule: RuleCondition,
    #[serde(alias = "snapshot")]
    pub test_snapshot: CitizenSnapshot,
}

/// Dry-run result. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTestResponse {
    pub outcome: RuleOutcome,
    pub reason: String,
    pub expression: String,
}

/// Error raised by the eligibility service.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityServiceError {
    #[error(transparent)]
    Store(#[from] RuleStoreError),
    #[error("rule configuration error: {0}")]
    Configuration(#[from] RuleConfigurationError),
}

impl<R, I> EligibilityService<R, I>
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    pub fn new(repository: Arc<R>, issues: Arc<I>, cache_capacity: usize) -> Self {
        Self {
            store: Arc::new(RuleStore::new(repository)),
            cache: Arc::new(ActiveRuleCache::new(cache_capacity)),
            engine: EligibilityEngine::new(),
            issues,
        }
    }

    pub fn cache(&self) -> &ActiveRuleCache {
        &self.cache
    }

    pub fn create_rule(&self, draft: RuleDraft) -> Result<Rule, EligibilityServiceError> {
        let rule = self.store.create_rule(draft)?;
        self.cache.invalidate_scheme(&rule.scheme_id);
        Ok(rule)
    }

    pub fn revise_rule(
        &self,
        existing_id: &RuleId,
        draft: RuleDraft,
    ) -> Result<Rule, EligibilityServiceError> {
        let rule = self.store.revise_rule(existing_id, draft)?;
        self.cache.invalidate_scheme(&rule.scheme_id);
        Ok(rule)
    }

    pub fn delete_rule(
        &self,
        id: &RuleId,
        as_of: NaiveDate,
    ) -> Result<Rule, EligibilityServiceError> {
        let rule = self.store.delete_rule(id, as_of)?;
        self.cache.invalidate_scheme(&rule.scheme_id);
        Ok(rule)
    }

    pub fn get_rule(&self, id: &RuleId) -> Result<Rule, EligibilityServiceError> {
        Ok(self.store.get_rule(id)?)
    }

    pub fn rule_history(&self, id: &RuleId) -> Result<Vec<Rule>, EligibilityServiceError> {
        Ok(self.store.rule_history(id)?)
    }

    /// Newest version of a lineage, whether or not it is active today.
    pub fn latest_version(
        &self,
        key: &LineageKey,
    ) -> Result<Option<Rule>, EligibilityServiceError> {
        Ok(self.store.latest_version(key)?)
    }

    pub fn list_active_rules(
        &self,
        scheme_id: &SchemeId,
        as_of: NaiveDate,
    ) -> Result<Vec<Rule>, EligibilityServiceError> {
        let rules = self.active_rules(scheme_id, as_of)?;
        Ok(rules.as_ref().clone())
    }

    fn active_rules(
        &self,
        scheme_id: &SchemeId,
        as_of: NaiveDate,
    ) -> Result<Arc<Vec<Rule>>, EligibilityServiceError> {
        let rules = self.cache.get_or_load(scheme_id, as_of, || {
            self.store.list_active_rules(scheme_id, as_of)
        })?;
        Ok(rules)
    }

    /// Evaluates one condition against a test snapshot without touching the store.
    pub fn test_rule(
        &self,
        request: RuleTestRequest,
    ) -> Result<RuleTestResponse, EligibilityServiceError> {
        let RuleTestRequest {
            rule,
            test_snapshot,
        } = request;

        coerce_operand(&rule)?;
        let verdict = evaluate_condition(&rule, &test_snapshot)?;
        Ok(RuleTestResponse {
            outcome: verdict.outcome,
            reason: verdict.reason,
            expression: rule.describe(),
        })
    }

    /// Full evaluation output including administrator-only configuration issues, which
    /// are also forwarded to the issue reporter.
    pub fn evaluate(
        &self,
        scheme_id: &SchemeId,
        snapshot: &CitizenSnapshot,
        as_of: NaiveDate,
    ) -> Result<EligibilityReport, EligibilityServiceError> {
        let rules = self.active_rules(scheme_id, as_of)?;
        let report = self.engine.evaluate(scheme_id, &rules, snapshot, as_of);

        for issue in &report.configuration_issues {
            if let Err(error) = self.issues.report(issue.clone()) {
                warn!(
                    rule_id = %issue.rule_id,
                    error = %error,
                    "failed to report rule configuration issue"
                );
            }
        }

        debug!(
            scheme_id = %scheme_id,
            eligible = report.result.eligible,
            confidence = report.result.confidence,
            evaluated = report.result.evaluated_rule_count,
            skipped = report.result.skipped_rule_count,
            "eligibility evaluated"
        );
        Ok(report)
    }

    /// Citizen-facing eligibility check.
    pub fn check_eligibility(
        &self,
        scheme_id: &SchemeId,
        snapshot: &CitizenSnapshot,
        as_of: NaiveDate,
    ) -> Result<EligibilityResult, EligibilityServiceError> {
        Ok(self.evaluate(scheme_id, snapshot, as_of)?.result)
    }
}
