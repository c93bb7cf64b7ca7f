//! Scheme eligibility rules: versioned storage, single-condition evaluation and the
//! per-scheme evaluator that turns rule outcomes into a verdict.

pub mod cache;
pub mod domain;
pub mod evaluation;
pub mod expression;
pub mod import;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub(crate) mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    AttributeValue, CitizenSnapshot, Gender, LineageKey, OperandKind, Rule, RuleCondition,
    RuleDraft, RuleId, RuleOperator, RuleType, SchemeId,
};
pub use evaluation::{
    confidence_score, EligibilityEngine, EligibilityReport, EligibilityResult,
    RuleConfigurationIssue,
};
pub use expression::{
    ensure_supported, evaluate_condition, requirement, RuleConfigurationError, RuleOutcome,
    RuleVerdict,
};
pub use import::{apply_drafts, parse_date, ImportSummary, RuleCsvImporter, RuleImportError};
pub use repository::{
    InMemoryRuleRepository, IssueReportError, IssueReporter, RepositoryError, RuleRepository,
};
pub use router::eligibility_router;
pub use service::{EligibilityService, EligibilityServiceError, RuleTestRequest, RuleTestResponse};
pub use store::{RuleStore, RuleStoreError};
pub use validation::RuleValidationError;
