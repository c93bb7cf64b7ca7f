use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::eligibility::domain::{
    CitizenSnapshot, LineageKey, Rule, RuleCondition, RuleDraft, RuleId, RuleOperator, RuleType,
    SchemeId,
};
use crate::eligibility::evaluation::RuleConfigurationIssue;
use crate::eligibility::repository::{
    InMemoryRuleRepository, IssueReportError, IssueReporter, RepositoryError, RuleRepository,
};
use crate::eligibility::{eligibility_router, EligibilityService};

pub(super) const SCHEME: &str = "old-age-pension";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn scheme() -> SchemeId {
    SchemeId(SCHEME.to_string())
}

pub(super) fn draft(
    name: &str,
    rule_type: RuleType,
    operator: RuleOperator,
    value: &str,
    mandatory: bool,
) -> RuleDraft {
    RuleDraft {
        scheme_id: scheme(),
        name: name.to_string(),
        condition: RuleCondition::new(rule_type, operator, value),
        expression: None,
        mandatory,
        priority: 0,
        effective_from: Some(date(2024, 1, 1)),
        effective_to: None,
    }
}

pub(super) fn age_draft() -> RuleDraft {
    draft("Senior citizen", RuleType::Age, RuleOperator::Gte, "60", true)
}

/// Rule record built directly, bypassing the store's validation.
pub(super) fn rule(
    id: &str,
    name: &str,
    rule_type: RuleType,
    operator: RuleOperator,
    value: &str,
    mandatory: bool,
    priority: i32,
) -> Rule {
    Rule {
        id: RuleId(id.to_string()),
        scheme_id: scheme(),
        name: name.to_string(),
        condition: RuleCondition::new(rule_type, operator, value),
        expression: None,
        mandatory,
        priority,
        version: 1,
        effective_from: date(2024, 1, 1),
        effective_to: None,
    }
}

pub(super) fn senior_snapshot(age: u32) -> CitizenSnapshot {
    CitizenSnapshot {
        age: Some(age),
        district: Some("jaipur".to_string()),
        annual_income: Some(90_000.0),
        ..CitizenSnapshot::default()
    }
}

pub(super) fn build_service() -> (
    EligibilityService<InMemoryRuleRepository, MemoryIssues>,
    Arc<InMemoryRuleRepository>,
    Arc<MemoryIssues>,
) {
    let repository = Arc::new(InMemoryRuleRepository::default());
    let issues = Arc::new(MemoryIssues::default());
    let service = EligibilityService::new(repository.clone(), issues.clone(), 16);
    (service, repository, issues)
}

pub(super) fn router_with_service(
    service: EligibilityService<InMemoryRuleRepository, MemoryIssues>,
) -> axum::Router {
    eligibility_router(Arc::new(service))
}

#[derive(Default, Clone)]
pub(super) struct MemoryIssues {
    events: Arc<Mutex<Vec<RuleConfigurationIssue>>>,
}

impl MemoryIssues {
    pub(super) fn events(&self) -> Vec<RuleConfigurationIssue> {
        self.events.lock().expect("issue mutex poisoned").clone()
    }
}

impl IssueReporter for MemoryIssues {
    fn report(&self, issue: RuleConfigurationIssue) -> Result<(), IssueReportError> {
        self.events.lock().expect("issue mutex poisoned").push(issue);
        Ok(())
    }
}

pub(super) struct OfflineIssues;

impl IssueReporter for OfflineIssues {
    fn report(&self, _issue: RuleConfigurationIssue) -> Result<(), IssueReportError> {
        Err(IssueReportError::Transport("pager offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl RuleRepository for UnavailableRepository {
    fn insert(&self, _rule: Rule) -> Result<Rule, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RuleId) -> Result<Option<Rule>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn lineage(&self, _key: &LineageKey) -> Result<Vec<Rule>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn scheme_rules(&self, _scheme_id: &SchemeId) -> Result<Vec<Rule>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn append_version(
        &self,
        _prior: &RuleId,
        _expected_to: Option<NaiveDate>,
        _closed_to: Option<NaiveDate>,
        _next: Rule,
    ) -> Result<Rule, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn close_window(
        &self,
        _id: &RuleId,
        _expected_to: Option<NaiveDate>,
        _closed_to: Option<NaiveDate>,
    ) -> Result<Rule, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
