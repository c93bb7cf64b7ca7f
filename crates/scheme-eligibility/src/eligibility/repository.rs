use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use super::domain::{LineageKey, Rule, RuleId, SchemeId};
use super::evaluation::RuleConfigurationIssue;

/// Persistence abstraction behind the rule store.
///
/// Implementations only need snapshot-consistent reads of whole records; lineage level
/// write ordering is enforced by the compare-and-swap contract of [`append_version`] and
/// [`close_window`].
///
/// [`append_version`]: RuleRepository::append_version
/// [`close_window`]: RuleRepository::close_window
pub trait RuleRepository: Send + Sync {
    /// Stores the first version of a lineage; fails with `Conflict` when any version of
    /// the rule's `(scheme, name)` lineage already exists.
    fn insert(&self, rule: Rule) -> Result<Rule, RepositoryError>;
    fn fetch(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError>;
    /// All versions of a lineage, ordered by version ascending.
    fn lineage(&self, key: &LineageKey) -> Result<Vec<Rule>, RepositoryError>;
    fn scheme_rules(&self, scheme_id: &SchemeId) -> Result<Vec<Rule>, RepositoryError>;
    /// Atomically closes `prior` to `closed_to` and stores `next`, provided `prior` is still
    /// the latest version and its `effective_to` still equals `expected_to`.
    fn append_version(
        &self,
        prior: &RuleId,
        expected_to: Option<NaiveDate>,
        closed_to: Option<NaiveDate>,
        next: Rule,
    ) -> Result<Rule, RepositoryError>;
    /// Compare-and-swap on a single version's `effective_to`.
    fn close_window(
        &self,
        id: &RuleId,
        expected_to: Option<NaiveDate>,
        closed_to: Option<NaiveDate>,
    ) -> Result<Rule, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook notifying administrators about rules that could not be evaluated.
pub trait IssueReporter: Send + Sync {
    fn report(&self, issue: RuleConfigurationIssue) -> Result<(), IssueReportError>;
}

/// Issue dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum IssueReportError {
    #[error("issue transport unavailable: {0}")]
    Transport(String),
}

/// Process-local repository used by the API service, the CLI and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRuleRepository {
    rules: Arc<RwLock<HashMap<RuleId, Rule>>>,
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("rule repository lock poisoned".to_string())
}

fn latest_in_lineage<'a>(
    rules: &'a HashMap<RuleId, Rule>,
    key: &LineageKey,
) -> Option<&'a Rule> {
    rules
        .values()
        .filter(|rule| rule.scheme_id == key.scheme_id && rule.name == key.name)
        .max_by_key(|rule| rule.version)
}

impl RuleRepository for InMemoryRuleRepository {
    fn insert(&self, rule: Rule) -> Result<Rule, RepositoryError> {
        let mut guard = self.rules.write().map_err(poisoned)?;
        if guard.contains_key(&rule.id) {
            return Err(RepositoryError::Conflict(format!(
                "rule {} already exists",
                rule.id
            )));
        }
        if let Some(existing) = latest_in_lineage(&guard, &rule.lineage()) {
            return Err(RepositoryError::Conflict(format!(
                "rule '{}' already exists for scheme {} as {}",
                rule.name, rule.scheme_id, existing.id
            )));
        }
        guard.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    fn fetch(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError> {
        let guard = self.rules.read().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    fn lineage(&self, key: &LineageKey) -> Result<Vec<Rule>, RepositoryError> {
        let guard = self.rules.read().map_err(poisoned)?;
        let mut versions: Vec<Rule> = guard
            .values()
            .filter(|rule| rule.scheme_id == key.scheme_id && rule.name == key.name)
            .cloned()
            .collect();
        versions.sort_by_key(|rule| rule.version);
        Ok(versions)
    }

    fn scheme_rules(&self, scheme_id: &SchemeId) -> Result<Vec<Rule>, RepositoryError> {
        let guard = self.rules.read().map_err(poisoned)?;
        let mut rules: Vec<Rule> = guard
            .values()
            .filter(|rule| &rule.scheme_id == scheme_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
        Ok(rules)
    }

    fn append_version(
        &self,
        prior: &RuleId,
        expected_to: Option<NaiveDate>,
        closed_to: Option<NaiveDate>,
        next: Rule,
    ) -> Result<Rule, RepositoryError> {
        let mut guard = self.rules.write().map_err(poisoned)?;
        let current = guard.get(prior).ok_or(RepositoryError::NotFound)?;

        if current.effective_to != expected_to {
            return Err(RepositoryError::Conflict(format!(
                "rule {prior} changed since it was read"
            )));
        }
        let latest_version = latest_in_lineage(&guard, &current.lineage())
            .map(|rule| rule.version)
            .unwrap_or(current.version);
        if latest_version != current.version || next.version != current.version + 1 {
            return Err(RepositoryError::Conflict(format!(
                "rule {prior} is no longer the latest version"
            )));
        }
        if guard.contains_key(&next.id) {
            return Err(RepositoryError::Conflict(format!(
                "rule {} already exists",
                next.id
            )));
        }

        if let Some(current) = guard.get_mut(prior) {
            current.effective_to = closed_to;
        }
        guard.insert(next.id.clone(), next.clone());
        Ok(next)
    }

    fn close_window(
        &self,
        id: &RuleId,
        expected_to: Option<NaiveDate>,
        closed_to: Option<NaiveDate>,
    ) -> Result<Rule, RepositoryError> {
        let mut guard = self.rules.write().map_err(poisoned)?;
        let current = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if current.effective_to != expected_to {
            return Err(RepositoryError::Conflict(format!(
                "rule {id} changed since it was read"
            )));
        }
        current.effective_to = closed_to;
        Ok(current.clone())
    }
}
