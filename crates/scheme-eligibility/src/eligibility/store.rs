use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::info;

use super::domain::{LineageKey, Rule, RuleDraft, RuleId, SchemeId};
use super::repository::{RepositoryError, RuleRepository};
use super::validation::{validate_draft, RuleValidationError, ValidatedDraft};

static RULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_rule_id() -> RuleId {
    let id = RULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RuleId(format!("rule-{id:06}"))
}

/// Priority descending, then name ascending, then newest version first.
pub(crate) fn priority_order(a: &Rule, b: &Rule) -> CmpOrdering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| b.version.cmp(&a.version))
}

/// Versioned rule lineages with validity-window invariants.
///
/// Writes to one `(scheme, name)` lineage are serialized by a per-lineage lock. Writers
/// racing through another store instance are rejected by the repository: `insert` refuses
/// an existing lineage and the window updates are compare-and-swap.
pub struct RuleStore<R> {
    repository: Arc<R>,
    lineage_locks: Mutex<HashMap<LineageKey, Arc<Mutex<()>>>>,
}

/// Error raised by rule store operations.
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error(transparent)]
    Validation(#[from] RuleValidationError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rule {0} not found")]
    NotFound(RuleId),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for RuleStoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(detail) => Self::Conflict(detail),
            other => Self::Repository(other),
        }
    }
}

impl<R> RuleStore<R>
where
    R: RuleRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            lineage_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    fn lineage_lock(&self, key: &LineageKey) -> Result<Arc<Mutex<()>>, RuleStoreError> {
        let mut locks = self.lineage_locks.lock().map_err(|_| lock_poisoned())?;
        Ok(locks.entry(key.clone()).or_default().clone())
    }

    /// Creates the first version of a new lineage.
    pub fn create_rule(&self, draft: RuleDraft) -> Result<Rule, RuleStoreError> {
        let draft = validate_draft(draft)?;
        let key = LineageKey {
            scheme_id: draft.scheme_id.clone(),
            name: draft.name.clone(),
        };

        let lock = self.lineage_lock(&key)?;
        let _serialized = lock.lock().map_err(|_| lock_poisoned())?;

        if let Some(existing) = self.repository.lineage(&key)?.last() {
            return Err(RuleStoreError::Conflict(format!(
                "rule '{}' already exists for scheme {} at version {} ({}); revise it instead",
                key.name, key.scheme_id, existing.version, existing.id
            )));
        }

        let rule = mint_rule(next_rule_id(), 1, draft);
        let stored = self.repository.insert(rule)?;
        info!(
            rule_id = %stored.id,
            scheme_id = %stored.scheme_id,
            version = stored.version,
            "eligibility rule created"
        );
        Ok(stored)
    }

    /// Appends version `n + 1` to the lineage of `existing_id`, closing version `n` on the
    /// day before the new version takes effect.
    pub fn revise_rule(
        &self,
        existing_id: &RuleId,
        draft: RuleDraft,
    ) -> Result<Rule, RuleStoreError> {
        let draft = validate_draft(draft)?;
        let existing = self
            .repository
            .fetch(existing_id)?
            .ok_or_else(|| RuleStoreError::NotFound(existing_id.clone()))?;

        if draft.scheme_id != existing.scheme_id || draft.name != existing.name {
            return Err(RuleValidationError::LineageMismatch {
                scheme_id: existing.scheme_id.clone(),
                name: existing.name.clone(),
            }
            .into());
        }

        let key = existing.lineage();
        let lock = self.lineage_lock(&key)?;
        let _serialized = lock.lock().map_err(|_| lock_poisoned())?;

        let latest = self
            .repository
            .lineage(&key)?
            .pop()
            .ok_or_else(|| RuleStoreError::NotFound(existing_id.clone()))?;
        if &latest.id != existing_id {
            return Err(RuleStoreError::Conflict(format!(
                "rule {} is version {} but the latest version is {} ({})",
                existing_id, existing.version, latest.version, latest.id
            )));
        }
        if draft.effective_from <= latest.effective_from {
            return Err(RuleStoreError::Conflict(format!(
                "effectiveFrom {} must be after the current version's effectiveFrom {}",
                draft.effective_from, latest.effective_from
            )));
        }

        let last_day = day_before(draft.effective_from)?;
        let closed_to = match latest.effective_to {
            Some(to) if to < last_day => Some(to),
            _ => Some(last_day),
        };

        let next = mint_rule(next_rule_id(), latest.version + 1, draft);
        let stored = self.repository.append_version(
            &latest.id,
            latest.effective_to,
            closed_to,
            next,
        )?;
        info!(
            rule_id = %stored.id,
            prior_rule_id = %latest.id,
            scheme_id = %stored.scheme_id,
            version = stored.version,
            "eligibility rule revised"
        );
        Ok(stored)
    }

    /// Retires a rule version so it is inactive from `as_of` onwards. Records are never
    /// removed; retiring an already retired rule leaves it untouched.
    pub fn delete_rule(&self, id: &RuleId, as_of: NaiveDate) -> Result<Rule, RuleStoreError> {
        let existing = self
            .repository
            .fetch(id)?
            .ok_or_else(|| RuleStoreError::NotFound(id.clone()))?;

        let lock = self.lineage_lock(&existing.lineage())?;
        let _serialized = lock.lock().map_err(|_| lock_poisoned())?;

        let current = self
            .repository
            .fetch(id)?
            .ok_or_else(|| RuleStoreError::NotFound(id.clone()))?;
        let closed_to = day_before(as_of)?;
        if current.effective_to.is_some_and(|to| to <= closed_to) {
            return Ok(current);
        }

        let retired = self
            .repository
            .close_window(id, current.effective_to, Some(closed_to))?;
        info!(
            rule_id = %retired.id,
            scheme_id = %retired.scheme_id,
            effective_to = %closed_to,
            "eligibility rule retired"
        );
        Ok(retired)
    }

    pub fn get_rule(&self, id: &RuleId) -> Result<Rule, RuleStoreError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| RuleStoreError::NotFound(id.clone()))
    }

    /// Every version of the rule's lineage, oldest first.
    pub fn rule_history(&self, id: &RuleId) -> Result<Vec<Rule>, RuleStoreError> {
        let rule = self.get_rule(id)?;
        Ok(self.repository.lineage(&rule.lineage())?)
    }

    pub fn latest_version(&self, key: &LineageKey) -> Result<Option<Rule>, RuleStoreError> {
        Ok(self.repository.lineage(key)?.pop())
    }

    /// Rules of `scheme_id` active on `as_of`, by priority descending then name.
    pub fn list_active_rules(
        &self,
        scheme_id: &SchemeId,
        as_of: NaiveDate,
    ) -> Result<Vec<Rule>, RuleStoreError> {
        let mut rules: Vec<Rule> = self
            .repository
            .scheme_rules(scheme_id)?
            .into_iter()
            .filter(|rule| rule.is_active_on(as_of))
            .collect();
        rules.sort_by(priority_order);
        Ok(rules)
    }
}

fn mint_rule(id: RuleId, version: u32, draft: ValidatedDraft) -> Rule {
    Rule {
        id,
        scheme_id: draft.scheme_id,
        name: draft.name,
        condition: draft.condition,
        expression: Some(draft.expression),
        mandatory: draft.mandatory,
        priority: draft.priority,
        version,
        effective_from: draft.effective_from,
        effective_to: draft.effective_to,
    }
}

fn day_before(date: NaiveDate) -> Result<NaiveDate, RuleStoreError> {
    date.pred_opt()
        .ok_or_else(|| RuleStoreError::Conflict(format!("cannot close a window before {date}")))
}

fn lock_poisoned() -> RuleStoreError {
    RuleStoreError::Repository(RepositoryError::Unavailable(
        "lineage lock poisoned".to_string(),
    ))
}
