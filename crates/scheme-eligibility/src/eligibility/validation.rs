use chrono::NaiveDate;

use super::domain::{RuleCondition, RuleDraft, SchemeId};
use super::expression::{coerce_operand, RuleConfigurationError};

/// Reasons a rule draft is rejected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("schemeId must not be empty")]
    MissingScheme,
    #[error("rule name must not be empty")]
    MissingName,
    #[error("effectiveFrom is required")]
    MissingEffectiveFrom,
    #[error("effectiveTo {effective_to} precedes effectiveFrom {effective_from}")]
    InvertedWindow {
        effective_from: NaiveDate,
        effective_to: NaiveDate,
    },
    #[error("invalid rule condition: {0}")]
    Condition(#[from] RuleConfigurationError),
    #[error("a revision must keep scheme '{scheme_id}' and name '{name}'")]
    LineageMismatch { scheme_id: SchemeId, name: String },
}

/// Draft that passed validation; every field needed to mint a `Rule` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedDraft {
    pub scheme_id: SchemeId,
    pub name: String,
    pub condition: RuleCondition,
    pub expression: String,
    pub mandatory: bool,
    pub priority: i32,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

/// Checks a draft for completeness, operator/type compatibility and operand coercion.
pub(crate) fn validate_draft(draft: RuleDraft) -> Result<ValidatedDraft, RuleValidationError> {
    let RuleDraft {
        scheme_id,
        name,
        condition,
        expression,
        mandatory,
        priority,
        effective_from,
        effective_to,
    } = draft;

    let scheme_id = SchemeId(scheme_id.0.trim().to_string());
    if scheme_id.0.is_empty() {
        return Err(RuleValidationError::MissingScheme);
    }

    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(RuleValidationError::MissingName);
    }

    let effective_from = effective_from.ok_or(RuleValidationError::MissingEffectiveFrom)?;
    if let Some(effective_to) = effective_to {
        if effective_to < effective_from {
            return Err(RuleValidationError::InvertedWindow {
                effective_from,
                effective_to,
            });
        }
    }

    coerce_operand(&condition)?;

    let expression = expression
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| condition.describe());

    Ok(ValidatedDraft {
        scheme_id,
        name,
        condition,
        expression,
        mandatory,
        priority,
        effective_from,
        effective_to,
    })
}
