//! Evaluation of a single structured rule condition against a citizen snapshot.
//!
//! Conditions are always driven by the `type`/`operator`/`value` triple. The free-text
//! `expression` carried by a rule is display material and is never parsed here.

use serde::{Deserialize, Serialize};

use super::domain::{
    split_operand_set, AttributeValue, CitizenSnapshot, OperandKind, RuleCondition, RuleOperator,
    RuleType,
};

/// Three-valued result of checking one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOutcome {
    Satisfied,
    NotSatisfied,
    Indeterminate,
}

/// Outcome plus the human readable reason shown to citizens or administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub outcome: RuleOutcome,
    pub reason: String,
}

impl RuleVerdict {
    fn satisfied(reason: String) -> Self {
        Self {
            outcome: RuleOutcome::Satisfied,
            reason,
        }
    }

    fn not_satisfied(reason: String) -> Self {
        Self {
            outcome: RuleOutcome::NotSatisfied,
            reason,
        }
    }

    fn indeterminate(reason: String) -> Self {
        Self {
            outcome: RuleOutcome::Indeterminate,
            reason,
        }
    }
}

/// Data-integrity problem with the rule itself, never with citizen input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleConfigurationError {
    #[error("operator {operator} is not supported for rule type {rule_type}")]
    IncompatibleOperator {
        rule_type: RuleType,
        operator: RuleOperator,
    },
    #[error("value '{value}' is not numeric as required by operator {operator}")]
    NonNumericOperand {
        value: String,
        operator: RuleOperator,
    },
    #[error("value '{value}' is not a boolean flag (expected true/false)")]
    InvalidFlag { value: String },
    #[error("operator {operator} requires at least one comma separated value")]
    EmptyOperandSet { operator: RuleOperator },
    #[error("operator {operator} requires a non-empty value")]
    EmptyOperand { operator: RuleOperator },
}

/// Operand coerced from the textual rule value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Number(f64),
    Flag(bool),
    Text(String),
    Set(Vec<String>),
}

/// Rejects operator/type pairings the evaluator cannot express.
pub fn ensure_supported(
    rule_type: RuleType,
    operator: RuleOperator,
) -> Result<(), RuleConfigurationError> {
    let supported = match (rule_type.kind(), operator) {
        (OperandKind::Numeric, RuleOperator::Gte | RuleOperator::Lte | RuleOperator::Eq) => true,
        (OperandKind::Flag, RuleOperator::Eq) => true,
        (OperandKind::Text, RuleOperator::Eq | RuleOperator::In | RuleOperator::NotIn) => true,
        (_, RuleOperator::DistrictIn | RuleOperator::BlockIn) => rule_type == RuleType::Geography,
        _ => false,
    };

    if supported {
        Ok(())
    } else {
        Err(RuleConfigurationError::IncompatibleOperator {
            rule_type,
            operator,
        })
    }
}

pub(crate) fn coerce_operand(condition: &RuleCondition) -> Result<Operand, RuleConfigurationError> {
    ensure_supported(condition.rule_type, condition.operator)?;
    let raw = condition.value.trim();

    match condition.operator {
        RuleOperator::Gte | RuleOperator::Lte => parse_number(raw, condition.operator),
        RuleOperator::Eq => match condition.rule_type.kind() {
            OperandKind::Numeric => parse_number(raw, condition.operator),
            OperandKind::Flag => parse_flag(raw)
                .map(Operand::Flag)
                .ok_or_else(|| RuleConfigurationError::InvalidFlag {
                    value: raw.to_string(),
                }),
            OperandKind::Text if raw.is_empty() => Err(RuleConfigurationError::EmptyOperand {
                operator: condition.operator,
            }),
            OperandKind::Text => Ok(Operand::Text(raw.to_string())),
        },
        RuleOperator::In | RuleOperator::NotIn | RuleOperator::DistrictIn | RuleOperator::BlockIn => {
            let items = split_operand_set(raw);
            if items.is_empty() {
                Err(RuleConfigurationError::EmptyOperandSet {
                    operator: condition.operator,
                })
            } else {
                Ok(Operand::Set(items))
            }
        }
    }
}

fn parse_number(raw: &str, operator: RuleOperator) -> Result<Operand, RuleConfigurationError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(Operand::Number)
        .ok_or_else(|| RuleConfigurationError::NonNumericOperand {
            value: raw.to_string(),
            operator,
        })
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Phrase describing what the condition demands, e.g. `age requirement: 60+`.
pub fn requirement(condition: &RuleCondition) -> String {
    let label = condition.attribute_label();
    let raw = condition.value.trim();
    match condition.operator {
        RuleOperator::Gte => format!("{label} requirement: {raw}+"),
        RuleOperator::Lte => format!("{label} requirement: up to {raw}"),
        RuleOperator::Eq => format!("{label} requirement: {raw}"),
        RuleOperator::In | RuleOperator::DistrictIn | RuleOperator::BlockIn => format!(
            "{label} requirement: one of {}",
            split_operand_set(raw).join(", ")
        ),
        RuleOperator::NotIn => format!(
            "{label} requirement: none of {}",
            split_operand_set(raw).join(", ")
        ),
    }
}

/// Evaluates one condition. Missing attributes yield `Indeterminate`; a malformed
/// rule value yields `RuleConfigurationError`.
pub fn evaluate_condition(
    condition: &RuleCondition,
    snapshot: &CitizenSnapshot,
) -> Result<RuleVerdict, RuleConfigurationError> {
    let Some(attribute) = snapshot.attribute_for(condition) else {
        return Ok(RuleVerdict::indeterminate(format!(
            "attribute {} not provided",
            condition.rule_type
        )));
    };

    let operand = coerce_operand(condition)?;
    let label = condition.attribute_label();
    let symbol = condition.operator.symbol();

    let comparison = match &operand {
        Operand::Number(expected) => attribute_number(&attribute).map(|actual| {
            let holds = match condition.operator {
                RuleOperator::Gte => actual >= *expected,
                RuleOperator::Lte => actual <= *expected,
                _ => actual == *expected,
            };
            (holds, format!("{label} {actual} {symbol} {expected}"))
        }),
        Operand::Flag(expected) => attribute_flag(&attribute).map(|actual| {
            (
                actual == *expected,
                format!("{label} {actual} {symbol} {expected}"),
            )
        }),
        Operand::Text(expected) => {
            let actual = attribute_text(&attribute);
            Some((
                actual.trim().eq_ignore_ascii_case(expected),
                format!("{label} {} {symbol} {expected}", actual.trim()),
            ))
        }
        Operand::Set(items) => {
            let actual = attribute_text(&attribute);
            let member = items
                .iter()
                .any(|item| item.eq_ignore_ascii_case(actual.trim()));
            let holds = match condition.operator {
                RuleOperator::NotIn => !member,
                _ => member,
            };
            Some((
                holds,
                format!("{label} {} {symbol} [{}]", actual.trim(), items.join(", ")),
            ))
        }
    };

    let verdict = match comparison {
        Some((true, reason)) => RuleVerdict::satisfied(reason),
        Some((false, _)) => RuleVerdict::not_satisfied(requirement(condition)),
        None => RuleVerdict::indeterminate(format!(
            "attribute {} has an unusable value",
            condition.rule_type
        )),
    };
    Ok(verdict)
}

fn attribute_number(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Number(number) => Some(*number).filter(|number| number.is_finite()),
        AttributeValue::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        AttributeValue::Flag(_) => None,
    }
}

fn attribute_flag(value: &AttributeValue) -> Option<bool> {
    match value {
        AttributeValue::Flag(flag) => Some(*flag),
        AttributeValue::Text(text) => parse_flag(text),
        AttributeValue::Number(_) => None,
    }
}

fn attribute_text(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Text(text) => text.clone(),
        AttributeValue::Number(number) => number.to_string(),
        AttributeValue::Flag(flag) => flag.to_string(),
    }
}
