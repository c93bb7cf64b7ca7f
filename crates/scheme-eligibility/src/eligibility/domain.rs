use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for one immutable rule version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a scheme owned by scheme management.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemeId(pub String);

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rule lineage key. Every version of a rule shares the same scheme and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineageKey {
    pub scheme_id: SchemeId,
    pub name: String,
}

/// Closed set of eligibility criteria a scheme can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Age,
    Income,
    Gender,
    Geography,
    Category,
    Disability,
    Household,
    MaritalStatus,
    PriorParticipation,
}

impl RuleType {
    pub const ALL: [RuleType; 9] = [
        RuleType::Age,
        RuleType::Income,
        RuleType::Gender,
        RuleType::Geography,
        RuleType::Category,
        RuleType::Disability,
        RuleType::Household,
        RuleType::MaritalStatus,
        RuleType::PriorParticipation,
    ];

    /// Wire name, also used in "attribute ... not provided" reasons.
    pub const fn code(self) -> &'static str {
        match self {
            RuleType::Age => "AGE",
            RuleType::Income => "INCOME",
            RuleType::Gender => "GENDER",
            RuleType::Geography => "GEOGRAPHY",
            RuleType::Category => "CATEGORY",
            RuleType::Disability => "DISABILITY",
            RuleType::Household => "HOUSEHOLD",
            RuleType::MaritalStatus => "MARITAL_STATUS",
            RuleType::PriorParticipation => "PRIOR_PARTICIPATION",
        }
    }

    /// Key consulted in [`CitizenSnapshot::extensions`] when the typed field is absent.
    /// Block membership reads `block` instead.
    pub const fn extension_key(self) -> &'static str {
        match self {
            RuleType::Age => "age",
            RuleType::Income => "income",
            RuleType::Gender => "gender",
            RuleType::Geography => "district",
            RuleType::Category => "category",
            RuleType::Disability => "disability",
            RuleType::Household => "household",
            RuleType::MaritalStatus => "marital_status",
            RuleType::PriorParticipation => "prior_participation",
        }
    }

    pub const fn kind(self) -> OperandKind {
        match self {
            RuleType::Age | RuleType::Income | RuleType::Household => OperandKind::Numeric,
            RuleType::Disability | RuleType::PriorParticipation => OperandKind::Flag,
            RuleType::Gender
            | RuleType::Geography
            | RuleType::Category
            | RuleType::MaritalStatus => OperandKind::Text,
        }
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|rule_type| rule_type.code() == normalized)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Shape of the attribute a rule type reads from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Numeric,
    Text,
    Flag,
}

/// Comparison applied between the snapshot attribute and the rule operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOperator {
    Gte,
    Lte,
    Eq,
    In,
    NotIn,
    DistrictIn,
    BlockIn,
}

impl RuleOperator {
    pub const ALL: [RuleOperator; 7] = [
        RuleOperator::Gte,
        RuleOperator::Lte,
        RuleOperator::Eq,
        RuleOperator::In,
        RuleOperator::NotIn,
        RuleOperator::DistrictIn,
        RuleOperator::BlockIn,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            RuleOperator::Gte => "GTE",
            RuleOperator::Lte => "LTE",
            RuleOperator::Eq => "EQ",
            RuleOperator::In => "IN",
            RuleOperator::NotIn => "NOT_IN",
            RuleOperator::DistrictIn => "DISTRICT_IN",
            RuleOperator::BlockIn => "BLOCK_IN",
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            RuleOperator::Gte => ">=",
            RuleOperator::Lte => "<=",
            RuleOperator::Eq => "==",
            RuleOperator::In | RuleOperator::DistrictIn | RuleOperator::BlockIn => "in",
            RuleOperator::NotIn => "not in",
        }
    }

    /// Set operators split their operand on commas.
    pub const fn is_set(self) -> bool {
        matches!(
            self,
            RuleOperator::In | RuleOperator::NotIn | RuleOperator::DistrictIn | RuleOperator::BlockIn
        )
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|operator| operator.code() == normalized)
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured condition. The only authoritative evaluation input of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub operator: RuleOperator,
    pub value: String,
}

impl RuleCondition {
    pub fn new(rule_type: RuleType, operator: RuleOperator, value: impl Into<String>) -> Self {
        Self {
            rule_type,
            operator,
            value: value.into(),
        }
    }

    /// Snapshot attribute label used in reasons (`age`, `district`, ...).
    pub fn attribute_label(&self) -> &'static str {
        match (self.rule_type, self.operator) {
            (RuleType::Geography, RuleOperator::BlockIn) => "block",
            (RuleType::Geography, _) => "district",
            (RuleType::Age, _) => "age",
            (RuleType::Income, _) => "annual income",
            (RuleType::Gender, _) => "gender",
            (RuleType::Category, _) => "category",
            (RuleType::Disability, _) => "disability",
            (RuleType::Household, _) => "family size",
            (RuleType::MaritalStatus, _) => "marital status",
            (RuleType::PriorParticipation, _) => "prior participation",
        }
    }

    /// Display mirror of the condition, e.g. `age >= 60`.
    pub fn describe(&self) -> String {
        let value = if self.operator.is_set() {
            format!("[{}]", split_operand_set(&self.value).join(", "))
        } else {
            self.value.trim().to_string()
        };
        format!("{} {} {}", self.attribute_label(), self.operator.symbol(), value)
    }
}

/// Splits a comma separated operand, trimming whitespace and dropping empty items.
pub(crate) fn split_operand_set(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// One persisted, immutable version of an eligibility rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub scheme_id: SchemeId,
    pub name: String,
    #[serde(flatten)]
    pub condition: RuleCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub mandatory: bool,
    pub priority: i32,
    pub version: u32,
    pub effective_from: NaiveDate,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
}

impl Rule {
    /// Active iff `effective_from <= date` and the window is open or still covers `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.map_or(true, |to| date <= to)
    }

    pub fn lineage(&self) -> LineageKey {
        LineageKey {
            scheme_id: self.scheme_id.clone(),
            name: self.name.clone(),
        }
    }

    /// True when the validity windows of both rules share at least one day.
    pub fn overlaps(&self, other: &Rule) -> bool {
        windows_overlap(
            (self.effective_from, self.effective_to),
            (other.effective_from, other.effective_to),
        )
    }
}

pub(crate) fn windows_overlap(
    (a_from, a_to): (NaiveDate, Option<NaiveDate>),
    (b_from, b_to): (NaiveDate, Option<NaiveDate>),
) -> bool {
    // an inverted window (retired before it started) covers no day at all
    if a_to.is_some_and(|to| to < a_from) || b_to.is_some_and(|to| to < b_from) {
        return false;
    }
    let a_before_b = a_to.is_some_and(|to| to < b_from);
    let b_before_a = b_to.is_some_and(|to| to < a_from);
    !(a_before_b || b_before_a)
}

/// Administrator supplied rule draft used for creation and revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub scheme_id: SchemeId,
    pub name: String,
    #[serde(flatten)]
    pub condition: RuleCondition,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
}

/// Self-declared gender as captured by the citizen profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Female,
    Male,
    Transgender,
    Other,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Transgender => "transgender",
            Gender::Other => "other",
        }
    }
}

/// Extension attribute value for rule types not yet modelled as typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

/// Read-only citizen attribute bag supplied by the caller for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenSnapshot {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub annual_income: Option<f64>,
    #[serde(default)]
    pub family_size: Option<u32>,
    #[serde(default)]
    pub has_disability: Option<bool>,
    #[serde(default)]
    pub has_ration_card: Option<bool>,
    #[serde(default)]
    pub prior_participation: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, AttributeValue>,
}

impl CitizenSnapshot {
    /// Resolves the attribute a condition reads, falling back to the extension map.
    pub fn attribute_for(&self, condition: &RuleCondition) -> Option<AttributeValue> {
        let typed = match (condition.rule_type, condition.operator) {
            (RuleType::Age, _) => self.age.map(|age| AttributeValue::Number(f64::from(age))),
            (RuleType::Income, _) => self.annual_income.map(AttributeValue::Number),
            (RuleType::Household, _) => self
                .family_size
                .map(|size| AttributeValue::Number(f64::from(size))),
            (RuleType::Gender, _) => self
                .gender
                .map(|gender| AttributeValue::Text(gender.label().to_string())),
            (RuleType::Geography, RuleOperator::BlockIn) => {
                self.block.clone().map(AttributeValue::Text)
            }
            (RuleType::Geography, _) => self.district.clone().map(AttributeValue::Text),
            (RuleType::Category, _) => self.category.clone().map(AttributeValue::Text),
            (RuleType::MaritalStatus, _) => self.marital_status.clone().map(AttributeValue::Text),
            (RuleType::Disability, _) => self.has_disability.map(AttributeValue::Flag),
            (RuleType::PriorParticipation, _) => {
                self.prior_participation.map(AttributeValue::Flag)
            }
        };

        typed
            .filter(|value| !matches!(value, AttributeValue::Text(text) if text.trim().is_empty()))
            .or_else(|| {
                let key = match (condition.rule_type, condition.operator) {
                    (RuleType::Geography, RuleOperator::BlockIn) => "block",
                    (rule_type, _) => rule_type.extension_key(),
                };
                self.extensions.get(key).cloned()
            })
    }
}
