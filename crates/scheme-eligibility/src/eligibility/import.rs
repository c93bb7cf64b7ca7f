use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use super::domain::{LineageKey, RuleCondition, RuleDraft, RuleOperator, RuleType, SchemeId};
use super::expression::parse_flag;
use super::repository::{IssueReporter, RuleRepository};
use super::service::EligibilityService;

#[derive(Debug, thiserror::Error)]
pub enum RuleImportError {
    #[error("failed to read rule sheet: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rule sheet CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {detail}")]
    Row { row: usize, detail: String },
}

/// Reads administrator rule sheets into drafts.
///
/// Expected headers: `Scheme, Name, Type, Operator, Value, Mandatory, Priority,
/// Effective From, Effective To, Expression`. The last four columns may be blank.
pub struct RuleCsvImporter;

impl RuleCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<RuleDraft>, RuleImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<RuleDraft>, RuleImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut drafts = Vec::new();

        for (index, record) in csv_reader.deserialize::<RuleRow>().enumerate() {
            // header is line 1
            let row = index + 2;
            drafts.push(record?.into_draft(row)?);
        }

        Ok(drafts)
    }
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    #[serde(rename = "Scheme")]
    scheme: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    rule_type: String,
    #[serde(rename = "Operator")]
    operator: String,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "Mandatory", default, deserialize_with = "empty_string_as_none")]
    mandatory: Option<String>,
    #[serde(rename = "Priority", default, deserialize_with = "empty_string_as_none")]
    priority: Option<String>,
    #[serde(
        rename = "Effective From",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    effective_from: Option<String>,
    #[serde(
        rename = "Effective To",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    effective_to: Option<String>,
    #[serde(rename = "Expression", default, deserialize_with = "empty_string_as_none")]
    expression: Option<String>,
}

impl RuleRow {
    fn into_draft(self, row: usize) -> Result<RuleDraft, RuleImportError> {
        let row_error = |detail: String| RuleImportError::Row { row, detail };

        let rule_type = RuleType::from_code(&self.rule_type)
            .ok_or_else(|| row_error(format!("unknown rule type '{}'", self.rule_type)))?;
        let operator = RuleOperator::from_code(&self.operator)
            .ok_or_else(|| row_error(format!("unknown operator '{}'", self.operator)))?;
        let mandatory = match self.mandatory.as_deref() {
            Some(raw) => parse_flag(raw)
                .ok_or_else(|| row_error(format!("mandatory must be true/false, found '{raw}'")))?,
            None => false,
        };
        let priority = match self.priority.as_deref() {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| row_error(format!("priority must be an integer, found '{raw}'")))?,
            None => 0,
        };
        let effective_from = self
            .effective_from
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(&row_error)?;
        let effective_to = self
            .effective_to
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(&row_error)?;

        Ok(RuleDraft {
            scheme_id: SchemeId(self.scheme),
            name: self.name,
            condition: RuleCondition::new(rule_type, operator, self.value),
            expression: self.expression,
            mandatory,
            priority,
            effective_from,
            effective_to,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Parses a `YYYY-MM-DD` date as written in rule sheets and on the command line.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Outcome of loading a batch of drafts into a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub revised: usize,
    pub rejected: Vec<String>,
}

/// Creates new lineages and revises existing ones. Rejected drafts are collected rather
/// than aborting the batch.
pub fn apply_drafts<R, I>(
    service: &EligibilityService<R, I>,
    drafts: Vec<RuleDraft>,
) -> ImportSummary
where
    R: RuleRepository + 'static,
    I: IssueReporter + 'static,
{
    let mut summary = ImportSummary::default();

    for draft in drafts {
        let label = format!("{}/{}", draft.scheme_id, draft.name.trim());
        let key = LineageKey {
            scheme_id: SchemeId(draft.scheme_id.0.trim().to_string()),
            name: draft.name.trim().to_string(),
        };

        let applied = match service.latest_version(&key) {
            Ok(Some(latest)) => service
                .revise_rule(&latest.id, draft)
                .map(|_| summary.revised += 1),
            Ok(None) => service.create_rule(draft).map(|_| summary.created += 1),
            Err(err) => Err(err),
        };

        if let Err(err) = applied {
            warn!(rule = %label, error = %err, "rule sheet entry rejected");
            summary.rejected.push(format!("{label}: {err}"));
        }
    }

    info!(
        created = summary.created,
        revised = summary.revised,
        rejected = summary.rejected.len(),
        "rule sheet applied"
    );
    summary
}
