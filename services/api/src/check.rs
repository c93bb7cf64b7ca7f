use crate::infra::{load_snapshot, InMemoryIssueReporter};
use chrono::{Local, NaiveDate};
use clap::Args;
use scheme_eligibility::eligibility::{
    apply_drafts, parse_date, CitizenSnapshot, EligibilityReport, EligibilityService,
    InMemoryRuleRepository, RuleCsvImporter, RuleDraft, SchemeId,
};
use scheme_eligibility::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Rule sheet (CSV) holding the scheme's rules
    #[arg(long)]
    pub(crate) rules_csv: PathBuf,
    /// Scheme to evaluate
    #[arg(long)]
    pub(crate) scheme: String,
    /// Citizen snapshot as a JSON file (camelCase fields)
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
}

pub(crate) fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let snapshot = load_snapshot(&args.snapshot)?;
    let drafts = RuleCsvImporter::from_path(&args.rules_csv)?;

    let report = evaluate_sheet(drafts, &SchemeId(args.scheme), &snapshot, as_of)?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::Input(format!("failed to render result: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn evaluate_sheet(
    drafts: Vec<RuleDraft>,
    scheme_id: &SchemeId,
    snapshot: &CitizenSnapshot,
    as_of: NaiveDate,
) -> Result<EligibilityReport, AppError> {
    let service = EligibilityService::new(
        Arc::new(InMemoryRuleRepository::default()),
        Arc::new(InMemoryIssueReporter::default()),
        0,
    );
    let summary = apply_drafts(&service, drafts);
    for rejected in &summary.rejected {
        eprintln!("skipped rule sheet entry: {rejected}");
    }

    Ok(service.evaluate(scheme_id, snapshot, as_of)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
Scheme,Name,Type,Operator,Value,Mandatory,Priority,Effective From,Effective To,Expression
old-age-pension,Senior citizen,AGE,GTE,60,true,10,2024-01-01,,
old-age-pension,Income ceiling,INCOME,LTE,ten thousand,true,5,2024-01-01,,
old-age-pension,Resident district,GEOGRAPHY,DISTRICT_IN,\"Jaipur,Jodhpur\",false,1,2024-01-01,,
";

    #[test]
    fn rejected_rows_do_not_block_evaluation() {
        let drafts = RuleCsvImporter::from_reader(SHEET.as_bytes()).expect("sheet parses");
        let snapshot = CitizenSnapshot {
            age: Some(67),
            district: Some("Jodhpur".to_string()),
            ..CitizenSnapshot::default()
        };
        let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");

        let report = evaluate_sheet(
            drafts,
            &SchemeId("old-age-pension".to_string()),
            &snapshot,
            as_of,
        )
        .expect("evaluated");

        assert!(report.result.eligible);
        assert_eq!(report.result.evaluated_rule_count, 2);
        assert_eq!(report.result.confidence, 100);
    }
}
