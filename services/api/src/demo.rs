use crate::infra::InMemoryIssueReporter;
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use scheme_eligibility::eligibility::{
    parse_date, CitizenSnapshot, EligibilityResult, EligibilityService, InMemoryRuleRepository, Rule,
    RuleCondition, RuleDraft, RuleId, RuleOperator, RuleRepository, RuleTestRequest, RuleType,
    SchemeId,
};
use scheme_eligibility::error::AppError;
use std::sync::Arc;

type DemoService = EligibilityService<InMemoryRuleRepository, InMemoryIssueReporter>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Print each eligibility result as JSON as well as the summary line.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let effective_from = shift_days(as_of, -30)?;
    let backdated_from = shift_days(effective_from, -365)?;
    let next_day = shift_days(as_of, 1)?;
    let pension = SchemeId("old-age-pension".to_string());
    let empty_scheme = SchemeId("unconfigured-scheme".to_string());

    let repository = Arc::new(InMemoryRuleRepository::default());
    let issues = Arc::new(InMemoryIssueReporter::default());
    let service: DemoService = EligibilityService::new(repository.clone(), issues.clone(), 16);

    println!("Scheme eligibility demo (as of {as_of})");

    let senior = service.create_rule(demo_draft(
        &pension,
        "Senior citizen",
        RuleCondition::new(RuleType::Age, RuleOperator::Gte, "60"),
        true,
        effective_from,
    ))?;
    service.create_rule(demo_draft(
        &pension,
        "Resident district",
        RuleCondition::new(RuleType::Geography, RuleOperator::DistrictIn, "Jaipur,Jodhpur"),
        false,
        effective_from,
    ))?;
    println!(
        "- Configured {} rules for {}",
        service.list_active_rules(&pension, as_of)?.len(),
        pension
    );

    println!("\n1. Dry run of '{}' for a 65 year old", expression_of(&senior));
    let dry_run = service.test_rule(RuleTestRequest {
        rule: senior.condition.clone(),
        test_snapshot: CitizenSnapshot {
            age: Some(65),
            ..CitizenSnapshot::default()
        },
    })?;
    println!("   {:?}: {}", dry_run.outcome, dry_run.reason);

    println!("\n2. A 40 year old applies");
    let result = service.check_eligibility(
        &pension,
        &CitizenSnapshot {
            age: Some(40),
            district: Some("Jaipur".to_string()),
            ..CitizenSnapshot::default()
        },
        as_of,
    )?;
    render_result(&result, args.json);

    println!("\n3. A 72 year old from 'jaipur' (lower case) applies");
    let result = service.check_eligibility(
        &pension,
        &CitizenSnapshot {
            age: Some(72),
            district: Some("jaipur".to_string()),
            ..CitizenSnapshot::default()
        },
        as_of,
    )?;
    render_result(&result, args.json);

    println!("\n4. A scheme with no rules configured");
    let result = service.check_eligibility(&empty_scheme, &CitizenSnapshot::default(), as_of)?;
    render_result(&result, args.json);
    if result.is_undetermined() {
        println!("   No criteria were evaluated; treat this as 'cannot determine'.");
    }

    println!("\n5. Backdating a revision of '{}'", senior.name);
    let mut backdated = demo_draft(
        &pension,
        &senior.name,
        RuleCondition::new(RuleType::Age, RuleOperator::Gte, "58"),
        true,
        backdated_from,
    );
    match service.revise_rule(&senior.id, backdated.clone()) {
        Ok(rule) => println!("   Unexpectedly accepted version {}", rule.version),
        Err(err) => println!("   Rejected: {err}"),
    }
    backdated.effective_from = Some(next_day);
    let revised = service.revise_rule(&senior.id, backdated)?;
    println!(
        "   Forward revision accepted as version {} from {}",
        revised.version, revised.effective_from
    );
    for version in service.rule_history(&revised.id)? {
        println!(
            "   - v{} {} [{} .. {}]",
            version.version,
            expression_of(&version),
            version.effective_from,
            version
                .effective_to
                .map(|to| to.to_string())
                .unwrap_or_else(|| "open".to_string())
        );
    }

    println!("\n6. A rule value corrupted after it was stored");
    repository
        .insert(Rule {
            id: RuleId("rule-corrupted".to_string()),
            scheme_id: pension.clone(),
            name: "Income ceiling".to_string(),
            condition: RuleCondition::new(RuleType::Income, RuleOperator::Lte, "not-a-number"),
            expression: None,
            mandatory: true,
            priority: 0,
            version: 1,
            effective_from,
            effective_to: None,
        })
        .map_err(|err| AppError::Input(err.to_string()))?;
    service.cache().invalidate_scheme(&pension);
    let result = service.check_eligibility(
        &pension,
        &CitizenSnapshot {
            age: Some(72),
            district: Some("Jodhpur".to_string()),
            annual_income: Some(48_000.0),
            ..CitizenSnapshot::default()
        },
        as_of,
    )?;
    render_result(&result, args.json);
    for issue in issues.issues() {
        println!(
            "   Administrator alert: {} v{} ({}): {}",
            issue.rule_name, issue.version, issue.rule_id, issue.message
        );
    }

    Ok(())
}

fn shift_days(date: NaiveDate, days: i64) -> Result<NaiveDate, AppError> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| AppError::Input(format!("{date} is too close to the calendar limit")))
}

fn demo_draft(
    scheme_id: &SchemeId,
    name: &str,
    condition: RuleCondition,
    mandatory: bool,
    effective_from: NaiveDate,
) -> RuleDraft {
    RuleDraft {
        scheme_id: scheme_id.clone(),
        name: name.to_string(),
        condition,
        expression: None,
        mandatory,
        priority: if mandatory { 10 } else { 0 },
        effective_from: Some(effective_from),
        effective_to: None,
    }
}

fn expression_of(rule: &Rule) -> String {
    rule.expression
        .clone()
        .unwrap_or_else(|| rule.condition.describe())
}

fn render_result(result: &EligibilityResult, as_json: bool) {
    println!(
        "   eligible={} confidence={}% evaluated={} skipped={}",
        result.eligible, result.confidence, result.evaluated_rule_count, result.skipped_rule_count
    );
    for reason in &result.satisfied_reasons {
        println!("   + {reason}");
    }
    for missing in &result.missing_criteria {
        println!("   - {missing}");
    }
    for unverified in &result.unverified_criteria {
        println!("   ? {unverified}");
    }

    if as_json {
        match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("   Result payload unavailable: {err}"),
        }
    }
}
