//! Property-based tests for rule versioning and evaluation invariants.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use scheme_eligibility::eligibility::{
    confidence_score, CitizenSnapshot, EligibilityEngine, InMemoryRuleRepository, LineageKey,
    Rule, RuleCondition, RuleDraft, RuleId, RuleOperator, RuleRepository, RuleStore, RuleType,
    SchemeId,
};

fn base_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
}

fn scheme() -> SchemeId {
    SchemeId("widow-pension".to_string())
}

fn age_draft(effective_from: NaiveDate, effective_to: Option<NaiveDate>) -> RuleDraft {
    RuleDraft {
        scheme_id: scheme(),
        name: "Minimum age".to_string(),
        condition: RuleCondition::new(RuleType::Age, RuleOperator::Gte, "18"),
        expression: None,
        mandatory: true,
        priority: 0,
        effective_from: Some(effective_from),
        effective_to,
    }
}

/// One lineage write: revise the latest version or retire it.
#[derive(Debug, Clone)]
enum Step {
    Revise { offset: i64, window: Option<i64> },
    Retire { offset: i64 },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (-30i64..400, proptest::option::of(0i64..120))
            .prop_map(|(offset, window)| Step::Revise { offset, window }),
        1 => (-30i64..400).prop_map(|offset| Step::Retire { offset }),
    ]
}

fn condition_strategy() -> impl Strategy<Value = RuleCondition> {
    prop_oneof![
        (0u32..120).prop_map(|age| RuleCondition::new(RuleType::Age, RuleOperator::Gte, age.to_string())),
        (0u32..500_000).prop_map(|income| {
            RuleCondition::new(RuleType::Income, RuleOperator::Lte, income.to_string())
        }),
        Just(RuleCondition::new(RuleType::Geography, RuleOperator::DistrictIn, "Jaipur,Ajmer")),
        Just(RuleCondition::new(RuleType::Gender, RuleOperator::Eq, "female")),
        Just(RuleCondition::new(RuleType::Disability, RuleOperator::Eq, "yes")),
        Just(RuleCondition::new(RuleType::Age, RuleOperator::Gte, "not-a-number")),
    ]
}

fn rules_strategy() -> impl Strategy<Value = Vec<Rule>> {
    prop::collection::vec((condition_strategy(), any::<bool>(), -5i32..5), 0..8).prop_map(
        |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(index, (condition, mandatory, priority))| Rule {
                    id: RuleId(format!("rule-{index}")),
                    scheme_id: scheme(),
                    name: format!("criterion-{index}"),
                    condition,
                    expression: None,
                    mandatory,
                    priority,
                    version: 1,
                    effective_from: base_day(),
                    effective_to: None,
                })
                .collect()
        },
    )
}

fn snapshot_strategy() -> impl Strategy<Value = CitizenSnapshot> {
    (
        proptest::option::of(0u32..110),
        proptest::option::of(0u32..600_000),
        proptest::option::of(prop_oneof![Just("jaipur"), Just("Kota"), Just("")]),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(age, income, district, has_disability)| CitizenSnapshot {
            age,
            annual_income: income.map(f64::from),
            district: district.map(str::to_string),
            has_disability,
            ..CitizenSnapshot::default()
        })
}

proptest! {
    #[test]
    fn lineage_windows_never_overlap(steps in prop::collection::vec(step_strategy(), 1..12)) {
        let repository = Arc::new(InMemoryRuleRepository::default());
        let store = RuleStore::new(repository.clone());
        let first = store.create_rule(age_draft(base_day(), None)).expect("created");
        let key = LineageKey { scheme_id: scheme(), name: first.name.clone() };

        for step in steps {
            let latest = store
                .latest_version(&key)
                .expect("lineage readable")
                .expect("lineage present");
            let before = repository.lineage(&key).expect("lineage readable");
            let outcome = match step {
                Step::Revise { offset, window } => {
                    let from = base_day() + Duration::days(offset);
                    let to = window.map(|length| from + Duration::days(length));
                    store.revise_rule(&latest.id, age_draft(from, to)).map(|_| ())
                }
                Step::Retire { offset } => store
                    .delete_rule(&latest.id, base_day() + Duration::days(offset))
                    .map(|_| ()),
            };

            let versions = repository.lineage(&key).expect("lineage readable");
            if outcome.is_err() {
                prop_assert_eq!(&versions, &before);
            }
            for (index, version) in versions.iter().enumerate() {
                prop_assert_eq!(version.version as usize, index + 1);
                for other in &versions[index + 1..] {
                    prop_assert!(
                        !version.overlaps(other),
                        "versions {} and {} overlap",
                        version.version,
                        other.version
                    );
                }
            }
        }
    }

    #[test]
    fn confidence_stays_within_bounds(
        satisfied in 0usize..1_000,
        indeterminate in 0usize..1_000,
        failed in 0usize..1_000,
    ) {
        let score = confidence_score(satisfied, indeterminate, failed);
        prop_assert!(score <= 100);
        if satisfied == 0 {
            prop_assert_eq!(score, 0);
        }
    }

    #[test]
    fn evaluation_is_deterministic_and_bounded(
        rules in rules_strategy(),
        snapshot in snapshot_strategy(),
    ) {
        let engine = EligibilityEngine::new();
        let first = engine.evaluate(&scheme(), &rules, &snapshot, base_day());
        let second = engine.evaluate(&scheme(), &rules, &snapshot, base_day());

        prop_assert_eq!(
            serde_json::to_vec(&first).expect("serializes"),
            serde_json::to_vec(&second).expect("serializes")
        );
        prop_assert!(first.result.confidence <= 100);
        prop_assert_eq!(
            first.result.evaluated_rule_count + first.result.skipped_rule_count,
            rules.len()
        );
    }

    #[test]
    fn failed_mandatory_rule_is_never_eligible(
        rules in rules_strategy(),
        snapshot in snapshot_strategy(),
        age in 0u32..60,
    ) {
        let mut rules = rules;
        rules.push(Rule {
            id: RuleId("rule-gate".to_string()),
            scheme_id: scheme(),
            name: "gate".to_string(),
            condition: RuleCondition::new(RuleType::Age, RuleOperator::Gte, "60"),
            expression: None,
            mandatory: true,
            priority: 0,
            version: 1,
            effective_from: base_day(),
            effective_to: None,
        });
        let snapshot = CitizenSnapshot { age: Some(age), ..snapshot };

        let report = EligibilityEngine::new().evaluate(&scheme(), &rules, &snapshot, base_day());

        prop_assert!(!report.result.eligible);
        prop_assert!(report
            .result
            .missing_criteria
            .contains(&"age requirement: 60+".to_string()));
    }
}
