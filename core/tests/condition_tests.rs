// tests/condition_tests.rs
mod common;

use cartograph::conditions::reasons::{
  MISSING_VALUE_AT_PATH, PIPELINE_READY, PIPELINE_SELECTION_FAILED, RESOURCES_SUBMITTED, TEMPLATE_NOT_FOUND,
};
use cartograph::conditions::{condition_for_error, decisive_error, ConditionManager};
use cartograph::error::{OutputError, RealizeError};
use cartograph::template::path::PathError;
use cartograph::{Condition, ConditionStatus};
use chrono::{Duration, TimeZone, Utc};
use common::*;

fn output_not_ready(stage: &str) -> RealizeError {
  RealizeError::OutputNotReady {
    stage: stage.to_string(),
    template: format!("{}-template", stage),
    source: OutputError::NotReady {
      output: "url".to_string(),
      path: ".status.url".to_string(),
      object: format!("app-{}", stage),
      source: PathError::Missing {
        path: ".status.url".to_string(),
        at: ".status".to_string(),
      },
    },
  }
}

fn unknown(context: &str) -> RealizeError {
  RealizeError::Unknown {
    context: context.to_string(),
    source: anyhow::anyhow!("connection reset"),
  }
}

#[test]
fn no_conditions_finalize_to_ready_true() {
  setup_tracing();
  let manager = ConditionManager::new("Ready", &[]);
  let (conditions, changed) = manager.finalize();

  assert_eq!(conditions.len(), 1);
  assert_eq!(conditions[0].type_, "Ready");
  assert_eq!(conditions[0].status, ConditionStatus::True);
  assert_eq!(conditions[0].reason, "Ready");
  assert!(changed);
}

#[test]
fn a_clean_pass_after_a_failure_yields_only_ready_true() {
  let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
  let previous = vec![Condition {
    type_: "A".to_string(),
    status: ConditionStatus::False,
    reason: "Broken".to_string(),
    message: "it broke".to_string(),
    last_transition_time: t0,
  }];
  let now = t0 + Duration::minutes(5);

  let (conditions, changed) = ConditionManager::new("Ready", &previous).with_now(now).finalize();

  assert!(changed);
  assert_eq!(conditions.len(), 1);
  assert_eq!(conditions[0].type_, "Ready");
  assert!(conditions[0].is_true());
  assert_eq!(conditions[0].last_transition_time, now);
}

#[test]
fn summary_copies_the_first_appended_condition() {
  let mut manager = ConditionManager::new("Ready", &[]);
  manager.add(Condition::new("First", ConditionStatus::False, "FirstReason", "first message"));
  manager.add(Condition::new("Second", ConditionStatus::False, "SecondReason", "second message"));
  manager.add(Condition::new("First", ConditionStatus::False, "Duplicate", "ignored"));

  let (conditions, _) = manager.finalize();
  let types: Vec<&str> = conditions.iter().map(|c| c.type_.as_str()).collect();
  assert_eq!(types, vec!["Ready", "First", "Second"]);
  assert_eq!(conditions[0].status, ConditionStatus::False);
  assert_eq!(conditions[0].reason, "FirstReason");
  assert_eq!(conditions[0].message, "first message");
  assert_eq!(conditions[1].reason, "FirstReason", "first condition of a type wins");
}

#[test]
fn errors_are_recorded_in_priority_order() {
  let mut manager = ConditionManager::new("Ready", &[]);
  manager.record_errors(&[unknown("list objects"), output_not_ready("source")]);

  let (conditions, _) = manager.finalize();
  assert_eq!(conditions[0].reason, MISSING_VALUE_AT_PATH);
  assert_eq!(conditions[1].type_, RESOURCES_SUBMITTED);
  assert_eq!(conditions[1].reason, MISSING_VALUE_AT_PATH);

  let decisive = decisive_error(vec![unknown("list objects"), output_not_ready("source")]).expect("decisive");
  assert_eq!(decisive.stage(), Some("source"));
  assert!(!decisive.is_escalated(), "an output-not-ready pass does not back off");
}

#[test]
fn selector_errors_are_reported_on_pipeline_ready() {
  let condition = condition_for_error(&RealizeError::ResolveSelector {
    message: "no pipeline found".to_string(),
  });
  assert_eq!(condition.type_, PIPELINE_READY);
  assert_eq!(condition.reason, PIPELINE_SELECTION_FAILED);
  assert_eq!(condition.status, ConditionStatus::False);
  assert_eq!(condition.message, "unable to resolve pipeline: no pipeline found");

  let condition = condition_for_error(&RealizeError::TemplateNotFound {
    stage: "build".to_string(),
    template: "absent".to_string(),
  });
  assert_eq!(condition.type_, RESOURCES_SUBMITTED);
  assert_eq!(condition.reason, TEMPLATE_NOT_FOUND);
}

#[test]
fn finalization_is_idempotent_and_keeps_transition_times() {
  let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
  let mut first = ConditionManager::new("Ready", &[]).with_now(t0);
  first.add_error(&output_not_ready("source"));
  let (conditions, changed) = first.finalize();
  assert!(changed);
  assert_eq!(first.finalize(), (conditions.clone(), true));

  // The same errors on a later pass change nothing.
  let later = t0 + Duration::hours(1);
  let mut second = ConditionManager::new("Ready", &conditions).with_now(later);
  second.add_error(&output_not_ready("source"));
  let (again, changed) = second.finalize();
  assert!(!changed);
  assert_eq!(again, conditions);
  assert!(again.iter().all(|c| c.last_transition_time == t0));
}

#[test]
fn transition_time_moves_only_when_status_flips() {
  let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
  let mut failing = ConditionManager::new("Ready", &[]).with_now(t0);
  failing.add_error(&output_not_ready("source"));
  let (previous, _) = failing.finalize();

  // Same status, different reason: the message changes but the time stays.
  let t1 = t0 + Duration::minutes(1);
  let mut other_failure = ConditionManager::new("Ready", &previous).with_now(t1);
  other_failure.add_error(&output_not_ready("image"));
  let (conditions, changed) = other_failure.finalize();
  assert!(changed);
  assert_eq!(conditions[0].last_transition_time, t0);
  assert!(conditions[0].message.contains("image"));

  // Recovered: Ready flips to True and its time moves.
  let t2 = t0 + Duration::minutes(2);
  let (recovered, changed) = ConditionManager::new("Ready", &conditions).with_now(t2).finalize();
  assert!(changed);
  assert_eq!(recovered[0].last_transition_time, t2);
}
