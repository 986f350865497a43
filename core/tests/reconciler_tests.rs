// tests/reconciler_tests.rs
mod common;

use cartograph::conditions::reasons::{
  MISSING_VALUE_AT_PATH, PIPELINE_READY, PIPELINE_SELECTION_FAILED, RESOURCES_SUBMITTED, TEMPLATE_NOT_FOUND,
  TEMPLATE_REJECTED_BY_API_SERVER,
};
use cartograph::{
  CancellationToken, ConditionStatus, ControllerConfig, Pipeline, RealizeError, ReconcileError, ReconcileOutcome,
  ReconcileRequest, Resource, Stage, Workload,
};
use common::*;
use serde_json::json;
use serial_test::serial;

fn request() -> ReconcileRequest {
  ReconcileRequest::new(NAMESPACE, WORKLOAD)
}

async fn reconcile(harness: &Harness) -> Result<ReconcileOutcome, ReconcileError> {
  harness.reconciler.reconcile(&request(), &CancellationToken::new()).await
}

fn blocked(reason: &str) -> ReconcileOutcome {
  ReconcileOutcome::Blocked {
    reason: reason.to_string(),
  }
}

#[tokio::test]
#[serial]
async fn two_stage_pipeline_converges_over_three_passes() {
  setup_tracing();
  let harness = Harness::web().await;

  // Pass 1: the source has not reported an artifact yet.
  assert_eq!(reconcile(&harness).await.expect("pass 1"), blocked(MISSING_VALUE_AT_PATH));
  let workload = harness.workload().await;
  let ready = &workload.status.conditions[0];
  assert_eq!(ready.type_, "Ready");
  assert_eq!(ready.status, ConditionStatus::False);
  assert_eq!(ready.reason, MISSING_VALUE_AT_PATH);
  assert!(ready.message.contains(SOURCE_STAGE), "message: {}", ready.message);
  assert_eq!(workload.status.conditions[1].type_, RESOURCES_SUBMITTED);
  assert!(workload.status.outputs.is_empty());
  assert_eq!(workload.status.observed_generation, workload.metadata.generation);
  assert!(harness.stamped(source_kind(), "app-source").is_some());
  assert!(harness.stamped(image_kind(), "app-image").is_none());
  assert!(harness.tracker.is_watching(&source_kind()));

  // The source's controller reports; the watch routes the event back here.
  harness.report_source_artifact("abc123");
  let source = harness.stamped(source_kind(), "app-source").expect("source");
  assert_eq!(harness.store.dispatch(&source), vec![request()]);

  // Pass 2: stage two is stamped from stage one's outputs.
  assert_eq!(reconcile(&harness).await.expect("pass 2"), blocked(MISSING_VALUE_AT_PATH));
  let workload = harness.workload().await;
  assert_eq!(workload.status.outputs.get("source-provider.revision"), Some(&json!("abc123")));
  assert!(workload.status.conditions[0].message.contains(IMAGE_STAGE));
  let image = harness.stamped(image_kind(), "app-image").expect("image stamped");
  assert_eq!(image.get_path(&["spec", "source", "revision"]), Some(&json!("abc123")));
  assert!(harness.tracker.is_watching(&image_kind()));

  // Pass 3: stage two reports too.
  harness.report_status(image_kind(), "app-image", json!({ "latestImage": "registry.example.dev/dev/app@sha256:9" }));
  assert_eq!(reconcile(&harness).await.expect("pass 3"), ReconcileOutcome::Completed);
  let workload = harness.workload().await;
  assert_eq!(workload.status.conditions.len(), 1);
  assert!(workload.status.conditions[0].is_true());
  assert_eq!(
    workload.status.outputs.get("image-builder.image"),
    Some(&json!("registry.example.dev/dev/app@sha256:9"))
  );

  // A pass with nothing new writes nothing.
  let writes = harness.store.write_count();
  assert_eq!(reconcile(&harness).await.expect("pass 4"), ReconcileOutcome::Completed);
  assert_eq!(harness.store.write_count(), writes);
  assert_eq!(harness.workload().await.status, workload.status);
}

#[tokio::test]
#[serial]
async fn a_deleted_workload_ends_the_pass_cleanly() {
  let harness = Harness::new();
  assert_eq!(reconcile(&harness).await.expect("absent"), ReconcileOutcome::Completed);
  assert_eq!(harness.store.write_count(), 0);
}

#[tokio::test]
#[serial]
async fn selector_failures_are_reported_without_backoff() {
  let harness = Harness::new();
  harness.apply(&web_workload()).await;

  assert_eq!(reconcile(&harness).await.expect("handled"), blocked(PIPELINE_SELECTION_FAILED));
  let workload = harness.workload().await;
  assert_eq!(workload.status.conditions[0].reason, PIPELINE_SELECTION_FAILED);
  assert_eq!(workload.status.conditions[1].type_, PIPELINE_READY);
}

#[tokio::test]
#[serial]
async fn a_missing_template_is_recorded_and_escalated() {
  let harness = Harness::new();
  harness.apply(&web_workload()).await;
  harness
    .apply(&Pipeline::new("web", [(SELECTOR_KEY, "web")], vec![Stage::new("build", "absent")]))
    .await;

  let err = reconcile(&harness).await.unwrap_err();
  assert!(matches!(
    err,
    ReconcileError::Unhandled(RealizeError::TemplateNotFound { .. })
  ));
  let workload = harness.workload().await;
  assert_eq!(workload.status.conditions[0].reason, TEMPLATE_NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn rejected_submissions_are_recorded_and_escalated() {
  let harness = Harness::web().await;
  harness.store.reject_kind(source_kind(), "admission webhook denied the request");

  let err = reconcile(&harness).await.unwrap_err();
  assert!(matches!(err, ReconcileError::Unhandled(RealizeError::ApplyRejected { .. })));
  let workload = harness.workload().await;
  assert_eq!(workload.status.conditions[0].reason, TEMPLATE_REJECTED_BY_API_SERVER);
  assert!(workload.status.conditions[0]
    .message
    .contains("admission webhook denied the request"));
}

#[tokio::test]
#[serial]
async fn a_cancelled_pass_writes_no_status() {
  let harness = Harness::web().await;
  let writes = harness.store.write_count();
  let token = CancellationToken::new();
  token.cancel();

  let err = harness.reconciler.reconcile(&request(), &token).await.unwrap_err();
  assert!(matches!(err, ReconcileError::Cancelled(_)));
  assert_eq!(harness.store.write_count(), writes);
  assert!(harness.workload().await.status.conditions.is_empty());
}

#[tokio::test]
#[serial]
async fn watch_failures_are_escalated_after_recording_status() {
  let harness = Harness::web().await;
  harness.store.fail_watches(source_kind());

  let err = reconcile(&harness).await.unwrap_err();
  assert!(matches!(err, ReconcileError::Watch(_)));
  assert!(!harness.tracker.is_watching(&source_kind()));
  let workload = harness.workload().await;
  assert_eq!(workload.status.conditions[0].reason, MISSING_VALUE_AT_PATH);

  harness.store.clear_faults();
  assert_eq!(reconcile(&harness).await.expect("retry"), blocked(MISSING_VALUE_AT_PATH));
  assert!(harness.tracker.is_watching(&source_kind()));
  assert_eq!(harness.store.watch_count(&source_kind()), 1);
}

#[tokio::test]
#[serial]
async fn status_write_failures_are_escalated() {
  let harness = Harness::web().await;
  harness.store.fail_status_updates(true);

  let err = reconcile(&harness).await.unwrap_err();
  assert!(matches!(err, ReconcileError::StatusUpdate { .. }));
}

#[tokio::test]
#[serial]
async fn a_new_generation_is_observed_even_when_conditions_are_unchanged() {
  let harness = Harness::web().await;
  reconcile(&harness).await.expect("pass 1");
  let before = harness.workload().await;
  assert_eq!(before.status.observed_generation, 1);

  let updated = web_workload().with_param("branch", json!("release"));
  harness.apply(&updated).await;
  reconcile(&harness).await.expect("pass 2");

  let after = harness.workload().await;
  assert_eq!(after.metadata.generation, 2);
  assert_eq!(after.status.observed_generation, 2);
  assert_eq!(after.status.conditions, before.status.conditions);
  let source = harness.stamped(source_kind(), "app-source").expect("source");
  assert_eq!(source.get_path(&["spec", "ref", "branch"]), Some(&json!("release")));
}

#[tokio::test]
#[serial]
async fn the_summary_condition_type_is_configurable() {
  let harness = Harness::with_config(
    ControllerConfig::from_json_str(r#"{ "readyConditionType": "Healthy" }"#).expect("config"),
  );
  harness.apply(&web_workload()).await;

  reconcile(&harness).await.expect("handled");
  let workload = harness.workload().await;
  assert_eq!(workload.status.conditions[0].type_, "Healthy");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_passes_share_one_watch_per_kind() {
  let harness = std::sync::Arc::new(Harness::web().await);
  let names = ["alpha", "beta", "gamma", "delta"];
  for name in names {
    let mut workload = web_workload();
    workload.metadata.name = name.to_string();
    harness.apply(&workload).await;
  }

  let tasks: Vec<_> = names
    .iter()
    .map(|name| {
      let harness = harness.clone();
      let request = ReconcileRequest::new(NAMESPACE, *name);
      tokio::spawn(async move { harness.reconciler.reconcile(&request, &CancellationToken::new()).await })
    })
    .collect();
  for task in tasks {
    let outcome = task.await.expect("join").expect("pass");
    assert_eq!(outcome, blocked(MISSING_VALUE_AT_PATH));
  }

  assert_eq!(harness.store.watch_count(&source_kind()), 1);
  let sources = harness.list(&source_kind()).await;
  assert_eq!(sources.len(), names.len());
  for source in &sources {
    let owner = source.controller_owner().expect("owner");
    assert_eq!(owner.kind, Workload::KIND);
  }
}
