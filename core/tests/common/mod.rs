// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use cartograph::api::{GitRef, GitSource, TemplateOutputs, WorkloadSource};
use cartograph::{
  ClusterStore, ControllerConfig, DynamicTracker, InMemoryStore, ObjectKey, ObjectKind, Pipeline, Reconciler,
  Repository, Resource, Stage, Template, UnstructuredObject, Workload,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Level;

pub const NAMESPACE: &str = "dev";
pub const WORKLOAD: &str = "app";
pub const SELECTOR_KEY: &str = "apps.example.dev/workload-type";
pub const SOURCE_STAGE: &str = "source-provider";
pub const IMAGE_STAGE: &str = "image-builder";
pub const REPO_URL: &str = "https://git.example.dev/team/app.git";

pub fn source_kind() -> ObjectKind {
  ObjectKind::new("source.example.dev/v1", "GitRepository")
}

pub fn image_kind() -> ObjectKind {
  ObjectKind::new("build.example.dev/v1", "Image")
}

// --- Fixtures ---

/// Renders a `GitRepository` named after the workload and exposes its
/// artifact as `url`/`revision`.
pub fn source_template() -> Template {
  Template::new(
    "source-template",
    json!({
      "apiVersion": "source.example.dev/v1",
      "kind": "GitRepository",
      "metadata": { "name": "$(workload.metadata.name)$-source" },
      "spec": {
        "url": "$(workload.spec.source.git.url)$",
        "ref": { "branch": "$(params.branch)$" },
        "interval": "$(params.interval)$"
      }
    }),
  )
  .with_param("branch", Some(json!("main")))
  .with_param("interval", Some(json!("1m")))
  .with_outputs(TemplateOutputs::Source {
    url_path: ".status.artifact.url".to_string(),
    revision_path: ".status.artifact.revision".to_string(),
  })
}

/// Renders an `Image` built from the source stage's outputs.
pub fn image_template() -> Template {
  Template::new(
    "image-template",
    json!({
      "apiVersion": "build.example.dev/v1",
      "kind": "Image",
      "metadata": { "name": "$(workload.metadata.name)$-image" },
      "spec": {
        "source": {
          "url": "$(inputs.source.url)$",
          "revision": "$(inputs.source.revision)$"
        },
        "tag": "registry.example.dev/$(workload.metadata.namespace)$/$(workload.metadata.name)$"
      }
    }),
  )
  .with_outputs(TemplateOutputs::Image {
    image_path: ".status.latestImage".to_string(),
  })
}

pub fn web_pipeline() -> Pipeline {
  Pipeline::new(
    "web",
    [(SELECTOR_KEY, "web")],
    vec![
      Stage::new(SOURCE_STAGE, "source-template"),
      Stage::new(IMAGE_STAGE, "image-template").with_input("source", SOURCE_STAGE, None),
    ],
  )
}

pub fn web_workload() -> Workload {
  let mut workload = Workload::new(NAMESPACE, WORKLOAD).with_labels([(SELECTOR_KEY, "web")]);
  workload.spec.source = Some(WorkloadSource {
    git: Some(GitSource {
      url: REPO_URL.to_string(),
      git_ref: GitRef {
        branch: Some("main".to_string()),
        ..Default::default()
      },
    }),
    ..Default::default()
  });
  workload
}

// --- Harness ---

/// A reconciler wired to an in-memory cluster.
pub struct Harness {
  pub store: Arc<InMemoryStore>,
  pub repo: Repository,
  pub tracker: Arc<DynamicTracker>,
  pub reconciler: Reconciler,
  pub config: ControllerConfig,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_config(ControllerConfig::default())
  }

  pub fn with_config(config: ControllerConfig) -> Self {
    let store = Arc::new(InMemoryStore::new());
    let repo = Repository::new(store.clone());
    let tracker = Arc::new(DynamicTracker::new(store.clone()));
    let reconciler = Reconciler::new(repo.clone(), tracker.clone(), config.clone());
    Self {
      store,
      repo,
      tracker,
      reconciler,
      config,
    }
  }

  /// Harness seeded with the two-stage web pipeline, its templates and the
  /// web workload.
  pub async fn web() -> Self {
    let harness = Self::new();
    harness.apply(&source_template()).await;
    harness.apply(&image_template()).await;
    harness.apply(&web_pipeline()).await;
    harness.apply(&web_workload()).await;
    harness
  }

  pub async fn apply<R: Resource>(&self, resource: &R) -> R {
    self.repo.apply_resource(resource).await.expect("apply resource")
  }

  pub async fn workload(&self) -> Workload {
    self
      .repo
      .get_workload(NAMESPACE, WORKLOAD)
      .await
      .expect("get workload")
      .expect("workload exists")
  }

  pub fn stamped(&self, kind: ObjectKind, name: &str) -> Option<UnstructuredObject> {
    self.store.object(&ObjectKey::new(kind, Some(NAMESPACE), name))
  }

  /// Reports status on a stamped object as its own controller would.
  pub fn report_status(&self, kind: ObjectKind, name: &str, status: Value) {
    self
      .store
      .set_status(&ObjectKey::new(kind, Some(NAMESPACE), name), status)
      .expect("set status");
  }

  pub fn report_source_artifact(&self, revision: &str) {
    self.report_status(
      source_kind(),
      "app-source",
      json!({ "artifact": { "url": "http://artifacts.example.dev/app.tar.gz", "revision": revision } }),
    );
  }

  pub async fn list(&self, kind: &ObjectKind) -> Vec<UnstructuredObject> {
    self
      .store
      .list(kind, &cartograph::ListSelector::all().in_namespace(NAMESPACE))
      .await
      .expect("list")
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
