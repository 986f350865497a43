// benches/stamping_benchmarks.rs
use cartograph::api::TemplateOutputs;
use cartograph::conditions::ConditionManager;
use cartograph::error::{OutputError, RealizeError};
use cartograph::template::path::PathError;
use cartograph::template::StampContext;
use cartograph::{
  CancellationToken, ControllerConfig, InMemoryStore, Pipeline, Realizer, Repository, Stage, Stamper, Template,
  Workload,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::runtime::Runtime;

const SELECTOR: (&str, &str) = ("apps.example.dev/workload-type", "bench");

// --- Fixtures ---

/// A template whose spec has `fields` interpolated entries.
fn wide_template(fields: usize) -> Template {
  let spec: Map<String, Value> = (0..fields)
    .map(|i| (format!("field{}", i), json!(format!("$(params.p{})$-$(workload.metadata.name)$", i))))
    .collect();
  let mut template = Template::new(
    "wide",
    json!({
      "apiVersion": "v1",
      "kind": "ConfigMap",
      "metadata": { "name": "$(workload.metadata.name)$-wide" },
      "spec": spec
    }),
  );
  for i in 0..fields {
    template = template.with_param(format!("p{}", i), Some(json!(i)));
  }
  template
}

/// Stage `i` copies the value produced by stage `i - 1`, so every stage
/// depends on the one before it and all outputs resolve from `spec`.
fn chained_template(i: usize) -> Template {
  let value = if i == 0 {
    "$(workload.metadata.name)$".to_string()
  } else {
    "$(inputs.previous.value)$".to_string()
  };
  Template::new(
    format!("link-{}", i),
    json!({
      "apiVersion": "v1",
      "kind": "ConfigMap",
      "metadata": { "name": format!("$(workload.metadata.name)$-link-{}", i) },
      "spec": { "value": value }
    }),
  )
  .with_outputs(TemplateOutputs::Generic {
    outputs: [("value".to_string(), ".spec.value".to_string())].into_iter().collect(),
  })
}

fn chained_pipeline(stages: usize) -> Pipeline {
  let stages = (0..stages)
    .map(|i| {
      let stage = Stage::new(format!("stage-{}", i), format!("link-{}", i));
      if i == 0 {
        stage
      } else {
        stage.with_input("previous", format!("stage-{}", i - 1), None)
      }
    })
    .collect();
  Pipeline::new("chain", [SELECTOR], stages)
}

fn bench_workload() -> Workload {
  let mut workload = Workload::new("bench", "app").with_labels([SELECTOR]);
  workload.metadata.uid = "bench-uid".to_string();
  workload
}

// --- Benchmark Functions ---

fn bench_stamp_wide_templates(c: &mut Criterion) {
  let mut group = c.benchmark_group("StampWideTemplate");
  let stamper = Stamper::new(&ControllerConfig::default());
  let workload = bench_workload();
  let pipeline = chained_pipeline(1);
  let stage = Stage::new("wide", "wide");

  for fields in [1usize, 10, 100].iter() {
    let template = wide_template(*fields);
    group.throughput(Throughput::Elements(*fields as u64));
    group.bench_with_input(BenchmarkId::from_parameter(fields), fields, |b, _| {
      b.iter(|| {
        let ctx = StampContext {
          workload: &workload,
          pipeline: &pipeline,
          stage: &stage,
          inputs: Map::new(),
        };
        stamper.stamp(&template, &ctx).unwrap()
      });
    });
  }
  group.finish();
}

fn bench_realize_steady_state(c: &mut Criterion) {
  let mut group = c.benchmark_group("RealizeSteadyState");
  let rt = Runtime::new().unwrap();

  for stages in [1usize, 5, 20].iter() {
    let store = Arc::new(InMemoryStore::new());
    let repo = Repository::new(store.clone());
    let workload = bench_workload();
    rt.block_on(async {
      for i in 0..*stages {
        repo.apply_resource(&chained_template(i)).await.unwrap();
      }
      repo.apply_resource(&chained_pipeline(*stages)).await.unwrap();
    });
    let realizer = Realizer::new(Stamper::new(&ControllerConfig::default()));
    // First pass creates every object; the measured passes are no-op writes.
    let first = rt
      .block_on(realizer.realize(&workload, &repo, &CancellationToken::new()))
      .unwrap();
    assert!(first.is_complete());

    group.throughput(Throughput::Elements(*stages as u64));
    group.bench_with_input(BenchmarkId::from_parameter(stages), stages, |b, _| {
      b.to_async(&rt).iter(|| async {
        realizer
          .realize(&workload, &repo, &CancellationToken::new())
          .await
          .unwrap()
      });
    });
  }
  group.finish();
}

fn bench_condition_finalize(c: &mut Criterion) {
  let errors: Vec<RealizeError> = (0..8)
    .map(|i| RealizeError::OutputNotReady {
      stage: format!("stage-{}", i),
      template: format!("link-{}", i),
      source: OutputError::NotReady {
        output: "value".to_string(),
        path: ".status.value".to_string(),
        object: format!("app-link-{}", i),
        source: PathError::Missing {
          path: ".status.value".to_string(),
          at: ".status".to_string(),
        },
      },
    })
    .collect();
  let mut seed = ConditionManager::new("Ready", &[]);
  seed.record_errors(&errors);
  let (previous, _) = seed.finalize();

  c.bench_function("ConditionFinalize", |b| {
    b.iter(|| {
      let mut manager = ConditionManager::new("Ready", &previous);
      manager.record_errors(&errors);
      manager.finalize()
    });
  });
}

criterion_group!(
  benches,
  bench_stamp_wide_templates,
  bench_realize_steady_state,
  bench_condition_finalize
);
criterion_main!(benches);
