// cartograph/src/template/stamper.rs

//! Renders one template against a stage's inputs, submits the result and
//! reads declared outputs back from the live object.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

use crate::api::template::check_body;
use crate::api::{Pipeline, Resource, Stage, Template, Workload};
use crate::cluster::store::{ClusterStore, ListSelector};
use crate::config::ControllerConfig;
use crate::core::object::UnstructuredObject;
use crate::error::{ApplyError, ClusterError, OutputError, StampError};
use crate::template::interpolate::{Evaluator, TagInterpolator};
use crate::template::params::resolve_params;
use crate::template::path::JsonPath;

/// Everything a single stage renders against.
pub struct StampContext<'a> {
  pub workload: &'a Workload,
  pub pipeline: &'a Pipeline,
  pub stage: &'a Stage,
  /// Resolved upstream outputs keyed by input name.
  pub inputs: Map<String, Value>,
}

/// Result of submitting a stamped object.
#[derive(Debug, Clone)]
pub struct Applied {
  /// The object as stored after this pass.
  pub live: UnstructuredObject,
  /// Whether a create or update was issued.
  pub written: bool,
  /// For immutable templates, every object created for the stage, newest
  /// first. Empty otherwise.
  pub history: Vec<UnstructuredObject>,
}

/// Label and annotation keys put on stamped objects.
#[derive(Debug, Clone)]
struct StampKeys {
  workload: String,
  pipeline: String,
  stage: String,
  template: String,
  rendered_hash: String,
}

impl StampKeys {
  fn new(config: &ControllerConfig) -> Self {
    Self {
      workload: config.key("workload"),
      pipeline: config.key("pipeline"),
      stage: config.key("stage"),
      template: config.key("template"),
      rendered_hash: config.key("rendered-hash"),
    }
  }
}

#[derive(Clone)]
pub struct Stamper {
  evaluator: Arc<dyn Evaluator>,
  keys: StampKeys,
}

impl Stamper {
  pub fn new(config: &ControllerConfig) -> Self {
    Self::with_evaluator(config, Arc::new(TagInterpolator))
  }

  pub fn with_evaluator(config: &ControllerConfig, evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      evaluator,
      keys: StampKeys::new(config),
    }
  }

  /// Renders `template` for the stage and attaches namespace, owner
  /// reference, labels and the rendered-body hash.
  pub fn stamp(&self, template: &Template, ctx: &StampContext<'_>) -> Result<UnstructuredObject, StampError> {
    let params = resolve_params(template, ctx.pipeline, ctx.stage, ctx.workload);
    let workload = ctx
      .workload
      .to_object()
      .map(UnstructuredObject::into_value)
      .unwrap_or(Value::Null);
    let context = json!({
      "workload": workload,
      "params": params,
      "inputs": ctx.inputs,
      "pipeline": { "name": ctx.pipeline.name() },
      "stage": { "name": ctx.stage.name },
    });

    let rendered = self.evaluator.evaluate(&template.spec.template, &context)?;
    check_body(&rendered)?;

    let mut obj = UnstructuredObject::from(rendered.clone());
    if !rendered.is_object() || obj.kind().is_none() {
      return Err(StampError::MissingKind {
        rendered: rendered.to_string(),
      });
    }
    if obj.name().is_none() && obj.generate_name().is_none() {
      return Err(StampError::MissingName {
        rendered: rendered.to_string(),
      });
    }

    let hash = blake3::hash(rendered.to_string().as_bytes()).to_hex().to_string();
    obj.set_namespace(ctx.workload.namespace());
    obj.set_controller_owner(ctx.workload.owner_reference());
    obj.set_label(&self.keys.workload, ctx.workload.name());
    obj.set_label(&self.keys.pipeline, ctx.pipeline.name());
    obj.set_label(&self.keys.stage, &ctx.stage.name);
    obj.set_label(&self.keys.template, template.name());
    obj.set_annotation(&self.keys.rendered_hash, &hash);

    event!(Level::TRACE, stage = %ctx.stage.name, template = %template.name(), %hash, "Template rendered.");
    Ok(obj)
  }

  /// Submits a stamped object.
  ///
  /// Mutable objects are created when absent, left alone when the stored
  /// rendered-hash matches, and replaced otherwise. Immutable objects
  /// (`generateName`) reuse an owned object with the same hash or get a new
  /// one.
  #[instrument(
    name = "Stamper::apply",
    skip_all,
    fields(kind = ?obj.kind(), name = ?obj.name(), generate_name = ?obj.generate_name()),
    err(Display)
  )]
  pub async fn apply(
    &self,
    store: &dyn ClusterStore,
    obj: UnstructuredObject,
    immutable: bool,
  ) -> Result<Applied, ApplyError> {
    if immutable {
      return self.apply_immutable(store, obj).await;
    }

    let key = obj.key().ok_or_else(|| {
      ApplyError::Rejected(ClusterError::Malformed {
        message: "stamped object has no name".to_string(),
      })
    })?;
    let existing = store.get(&key).await.map_err(ApplyError::Lookup)?;

    let live = match existing {
      Some(current) if self.same_rendering(&current, &obj) => {
        event!(Level::DEBUG, object = %key, "Rendered body unchanged, skipping write.");
        return Ok(Applied {
          live: current,
          written: false,
          history: Vec::new(),
        });
      }
      Some(_) => {
        event!(Level::DEBUG, object = %key, "Updating stamped object.");
        store.update(obj).await.map_err(ApplyError::Rejected)?
      }
      None => {
        event!(Level::DEBUG, object = %key, "Creating stamped object.");
        store.create(obj).await.map_err(ApplyError::Rejected)?
      }
    };
    Ok(Applied {
      live,
      written: true,
      history: Vec::new(),
    })
  }

  async fn apply_immutable(&self, store: &dyn ClusterStore, obj: UnstructuredObject) -> Result<Applied, ApplyError> {
    let kind = obj.kind().ok_or_else(|| {
      ApplyError::Rejected(ClusterError::Malformed {
        message: "stamped object has no kind".to_string(),
      })
    })?;
    let mut selector = ListSelector::all();
    if let Some(ns) = obj.namespace() {
      selector = selector.in_namespace(ns);
    }
    if let Some(owner) = obj.controller_owner() {
      selector = selector.owned_by(owner.uid);
    }
    for key in [&self.keys.workload, &self.keys.stage] {
      if let Some(value) = obj.labels().get(key) {
        selector = selector.with_label(key.clone(), value.clone());
      }
    }

    let mut history = store.list(&kind, &selector).await.map_err(ApplyError::ListCreatedObjects)?;
    sort_newest_first(&mut history);

    if let Some(existing) = history.iter().find(|h| self.same_rendering(h, &obj)) {
      event!(Level::DEBUG, object = ?existing.name(), "Matching immutable object exists, reusing it.");
      return Ok(Applied {
        live: existing.clone(),
        written: false,
        history,
      });
    }

    let created = store.create(obj).await.map_err(ApplyError::Rejected)?;
    event!(Level::DEBUG, object = ?created.name(), "Created immutable object.");
    history.insert(0, created.clone());
    Ok(Applied {
      live: created,
      written: true,
      history,
    })
  }

  /// Reads every declared output from the applied object. For immutable
  /// templates, the newest created object whose outputs all resolve wins.
  pub fn retrieve_outputs(&self, template: &Template, applied: &Applied) -> Result<BTreeMap<String, Value>, OutputError> {
    if applied.history.is_empty() {
      return extract_outputs(template, &applied.live);
    }
    let mut newest_err = None;
    for candidate in &applied.history {
      match extract_outputs(template, candidate) {
        Ok(outputs) => return Ok(outputs),
        Err(err @ OutputError::Stamp(_)) => return Err(err),
        Err(err) => {
          newest_err.get_or_insert(err);
        }
      }
    }
    Err(newest_err.unwrap_or(OutputError::NoCompletedObject))
  }

  fn same_rendering(&self, stored: &UnstructuredObject, stamped: &UnstructuredObject) -> bool {
    match (
      stored.annotation(&self.keys.rendered_hash),
      stamped.annotation(&self.keys.rendered_hash),
    ) {
      (Some(a), Some(b)) => a == b,
      _ => false,
    }
  }
}

fn extract_outputs(template: &Template, obj: &UnstructuredObject) -> Result<BTreeMap<String, Value>, OutputError> {
  let mut outputs = BTreeMap::new();
  for (output, raw_path) in template.spec.outputs.declared() {
    let path = JsonPath::parse(raw_path).map_err(|source| StampError::InvalidOutputPath {
      output: output.to_string(),
      path: raw_path.to_string(),
      source,
    })?;
    let value = path.evaluate(obj.as_value()).map_err(|source| OutputError::NotReady {
      output: output.to_string(),
      path: raw_path.to_string(),
      object: obj.name().unwrap_or_default().to_string(),
      source,
    })?;
    outputs.insert(output.to_string(), value.clone());
  }
  Ok(outputs)
}

fn sort_newest_first(objects: &mut [UnstructuredObject]) {
  objects.sort_by(|a, b| {
    b.creation_timestamp()
      .cmp(&a.creation_timestamp())
      .then_with(|| b.resource_version().cmp(&a.resource_version()))
  });
}
