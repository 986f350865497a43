// cartograph/src/template/params.rs

//! Resolution of the `params` a template body can reference.

use serde_json::{Map, Value};

use crate::api::{Pipeline, Stage, StageParam, Template, Workload};

/// Resolves every parameter the template declares.
///
/// Precedence per parameter: a fixed `value` on the stage (or the pipeline),
/// then the workload's param, then the stage/pipeline `default`, then the
/// template's own default. Stage entries shadow pipeline entries. A `null`
/// at any level counts as unset and falls through to the next one.
/// Parameters that resolve to nothing are left out, so a body referencing
/// them fails to render.
pub fn resolve_params(template: &Template, pipeline: &Pipeline, stage: &Stage, workload: &Workload) -> Map<String, Value> {
  let mut resolved = Map::new();
  for declared in &template.spec.params {
    let name = declared.name.as_str();
    let override_entry = find(&stage.params, name).or_else(|| find(&pipeline.spec.params, name));
    let value = match override_entry {
      Some(StageParam { value: Some(fixed), .. }) if !fixed.is_null() => Some(fixed),
      Some(StageParam { default, .. }) => set(workload.param(name)).or(set(default.as_ref())),
      None => set(workload.param(name)),
    }
    .or(set(declared.default.as_ref()));

    if let Some(value) = value {
      resolved.insert(name.to_string(), value.clone());
    }
  }
  resolved
}

fn set(value: Option<&Value>) -> Option<&Value> {
  value.filter(|v| !v.is_null())
}

fn find<'p>(params: &'p [StageParam], name: &str) -> Option<&'p StageParam> {
  params.iter().find(|p| p.name == name)
}
