// cartograph/src/api/pipeline.rs

//! Pipelines: ordered stages, each bound to one template.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::Resource;
use crate::core::meta::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
  pub metadata: ObjectMeta,
  pub spec: PipelineSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
  /// Labels a workload must carry for this pipeline to be selected.
  #[serde(default)]
  pub selector: BTreeMap<String, String>,
  /// Parameters applied to every stage; stage-level entries win.
  #[serde(default)]
  pub params: Vec<StageParam>,
  pub stages: Vec<Stage>,
}

/// One node of a pipeline. Declared order is evaluation order: inputs may only
/// reference stages declared earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
  pub name: String,
  pub template_ref: TemplateRef,
  #[serde(default)]
  pub params: Vec<StageParam>,
  #[serde(default)]
  pub inputs: Vec<StageInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
  pub name: String,
}

/// A parameter override. `value` is fixed; `default` may be overridden by a
/// workload param of the same name. Admission requires exactly one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageParam {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
}

impl StageParam {
  pub fn fixed(name: impl Into<String>, value: Value) -> Self {
    Self {
      name: name.into(),
      value: Some(value),
      default: None,
    }
  }

  pub fn overridable(name: impl Into<String>, default: Value) -> Self {
    Self {
      name: name.into(),
      value: None,
      default: Some(default),
    }
  }
}

/// Reference to an output of an earlier stage, exposed to templates as
/// `inputs.<name>`. Without `output`, every output of that stage is exposed
/// as a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInput {
  pub name: String,
  pub stage: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
}

impl Stage {
  pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      template_ref: TemplateRef { name: template.into() },
      params: Vec::new(),
      inputs: Vec::new(),
    }
  }

  pub fn with_param(mut self, param: StageParam) -> Self {
    self.params.push(param);
    self
  }

  pub fn with_input(mut self, name: impl Into<String>, stage: impl Into<String>, output: Option<&str>) -> Self {
    self.inputs.push(StageInput {
      name: name.into(),
      stage: stage.into(),
      output: output.map(str::to_string),
    });
    self
  }
}

impl Pipeline {
  pub fn new<K, V>(name: impl Into<String>, selector: impl IntoIterator<Item = (K, V)>, stages: Vec<Stage>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      metadata: ObjectMeta::named(name),
      spec: PipelineSpec {
        selector: selector.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        params: Vec::new(),
        stages,
      },
    }
  }

  pub fn name(&self) -> &str {
    &self.metadata.name
  }

  /// A pipeline with an empty selector never matches.
  pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
    !self.spec.selector.is_empty() && self.spec.selector.iter().all(|(k, v)| labels.get(k) == Some(v))
  }

  pub fn stage(&self, name: &str) -> Option<&Stage> {
    self.spec.stages.iter().find(|s| s.name == name)
  }
}

impl Resource for Pipeline {
  const KIND: &'static str = "ClusterPipeline";

  fn metadata(&self) -> &ObjectMeta {
    &self.metadata
  }
}
