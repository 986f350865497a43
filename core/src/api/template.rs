// cartograph/src/api/template.rs

//! Templates: parameterized blueprints for concrete cluster objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::Resource;
use crate::core::meta::ObjectMeta;
use crate::error::StampError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
  pub metadata: ObjectMeta,
  pub spec: TemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
  /// Raw body; may still contain `$(...)$` references.
  pub template: Value,
  #[serde(default)]
  pub params: Vec<TemplateParam>,
  #[serde(default)]
  pub outputs: TemplateOutputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParam {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
}

/// Which values a template exposes, read from the status of the object it
/// renders. Kind-specific variants fix the output names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateOutputs {
  #[default]
  None,
  Source {
    #[serde(rename = "urlPath")]
    url_path: String,
    #[serde(rename = "revisionPath")]
    revision_path: String,
  },
  Image {
    #[serde(rename = "imagePath")]
    image_path: String,
  },
  Config {
    #[serde(rename = "configPath")]
    config_path: String,
  },
  Generic {
    #[serde(default)]
    outputs: BTreeMap<String, String>,
  },
}

impl TemplateOutputs {
  /// `(output name, path)` pairs in a stable order.
  pub fn declared(&self) -> Vec<(&str, &str)> {
    match self {
      TemplateOutputs::None => Vec::new(),
      TemplateOutputs::Source {
        url_path,
        revision_path,
      } => vec![("url", url_path.as_str()), ("revision", revision_path.as_str())],
      TemplateOutputs::Image { image_path } => vec![("image", image_path.as_str())],
      TemplateOutputs::Config { config_path } => vec![("config", config_path.as_str())],
      TemplateOutputs::Generic { outputs } => outputs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
    }
  }
}

impl Template {
  pub fn new(name: impl Into<String>, body: Value) -> Self {
    Self {
      metadata: ObjectMeta::named(name),
      spec: TemplateSpec {
        template: body,
        params: Vec::new(),
        outputs: TemplateOutputs::None,
      },
    }
  }

  pub fn with_param(mut self, name: impl Into<String>, default: Option<Value>) -> Self {
    self.spec.params.push(TemplateParam {
      name: name.into(),
      default,
    });
    self
  }

  pub fn with_outputs(mut self, outputs: TemplateOutputs) -> Self {
    self.spec.outputs = outputs;
    self
  }

  pub fn name(&self) -> &str {
    &self.metadata.name
  }

  /// Bodies naming their object through `generateName` only are stamped as
  /// a fresh object per distinct rendering instead of being updated in place.
  pub fn is_immutable(&self) -> bool {
    let metadata = self.spec.template.get("metadata");
    let has = |field: &str| metadata.and_then(|m| m.get(field)).map_or(false, |v| !v.is_null());
    has("generateName") && !has("name")
  }
}

impl Resource for Template {
  const KIND: &'static str = "ClusterTemplate";

  fn metadata(&self) -> &ObjectMeta {
    &self.metadata
  }
}

/// Invariants every template body must satisfy, both when admitted and once
/// rendered: no authored namespace and a non-empty `spec`.
pub fn check_body(body: &Value) -> Result<(), StampError> {
  let has_namespace = body
    .get("metadata")
    .and_then(|m| m.get("namespace"))
    .map_or(false, |ns| !ns.is_null());
  if has_namespace {
    return Err(StampError::NamespaceSet);
  }

  let spec_present = match body.get("spec") {
    None | Some(Value::Null) => false,
    Some(Value::Object(map)) => !map.is_empty(),
    Some(Value::Array(items)) => !items.is_empty(),
    Some(Value::String(s)) => !s.is_empty(),
    Some(_) => true,
  };
  if !spec_present {
    return Err(StampError::MissingSpec {
      rendered: body.to_string(),
    });
  }
  Ok(())
}
