// cartograph/src/api/workload.rs

//! The workload: the user-authored resource whose reconciliation drives a pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::{Resource, API_VERSION};
use crate::core::condition::Condition;
use crate::core::control::ReconcileRequest;
use crate::core::meta::ObjectMeta;
use crate::core::object::OwnerReference;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
  pub metadata: ObjectMeta,
  #[serde(default)]
  pub spec: WorkloadSpec,
  #[serde(default)]
  pub status: OwnerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub params: Vec<OwnerParam>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<WorkloadSource>,
  /// Prebuilt image, used instead of building from `source`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub service_account_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerParam {
  pub name: String,
  pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSource {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub git: Option<GitSource>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subpath: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSource {
  pub url: String,
  #[serde(rename = "ref", default)]
  pub git_ref: GitRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitRef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tag: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub commit: Option<String>,
}

/// Written only by the reconciler's status step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStatus {
  #[serde(default)]
  pub conditions: Vec<Condition>,
  #[serde(default)]
  pub observed_generation: i64,
  /// `stage.output` → value, as computed by the last status write.
  #[serde(default)]
  pub outputs: BTreeMap<String, Value>,
}

impl Workload {
  pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      metadata: ObjectMeta::namespaced(namespace, name),
      spec: WorkloadSpec::default(),
      status: OwnerStatus::default(),
    }
  }

  pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    self.metadata = self.metadata.with_labels(labels);
    self
  }

  pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
    self.spec.params.push(OwnerParam {
      name: name.into(),
      value,
    });
    self
  }

  pub fn name(&self) -> &str {
    &self.metadata.name
  }

  pub fn namespace(&self) -> &str {
    self.metadata.namespace.as_deref().unwrap_or_default()
  }

  pub fn param(&self, name: &str) -> Option<&Value> {
    self.spec.params.iter().find(|p| p.name == name).map(|p| &p.value)
  }

  pub fn request(&self) -> ReconcileRequest {
    ReconcileRequest::new(self.namespace(), self.name())
  }

  /// Controller reference placed on every object stamped for this workload.
  pub fn owner_reference(&self) -> OwnerReference {
    OwnerReference {
      api_version: API_VERSION.to_string(),
      kind: Self::KIND.to_string(),
      name: self.metadata.name.clone(),
      uid: self.metadata.uid.clone(),
      controller: Some(true),
      block_owner_deletion: Some(true),
    }
  }
}

impl Resource for Workload {
  const KIND: &'static str = "Workload";

  fn metadata(&self) -> &ObjectMeta {
    &self.metadata
  }
}
