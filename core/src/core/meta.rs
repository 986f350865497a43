// cartograph/src/core/meta.rs

//! Object metadata shared by the typed API resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::object::OwnerReference;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub namespace: Option<String>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub uid: String,
  #[serde(default)]
  pub generation: i64,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub annotations: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resource_version: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      namespace: Some(namespace.into()),
      ..Default::default()
    }
  }

  pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    self.labels.extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
    self
  }
}
