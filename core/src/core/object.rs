// cartograph/src/core/object.rs

//! Structural (untyped) cluster objects.
//!
//! Templates can target arbitrary kinds, so everything the stamper produces or
//! reads back is an `UnstructuredObject`: a JSON map/list/scalar tree keyed by a
//! runtime `ObjectKind` rather than a compiled type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Runtime kind descriptor (`apiVersion` + `kind`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectKind {
  pub api_version: String,
  pub kind: String,
}

impl ObjectKind {
  pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      api_version: api_version.into(),
      kind: kind.into(),
    }
  }
}

impl fmt::Display for ObjectKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.api_version, self.kind)
  }
}

/// Identity of a single object. Cluster-scoped objects have no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
  pub kind: ObjectKind,
  pub namespace: Option<String>,
  pub name: String,
}

impl ObjectKey {
  pub fn new(kind: ObjectKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
    Self {
      kind,
      namespace: namespace.map(str::to_string),
      name: name.into(),
    }
  }
}

impl fmt::Display for ObjectKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.namespace {
      Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
      None => write!(f, "{} {}", self.kind, self.name),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
  pub api_version: String,
  pub kind: String,
  pub name: String,
  pub uid: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub controller: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub block_owner_deletion: Option<bool>,
}

impl OwnerReference {
  pub fn is_controller(&self) -> bool {
    self.controller.unwrap_or(false)
  }

  pub fn owner_kind(&self) -> ObjectKind {
    ObjectKind::new(self.api_version.clone(), self.kind.clone())
  }
}

/// A cluster object held as a generic JSON tree.
///
/// The wrapped value is always a JSON object; constructors coerce anything
/// else into an empty map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnstructuredObject(Value);

impl Default for UnstructuredObject {
  fn default() -> Self {
    UnstructuredObject(Value::Object(Map::new()))
  }
}

impl From<Value> for UnstructuredObject {
  fn from(value: Value) -> Self {
    match value {
      Value::Object(_) => UnstructuredObject(value),
      _ => UnstructuredObject::default(),
    }
  }
}

impl UnstructuredObject {
  pub fn new(kind: &ObjectKind, namespace: Option<&str>, name: &str) -> Self {
    let mut obj = UnstructuredObject::default();
    obj.set_path(&["apiVersion"], Value::String(kind.api_version.clone()));
    obj.set_path(&["kind"], Value::String(kind.kind.clone()));
    obj.set_name(name);
    if let Some(ns) = namespace {
      obj.set_namespace(ns);
    }
    obj
  }

  pub fn as_value(&self) -> &Value {
    &self.0
  }

  pub fn into_value(self) -> Value {
    self.0
  }

  /// Kind descriptor, if both `apiVersion` and `kind` are set.
  pub fn kind(&self) -> Option<ObjectKind> {
    let api_version = self.str_at(&["apiVersion"])?;
    let kind = self.str_at(&["kind"])?;
    Some(ObjectKind::new(api_version, kind))
  }

  pub fn name(&self) -> Option<&str> {
    self.str_at(&["metadata", "name"])
  }

  pub fn generate_name(&self) -> Option<&str> {
    self.str_at(&["metadata", "generateName"])
  }

  pub fn namespace(&self) -> Option<&str> {
    self.str_at(&["metadata", "namespace"])
  }

  pub fn uid(&self) -> Option<&str> {
    self.str_at(&["metadata", "uid"])
  }

  pub fn generation(&self) -> i64 {
    self.get_path(&["metadata", "generation"]).and_then(Value::as_i64).unwrap_or(0)
  }

  pub fn resource_version(&self) -> u64 {
    self
      .str_at(&["metadata", "resourceVersion"])
      .and_then(|rv| rv.parse().ok())
      .unwrap_or(0)
  }

  pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
    let raw = self.str_at(&["metadata", "creationTimestamp"])?;
    DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.with_timezone(&Utc))
  }

  pub fn key(&self) -> Option<ObjectKey> {
    Some(ObjectKey::new(self.kind()?, self.namespace(), self.name()?))
  }

  pub fn labels(&self) -> BTreeMap<String, String> {
    self.string_map_at(&["metadata", "labels"])
  }

  pub fn annotations(&self) -> BTreeMap<String, String> {
    self.string_map_at(&["metadata", "annotations"])
  }

  pub fn annotation(&self, key: &str) -> Option<&str> {
    self.str_at(&["metadata", "annotations", key])
  }

  pub fn owner_references(&self) -> Vec<OwnerReference> {
    self
      .get_path(&["metadata", "ownerReferences"])
      .and_then(|v| serde_json::from_value(v.clone()).ok())
      .unwrap_or_default()
  }

  pub fn controller_owner(&self) -> Option<OwnerReference> {
    self.owner_references().into_iter().find(OwnerReference::is_controller)
  }

  pub fn is_owned_by(&self, owner_uid: &str) -> bool {
    self.owner_references().iter().any(|r| r.uid == owner_uid)
  }

  pub fn spec(&self) -> Option<&Value> {
    self.get_path(&["spec"])
  }

  pub fn status(&self) -> Option<&Value> {
    self.get_path(&["status"])
  }

  pub fn set_name(&mut self, name: &str) {
    self.set_path(&["metadata", "name"], Value::String(name.to_string()));
  }

  pub fn set_namespace(&mut self, namespace: &str) {
    self.set_path(&["metadata", "namespace"], Value::String(namespace.to_string()));
  }

  pub fn set_label(&mut self, key: &str, value: &str) {
    self.set_path(&["metadata", "labels", key], Value::String(value.to_string()));
  }

  pub fn set_annotation(&mut self, key: &str, value: &str) {
    self.set_path(&["metadata", "annotations", key], Value::String(value.to_string()));
  }

  /// Replaces the owner references with a single controller reference.
  pub fn set_controller_owner(&mut self, owner: OwnerReference) {
    let refs = serde_json::to_value(vec![owner]).unwrap_or(Value::Array(Vec::new()));
    self.set_path(&["metadata", "ownerReferences"], refs);
  }

  pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
    path.iter().try_fold(&self.0, |current, segment| current.get(*segment))
  }

  /// Sets `value` at `path`, creating intermediate maps. A non-map value
  /// found on the way is replaced.
  pub fn set_path(&mut self, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
      return;
    };
    let mut current = &mut self.0;
    for segment in parents {
      if !current.is_object() {
        *current = Value::Object(Map::new());
      }
      current = match current {
        Value::Object(map) => map.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new())),
        _ => return,
      };
    }
    if !current.is_object() {
      *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
      map.insert(last.to_string(), value);
    }
  }

  pub fn remove_path(&mut self, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut current = &mut self.0;
    for segment in parents {
      current = current.get_mut(*segment)?;
    }
    current.as_object_mut()?.remove(*last)
  }

  fn str_at(&self, path: &[&str]) -> Option<&str> {
    self.get_path(path).and_then(Value::as_str)
  }

  fn string_map_at(&self, path: &[&str]) -> BTreeMap<String, String> {
    match self.get_path(path) {
      Some(Value::Object(map)) => map
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect(),
      _ => BTreeMap::new(),
    }
  }
}
