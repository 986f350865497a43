// cartograph/src/cluster/store.rs

//! Capabilities the engine needs from the cluster API. Everything is keyed by
//! a runtime `ObjectKind`, never by a compiled type.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::control::ReconcileRequest;
use crate::core::object::{ObjectKey, ObjectKind, UnstructuredObject};
use crate::error::ClusterResult;

/// Read/write access to cluster objects.
#[async_trait]
pub trait ClusterStore: Send + Sync {
  /// Returns `Ok(None)` when the object does not exist.
  async fn get(&self, key: &ObjectKey) -> ClusterResult<Option<UnstructuredObject>>;

  /// Creates the object. Objects without a name but with
  /// `metadata.generateName` receive a generated name.
  async fn create(&self, obj: UnstructuredObject) -> ClusterResult<UnstructuredObject>;

  /// Replaces the stored object with `obj`. Only `status` and the
  /// server-owned metadata (uid, generation, creation timestamp, resource
  /// version) survive; `status` is never written through this call.
  async fn update(&self, obj: UnstructuredObject) -> ClusterResult<UnstructuredObject>;

  async fn list(&self, kind: &ObjectKind, selector: &ListSelector) -> ClusterResult<Vec<UnstructuredObject>>;

  /// Replaces only the `status` of the stored object.
  async fn update_status(&self, obj: UnstructuredObject) -> ClusterResult<UnstructuredObject>;
}

/// Maps a change on a watched object to the reconcile requests it should
/// trigger.
pub trait EventHandler: Send + Sync {
  fn requests_for(&self, obj: &UnstructuredObject) -> Vec<ReconcileRequest>;
}

/// Starts delivering change events for a kind to a handler.
pub trait WatchRegistrar: Send + Sync {
  fn watch(&self, kind: &ObjectKind, handler: Arc<dyn EventHandler>) -> ClusterResult<()>;
}

/// Filter for `ClusterStore::list`. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSelector {
  pub namespace: Option<String>,
  pub owner_uid: Option<String>,
  pub labels: BTreeMap<String, String>,
}

impl ListSelector {
  pub fn all() -> Self {
    Self::default()
  }

  pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
    self.namespace = Some(namespace.into());
    self
  }

  pub fn owned_by(mut self, owner_uid: impl Into<String>) -> Self {
    self.owner_uid = Some(owner_uid.into());
    self
  }

  pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.labels.insert(key.into(), value.into());
    self
  }

  pub fn matches(&self, obj: &UnstructuredObject) -> bool {
    if let Some(ns) = &self.namespace {
      if obj.namespace() != Some(ns.as_str()) {
        return false;
      }
    }
    if let Some(uid) = &self.owner_uid {
      if !obj.is_owned_by(uid) {
        return false;
      }
    }
    let labels = obj.labels();
    self.labels.iter().all(|(k, v)| labels.get(k) == Some(v))
  }
}
