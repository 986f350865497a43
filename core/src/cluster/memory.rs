// cartograph/src/cluster/memory.rs

//! An in-process cluster store and watch registrar.
//!
//! Behaves like the API server where the engine cares: server-assigned uids,
//! generations and resource versions, replacing updates that preserve `status`,
//! `generateName`, and owner-based listing. Faults can be injected per kind.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{event, Level};

use crate::cluster::store::{ClusterStore, EventHandler, ListSelector, WatchRegistrar};
use crate::core::control::ReconcileRequest;
use crate::core::object::{ObjectKey, ObjectKind, UnstructuredObject};
use crate::error::{ClusterError, ClusterResult};

#[derive(Default)]
struct Faults {
  rejected_kinds: HashMap<ObjectKind, String>,
  failing_lists: HashSet<ObjectKind>,
  failing_watches: HashSet<ObjectKind>,
  failing_status_updates: bool,
}

#[derive(Default)]
pub struct InMemoryStore {
  objects: RwLock<BTreeMap<ObjectKey, UnstructuredObject>>,
  resource_version: AtomicU64,
  writes: AtomicUsize,
  faults: Mutex<Faults>,
  watches: Mutex<Vec<(ObjectKind, Arc<dyn EventHandler>)>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts or replaces an object outside the write path, assigning server
  /// fields as needed. The generation moves when `spec` changes.
  pub fn seed(&self, obj: UnstructuredObject) -> ClusterResult<UnstructuredObject> {
    let key = obj.key().ok_or_else(|| malformed(&obj))?;
    let mut objects = self.objects.write();
    let stored = match objects.get(&key) {
      Some(existing) => {
        let mut next = obj;
        carry_server_fields(existing, &mut next);
        if existing.spec() != next.spec() {
          bump_generation(&mut next, existing.generation());
        }
        self.stamp_version(&mut next);
        next
      }
      None => self.initialize(obj),
    };
    objects.insert(key, stored.clone());
    Ok(stored)
  }

  /// Sets `status` on a stored object, as another controller would.
  pub fn set_status(&self, key: &ObjectKey, status: Value) -> ClusterResult<UnstructuredObject> {
    let mut objects = self.objects.write();
    let obj = objects.get_mut(key).ok_or_else(|| ClusterError::NotFound { key: key.clone() })?;
    obj.set_path(&["status"], status);
    self.stamp_version(obj);
    Ok(obj.clone())
  }

  pub fn object(&self, key: &ObjectKey) -> Option<UnstructuredObject> {
    self.objects.read().get(key).cloned()
  }

  pub fn objects_of_kind(&self, kind: &ObjectKind) -> Vec<UnstructuredObject> {
    self
      .objects
      .read()
      .iter()
      .filter(|(key, _)| &key.kind == kind)
      .map(|(_, obj)| obj.clone())
      .collect()
  }

  /// Number of create/update/update_status calls that reached storage.
  pub fn write_count(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }

  pub fn reject_kind(&self, kind: ObjectKind, message: impl Into<String>) {
    self.faults.lock().rejected_kinds.insert(kind, message.into());
  }

  pub fn fail_lists(&self, kind: ObjectKind) {
    self.faults.lock().failing_lists.insert(kind);
  }

  pub fn fail_watches(&self, kind: ObjectKind) {
    self.faults.lock().failing_watches.insert(kind);
  }

  pub fn fail_status_updates(&self, failing: bool) {
    self.faults.lock().failing_status_updates = failing;
  }

  pub fn clear_faults(&self) {
    *self.faults.lock() = Faults::default();
  }

  pub fn watch_count(&self, kind: &ObjectKind) -> usize {
    self.watches.lock().iter().filter(|(k, _)| k == kind).count()
  }

  /// Delivers a change event for `obj` to every handler watching its kind.
  pub fn dispatch(&self, obj: &UnstructuredObject) -> Vec<ReconcileRequest> {
    let Some(kind) = obj.kind() else {
      return Vec::new();
    };
    let handlers: Vec<Arc<dyn EventHandler>> = self
      .watches
      .lock()
      .iter()
      .filter(|(k, _)| *k == kind)
      .map(|(_, h)| h.clone())
      .collect();
    handlers.iter().flat_map(|h| h.requests_for(obj)).collect()
  }

  fn initialize(&self, mut obj: UnstructuredObject) -> UnstructuredObject {
    if obj.uid().is_none() {
      obj.set_path(&["metadata", "uid"], Value::String(uuid::Uuid::new_v4().to_string()));
    }
    obj.set_path(&["metadata", "generation"], Value::from(1));
    obj.set_path(
      &["metadata", "creationTimestamp"],
      Value::String(Utc::now().to_rfc3339()),
    );
    self.stamp_version(&mut obj);
    obj
  }

  fn stamp_version(&self, obj: &mut UnstructuredObject) {
    let rv = self.resource_version.fetch_add(1, Ordering::SeqCst) + 1;
    obj.set_path(&["metadata", "resourceVersion"], Value::String(rv.to_string()));
  }

  fn check_rejection(&self, obj: &UnstructuredObject, key: &ObjectKey) -> ClusterResult<()> {
    match obj.kind().and_then(|kind| self.faults.lock().rejected_kinds.get(&kind).cloned()) {
      Some(message) => Err(ClusterError::Rejected {
        key: key.clone(),
        message,
      }),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
  async fn get(&self, key: &ObjectKey) -> ClusterResult<Option<UnstructuredObject>> {
    Ok(self.objects.read().get(key).cloned())
  }

  async fn create(&self, mut obj: UnstructuredObject) -> ClusterResult<UnstructuredObject> {
    if obj.name().is_none() {
      if let Some(prefix) = obj.generate_name().map(str::to_string) {
        let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(5).collect();
        obj.set_name(&format!("{}{}", prefix, suffix));
      }
    }
    let key = obj.key().ok_or_else(|| malformed(&obj))?;
    self.check_rejection(&obj, &key)?;

    let mut objects = self.objects.write();
    if objects.contains_key(&key) {
      return Err(ClusterError::AlreadyExists { key });
    }
    obj.remove_path(&["status"]);
    let stored = self.initialize(obj);
    objects.insert(key.clone(), stored.clone());
    self.writes.fetch_add(1, Ordering::SeqCst);
    event!(Level::TRACE, object = %key, "Object created.");
    Ok(stored)
  }

  async fn update(&self, mut obj: UnstructuredObject) -> ClusterResult<UnstructuredObject> {
    let key = obj.key().ok_or_else(|| malformed(&obj))?;
    self.check_rejection(&obj, &key)?;

    let mut objects = self.objects.write();
    let existing = objects.get(&key).ok_or_else(|| ClusterError::NotFound { key: key.clone() })?;
    obj.remove_path(&["status"]);
    carry_server_fields(existing, &mut obj);
    if let Some(status) = existing.status() {
      obj.set_path(&["status"], status.clone());
    }
    if existing.spec() != obj.spec() {
      bump_generation(&mut obj, existing.generation());
    }
    self.stamp_version(&mut obj);
    objects.insert(key.clone(), obj.clone());
    self.writes.fetch_add(1, Ordering::SeqCst);
    event!(Level::TRACE, object = %key, "Object updated.");
    Ok(obj)
  }

  async fn list(&self, kind: &ObjectKind, selector: &ListSelector) -> ClusterResult<Vec<UnstructuredObject>> {
    if self.faults.lock().failing_lists.contains(kind) {
      return Err(ClusterError::Transport {
        source: anyhow::anyhow!("list {} refused", kind),
      });
    }
    Ok(
      self
        .objects
        .read()
        .iter()
        .filter(|(key, obj)| &key.kind == kind && selector.matches(obj))
        .map(|(_, obj)| obj.clone())
        .collect(),
    )
  }

  async fn update_status(&self, obj: UnstructuredObject) -> ClusterResult<UnstructuredObject> {
    let key = obj.key().ok_or_else(|| malformed(&obj))?;
    if self.faults.lock().failing_status_updates {
      return Err(ClusterError::Transport {
        source: anyhow::anyhow!("status update for {} refused", key),
      });
    }
    let mut objects = self.objects.write();
    let existing = objects.get_mut(&key).ok_or_else(|| ClusterError::NotFound { key: key.clone() })?;
    existing.set_path(&["status"], obj.status().cloned().unwrap_or(Value::Null));
    self.stamp_version(existing);
    self.writes.fetch_add(1, Ordering::SeqCst);
    Ok(existing.clone())
  }
}

impl WatchRegistrar for InMemoryStore {
  fn watch(&self, kind: &ObjectKind, handler: Arc<dyn EventHandler>) -> ClusterResult<()> {
    if self.faults.lock().failing_watches.contains(kind) {
      return Err(ClusterError::Transport {
        source: anyhow::anyhow!("no informer available for {}", kind),
      });
    }
    self.watches.lock().push((kind.clone(), handler));
    Ok(())
  }
}

fn malformed(obj: &UnstructuredObject) -> ClusterError {
  ClusterError::Malformed {
    message: format!("apiVersion, kind and metadata.name are required: {}", obj.as_value()),
  }
}

fn bump_generation(obj: &mut UnstructuredObject, previous: i64) {
  obj.set_path(&["metadata", "generation"], Value::from(previous + 1));
}

/// Keeps server-owned metadata of `existing` on a replacement object.
fn carry_server_fields(existing: &UnstructuredObject, next: &mut UnstructuredObject) {
  for field in ["uid", "generation", "creationTimestamp"] {
    if let Some(value) = existing.get_path(&["metadata", field]) {
      next.set_path(&["metadata", field], value.clone());
    }
  }
}
