// cartograph/src/tracker.rs

//! Lazy, once-per-kind watch registration for stamped objects.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{event, instrument, Level};

use crate::cluster::store::{EventHandler, WatchRegistrar};
use crate::core::control::ReconcileRequest;
use crate::core::object::{ObjectKind, UnstructuredObject};
use crate::error::TrackError;

/// Registers a watch the first time a kind is seen and never again.
///
/// Templates may target any kind, so the set of watched kinds grows at
/// runtime. The set is the only state shared between concurrent passes; it
/// stays locked across the registration call so two passes seeing a new kind
/// at once register it exactly once.
pub struct DynamicTracker {
  registrar: Arc<dyn WatchRegistrar>,
  watched: Mutex<HashSet<ObjectKind>>,
}

impl DynamicTracker {
  pub fn new(registrar: Arc<dyn WatchRegistrar>) -> Self {
    Self {
      registrar,
      watched: Mutex::new(HashSet::new()),
    }
  }

  /// Ensures `kind` is watched. Returns `true` when this call registered it.
  /// A failed registration leaves the kind unwatched so a later pass retries.
  #[instrument(name = "DynamicTracker::watch", skip_all, fields(kind = %kind), err(Display))]
  pub fn watch(&self, kind: &ObjectKind, handler: Arc<dyn EventHandler>) -> Result<bool, TrackError> {
    let mut watched = self.watched.lock();
    if watched.contains(kind) {
      return Ok(false);
    }
    self
      .registrar
      .watch(kind, handler)
      .map_err(|source| TrackError::Registration {
        kind: kind.clone(),
        source,
      })?;
    watched.insert(kind.clone());
    event!(Level::INFO, "Watch registered.");
    Ok(true)
  }

  pub fn is_watching(&self, kind: &ObjectKind) -> bool {
    self.watched.lock().contains(kind)
  }

  pub fn watched_kinds(&self) -> Vec<ObjectKind> {
    let mut kinds: Vec<ObjectKind> = self.watched.lock().iter().cloned().collect();
    kinds.sort();
    kinds
  }
}

/// Maps a change on a stamped object to a request for its controlling owner.
#[derive(Debug, Clone)]
pub struct EnqueueRequestForOwner {
  pub owner_kind: ObjectKind,
}

impl EnqueueRequestForOwner {
  pub fn new(owner_kind: ObjectKind) -> Self {
    Self { owner_kind }
  }
}

impl EventHandler for EnqueueRequestForOwner {
  fn requests_for(&self, obj: &UnstructuredObject) -> Vec<ReconcileRequest> {
    let (Some(owner), Some(namespace)) = (obj.controller_owner(), obj.namespace()) else {
      return Vec::new();
    };
    if owner.owner_kind() != self.owner_kind {
      return Vec::new();
    }
    vec![ReconcileRequest::new(namespace, owner.name)]
  }
}
