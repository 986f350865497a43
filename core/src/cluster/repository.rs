// cartograph/src/cluster/repository.rs

//! Typed access to the resources the reconciler reads and writes.

use std::sync::Arc;
use tracing::{event, instrument, Level};

use crate::api::{Pipeline, Resource, Template, Workload};
use crate::cluster::store::{ClusterStore, ListSelector};
use crate::core::object::ObjectKey;
use crate::error::{ClusterError, ClusterResult};

#[derive(Clone)]
pub struct Repository {
  store: Arc<dyn ClusterStore>,
}

impl Repository {
  pub fn new(store: Arc<dyn ClusterStore>) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &dyn ClusterStore {
    self.store.as_ref()
  }

  /// Fetches and decodes a resource; `Ok(None)` when it does not exist.
  pub async fn get<R: Resource>(&self, namespace: Option<&str>, name: &str) -> ClusterResult<Option<R>> {
    let key = ObjectKey::new(R::object_kind(), namespace, name);
    match self.store.get(&key).await? {
      Some(obj) => R::from_object(&obj).map(Some).map_err(|e| decode_error(&key, e)),
      None => Ok(None),
    }
  }

  pub async fn get_workload(&self, namespace: &str, name: &str) -> ClusterResult<Option<Workload>> {
    self.get(Some(namespace), name).await
  }

  pub async fn get_template(&self, name: &str) -> ClusterResult<Option<Template>> {
    self.get(None, name).await
  }

  #[instrument(name = "Repository::list_pipelines", skip_all, err(Display))]
  pub async fn list_pipelines(&self) -> ClusterResult<Vec<Pipeline>> {
    let kind = Pipeline::object_kind();
    let objects = self.store.list(&kind, &ListSelector::all()).await?;
    let mut pipelines = Vec::with_capacity(objects.len());
    for obj in &objects {
      match Pipeline::from_object(obj) {
        Ok(p) => pipelines.push(p),
        Err(e) => {
          // A single undecodable pipeline must not hide the others.
          event!(Level::WARN, object = ?obj.name(), error = %e, "Skipping undecodable pipeline.");
        }
      }
    }
    Ok(pipelines)
  }

  /// Creates the resource, or replaces the stored one when it exists.
  /// Returns the resource as stored.
  #[instrument(name = "Repository::apply_resource", skip_all, fields(kind = R::KIND, name = %resource.metadata().name), err(Display))]
  pub async fn apply_resource<R: Resource>(&self, resource: &R) -> ClusterResult<R> {
    let obj = resource.to_object().map_err(|e| ClusterError::Malformed { message: e.to_string() })?;
    let key = obj.key().ok_or_else(|| ClusterError::Malformed {
      message: format!("{} has no name", R::KIND),
    })?;
    let stored = match self.store.get(&key).await? {
      Some(_) => self.store.update(obj).await?,
      None => self.store.create(obj).await?,
    };
    R::from_object(&stored).map_err(|e| decode_error(&key, e))
  }

  /// Writes the workload's `status` block only.
  pub async fn update_workload_status(&self, workload: &Workload) -> ClusterResult<()> {
    let obj = workload.to_object().map_err(|e| ClusterError::Malformed { message: e.to_string() })?;
    self.store.update_status(obj).await.map(|_| ())
  }
}

fn decode_error(key: &ObjectKey, err: serde_json::Error) -> ClusterError {
  ClusterError::Malformed {
    message: format!("decode {}: {}", key, err),
  }
}
