// cartograph/src/api/mod.rs

//! Typed resources the engine reads: templates, pipelines and the workloads
//! that own a reconcile pass. All of them are stored as structural objects in
//! the cluster store and converted through the `Resource` trait.

pub mod admission;
pub mod pipeline;
pub mod template;
pub mod workload;

pub use admission::{Validate, ValidationError};
pub use pipeline::{Pipeline, PipelineSpec, Stage, StageInput, StageParam, TemplateRef};
pub use template::{Template, TemplateOutputs, TemplateParam, TemplateSpec};
pub use workload::{GitRef, GitSource, OwnerParam, OwnerStatus, Workload, WorkloadSource, WorkloadSpec};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::meta::ObjectMeta;
use crate::core::object::{ObjectKind, UnstructuredObject};

pub const API_VERSION: &str = "cartograph.dev/v1alpha1";

pub trait Resource: Serialize + DeserializeOwned {
  const KIND: &'static str;

  fn object_kind() -> ObjectKind {
    ObjectKind::new(API_VERSION, Self::KIND)
  }

  fn metadata(&self) -> &ObjectMeta;

  fn to_object(&self) -> Result<UnstructuredObject, serde_json::Error> {
    let mut obj = UnstructuredObject::from(serde_json::to_value(self)?);
    obj.set_path(&["apiVersion"], Value::String(API_VERSION.to_string()));
    obj.set_path(&["kind"], Value::String(Self::KIND.to_string()));
    Ok(obj)
  }

  fn from_object(obj: &UnstructuredObject) -> Result<Self, serde_json::Error> {
    serde_json::from_value(obj.as_value().clone())
  }
}
