// src/lib.rs

//! Cartograph: template stamping and pipeline reconciliation for a cluster
//! control plane.
//!
//! A workload selects a pipeline by its labels. Each stage of the pipeline
//! names a template; the template is rendered against the workload, its
//! params and the outputs of earlier stages, submitted to the cluster, and
//! the declared outputs are read back from the live object's status to feed
//! the stages that follow.
//!
//!  - `template`: param resolution, `$(...)$` interpolation and stamping.
//!  - `realizer`: walks the stages in order and stops at the first blocked one.
//!  - `conditions`: turns realize failures into a stable condition list.
//!  - `tracker`: watches every stamped kind exactly once.
//!  - `reconciler`: one pass from workload to status write.

pub mod api;
pub mod cluster;
pub mod conditions;
pub mod config;
pub mod core;
pub mod error;
pub mod realizer;
pub mod reconciler;
pub mod template;
pub mod tracker;

// --- Re-exports for the Public API ---

pub use crate::api::{Pipeline, Resource, Stage, StageInput, StageParam, Template, TemplateOutputs, Validate, Workload};
pub use crate::cluster::{ClusterStore, EventHandler, InMemoryStore, ListSelector, Repository, WatchRegistrar};
pub use crate::conditions::ConditionManager;
pub use crate::config::{ConfigError, ControllerConfig};
pub use crate::core::{
  Condition, ConditionStatus, ObjectKey, ObjectKind, ReconcileOutcome, ReconcileRequest, UnstructuredObject,
};
pub use crate::error::{
  Cancelled, ClusterError, ErrorClass, RealizeError, ReconcileError, ReconcileResult, StampError, TrackError,
};
pub use crate::realizer::{RealizeOutcome, Realizer};
pub use crate::reconciler::Reconciler;
pub use crate::template::{Stamper, TagInterpolator};
pub use crate::tracker::{DynamicTracker, EnqueueRequestForOwner};

pub use tokio_util::sync::CancellationToken;
