// cartograph/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::core::object::{ObjectKey, ObjectKind};
use crate::template::interpolate::InterpolationError;
use crate::template::path::PathError;

/// Failures surfaced by a `ClusterStore`. A missing object is not an error
/// for `get`, which returns `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum ClusterError {
  #[error("object not found: {key}")]
  NotFound { key: ObjectKey },

  #[error("object {key} already exists")]
  AlreadyExists { key: ObjectKey },

  #[error("object {key} rejected by the API server: {message}")]
  Rejected { key: ObjectKey, message: String },

  #[error("object is missing identity fields: {message}")]
  Malformed { message: String },

  #[error("cluster request failed: {source}")]
  Transport {
    #[source]
    source: AnyhowError,
  },
}

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Rendering a template into a concrete object failed.
#[derive(Debug, Error)]
pub enum StampError {
  #[error("interpolate template: {0}")]
  Interpolation(#[from] InterpolationError),

  #[error("template should not set metadata.namespace on the child object")]
  NamespaceSet,

  #[error("object must have a spec; templated object: {rendered}")]
  MissingSpec { rendered: String },

  #[error("object must set apiVersion and kind; templated object: {rendered}")]
  MissingKind { rendered: String },

  #[error("object must set metadata.name or metadata.generateName; templated object: {rendered}")]
  MissingName { rendered: String },

  #[error("output '{output}' has an invalid path '{path}': {source}")]
  InvalidOutputPath {
    output: String,
    path: String,
    #[source]
    source: PathError,
  },
}

/// Submitting a stamped object failed.
#[derive(Debug, Error)]
pub enum ApplyError {
  #[error("read current object: {0}")]
  Lookup(#[source] ClusterError),

  #[error("{0}")]
  Rejected(#[source] ClusterError),

  #[error("list created objects: {0}")]
  ListCreatedObjects(#[source] ClusterError),
}

/// Reading declared outputs from a live object failed.
#[derive(Debug, Error)]
pub enum OutputError {
  #[error("output '{output}' not found at path '{path}' on {object}: {source}")]
  NotReady {
    output: String,
    path: String,
    object: String,
    #[source]
    source: PathError,
  },

  #[error("no object has been created for this stage yet")]
  NoCompletedObject,

  #[error(transparent)]
  Stamp(#[from] StampError),
}

/// Error classes in the order they are discovered and reported. The derived
/// `Ord` is that priority: the smallest class recorded in a pass decides the
/// summary condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorClass {
  TemplateMissing,
  SelectorResolution,
  Stamp,
  SubmissionRejected,
  ListingFailure,
  OutputNotReady,
  Unknown,
}

impl ErrorClass {
  /// Escalated classes are handed back to the framework for backoff; the
  /// rest are absorbed into conditions and wait for a watch or a new
  /// generation.
  pub fn is_escalated(self) -> bool {
    matches!(
      self,
      ErrorClass::TemplateMissing | ErrorClass::SubmissionRejected | ErrorClass::ListingFailure | ErrorClass::Unknown
    )
  }
}

/// Typed failure of one realize pass, naming the stage or template involved.
#[derive(Debug, Error)]
pub enum RealizeError {
  #[error("unable to get template '{template}' for stage '{stage}'")]
  TemplateNotFound { stage: String, template: String },

  #[error("unable to resolve pipeline: {message}")]
  ResolveSelector { message: String },

  #[error("unable to stamp object for stage '{stage}' from template '{template}': {source}")]
  Stamp {
    stage: String,
    template: String,
    #[source]
    source: StampError,
  },

  #[error("unable to apply object for stage '{stage}' from template '{template}': {source}")]
  ApplyRejected {
    stage: String,
    template: String,
    #[source]
    source: ClusterError,
  },

  #[error("unable to list objects created for stage '{stage}' from template '{template}': {source}")]
  ListCreatedObjects {
    stage: String,
    template: String,
    #[source]
    source: ClusterError,
  },

  #[error("unable to retrieve outputs for stage '{stage}' from template '{template}': {source}")]
  OutputNotReady {
    stage: String,
    template: String,
    #[source]
    source: OutputError,
  },

  #[error("stage '{stage}' is waiting on output '{output}' of stage '{upstream}'")]
  UpstreamNotReady {
    stage: String,
    upstream: String,
    output: String,
  },

  #[error("{context}: {source}")]
  Unknown {
    context: String,
    #[source]
    source: AnyhowError,
  },
}

impl RealizeError {
  pub fn class(&self) -> ErrorClass {
    match self {
      RealizeError::TemplateNotFound { .. } => ErrorClass::TemplateMissing,
      RealizeError::ResolveSelector { .. } => ErrorClass::SelectorResolution,
      RealizeError::Stamp { .. } => ErrorClass::Stamp,
      RealizeError::ApplyRejected { .. } => ErrorClass::SubmissionRejected,
      RealizeError::ListCreatedObjects { .. } => ErrorClass::ListingFailure,
      RealizeError::OutputNotReady { .. } | RealizeError::UpstreamNotReady { .. } => ErrorClass::OutputNotReady,
      RealizeError::Unknown { .. } => ErrorClass::Unknown,
    }
  }

  pub fn is_escalated(&self) -> bool {
    self.class().is_escalated()
  }

  /// The stage the error was raised for, when it belongs to one.
  pub fn stage(&self) -> Option<&str> {
    match self {
      RealizeError::TemplateNotFound { stage, .. }
      | RealizeError::Stamp { stage, .. }
      | RealizeError::ApplyRejected { stage, .. }
      | RealizeError::ListCreatedObjects { stage, .. }
      | RealizeError::OutputNotReady { stage, .. }
      | RealizeError::UpstreamNotReady { stage, .. } => Some(stage),
      RealizeError::ResolveSelector { .. } | RealizeError::Unknown { .. } => None,
    }
  }
}

impl From<AnyhowError> for RealizeError {
  fn from(err: AnyhowError) -> Self {
    RealizeError::Unknown {
      context: "unclassified error".to_string(),
      source: err,
    }
  }
}

#[derive(Debug, Error)]
pub enum TrackError {
  #[error("unable to watch {kind}: {source}")]
  Registration {
    kind: ObjectKind,
    #[source]
    source: ClusterError,
  },
}

/// The pass was cancelled through its token before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reconcile pass cancelled")]
pub struct Cancelled;

/// Errors returned to the reconciliation framework. Every variant triggers
/// its backoff policy.
#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error("get workload {request}: {source}")]
  GetOwner {
    request: String,
    #[source]
    source: ClusterError,
  },

  #[error("unhandled error: {0}")]
  Unhandled(#[source] RealizeError),

  #[error("dynamic tracker watch: {0}")]
  Watch(#[from] TrackError),

  #[error("update workload status {request}: {source}")]
  StatusUpdate {
    request: String,
    #[source]
    source: ClusterError,
  },

  #[error(transparent)]
  Cancelled(#[from] Cancelled),
}

pub type ReconcileResult<T, E = ReconcileError> = std::result::Result<T, E>;
