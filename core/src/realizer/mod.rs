// cartograph/src/realizer/mod.rs

//! Walks a pipeline's stages in declared order, stamping each template and
//! threading its outputs into the stages that follow.

mod execution;

use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::{Pipeline, Workload};
use crate::core::object::UnstructuredObject;
use crate::error::RealizeError;
use crate::template::Stamper;

/// What one realize pass produced. A pass stops at its first failing stage,
/// so `error` holds at most that one failure.
#[derive(Debug, Default)]
pub struct RealizeOutcome {
  /// Name of the selected pipeline, if selection succeeded.
  pub pipeline: Option<String>,
  /// Stages that were started, in order, including the failing one.
  pub evaluated: Vec<String>,
  /// Objects as stored after stamping, one per submitted stage.
  pub stamped: Vec<UnstructuredObject>,
  /// Every output gathered so far, keyed `stage.output`.
  pub outputs: BTreeMap<String, Value>,
  pub error: Option<RealizeError>,
}

impl RealizeOutcome {
  pub fn is_complete(&self) -> bool {
    self.pipeline.is_some() && self.error.is_none()
  }
}

#[derive(Clone)]
pub struct Realizer {
  stamper: Stamper,
}

impl Realizer {
  pub fn new(stamper: Stamper) -> Self {
    Self { stamper }
  }
}

/// Picks the single pipeline whose selector is satisfied by the workload's
/// labels.
pub fn select_pipeline(pipelines: Vec<Pipeline>, owner: &Workload) -> Result<Pipeline, RealizeError> {
  let labels = &owner.metadata.labels;
  let mut matching: Vec<Pipeline> = pipelines.into_iter().filter(|p| p.matches(labels)).collect();
  match matching.len() {
    0 => Err(RealizeError::ResolveSelector {
      message: format!("no pipeline found where full selector is satisfied by labels: {:?}", labels),
    }),
    1 => Ok(matching.remove(0)),
    _ => {
      let mut names: Vec<&str> = matching.iter().map(Pipeline::name).collect();
      names.sort_unstable();
      Err(RealizeError::ResolveSelector {
        message: format!("more than one pipeline selected for workload: {}", names.join(", ")),
      })
    }
  }
}
