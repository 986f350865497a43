// cartograph/src/api/admission.rs

//! Admission checks run by the validating hook before a template or pipeline
//! is persisted. Deletes are never validated.

use std::collections::HashSet;
use thiserror::Error;
use tracing::{event, Level};

use crate::api::pipeline::Pipeline;
use crate::api::template::{check_body, Template};
use crate::template::path::JsonPath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("invalid template: {0}")]
  InvalidTemplate(String),

  #[error("invalid pipeline: {0}")]
  InvalidPipeline(String),
}

pub trait Validate {
  fn validate_create(&self) -> Result<(), ValidationError>;

  fn validate_update(&self, _old: Option<&Self>) -> Result<(), ValidationError> {
    self.validate_create()
  }

  fn validate_delete(&self) -> Result<(), ValidationError> {
    Ok(())
  }
}

impl Validate for Template {
  fn validate_create(&self) -> Result<(), ValidationError> {
    let invalid = |msg: String| {
      event!(Level::DEBUG, template = %self.name(), reason = %msg, "Template rejected.");
      ValidationError::InvalidTemplate(msg)
    };

    check_body(&self.spec.template).map_err(|e| invalid(e.to_string()))?;

    for (output, path) in self.spec.outputs.declared() {
      if output.is_empty() {
        return Err(invalid("output names must not be empty".to_string()));
      }
      JsonPath::parse(path).map_err(|e| invalid(format!("output '{}': {}", output, e)))?;
    }

    let mut seen = HashSet::new();
    for param in &self.spec.params {
      if !seen.insert(param.name.as_str()) {
        return Err(invalid(format!("duplicate param '{}'", param.name)));
      }
    }
    Ok(())
  }
}

impl Validate for Pipeline {
  fn validate_create(&self) -> Result<(), ValidationError> {
    let invalid = |msg: String| {
      event!(Level::DEBUG, pipeline = %self.name(), reason = %msg, "Pipeline rejected.");
      ValidationError::InvalidPipeline(msg)
    };

    if self.spec.selector.is_empty() {
      return Err(invalid("selector must not be empty".to_string()));
    }
    if self.spec.stages.is_empty() {
      return Err(invalid("at least one stage is required".to_string()));
    }

    let params = self.spec.params.iter().map(|p| ("pipeline", p));
    let stage_params = self
      .spec
      .stages
      .iter()
      .flat_map(|s| s.params.iter().map(move |p| (s.name.as_str(), p)));
    for (owner, param) in params.chain(stage_params) {
      if param.value.is_some() == param.default.is_some() {
        return Err(invalid(format!(
          "param '{}' of '{}' must set exactly one of value or default",
          param.name, owner
        )));
      }
    }

    // Inputs may only point backwards, which keeps the graph acyclic and
    // makes declared order a valid evaluation order.
    let mut declared: HashSet<&str> = HashSet::new();
    for stage in &self.spec.stages {
      for input in &stage.inputs {
        if !declared.contains(input.stage.as_str()) {
          return Err(invalid(format!(
            "stage '{}' input '{}' references stage '{}' which is not declared before it",
            stage.name, input.name, input.stage
          )));
        }
      }
      if !declared.insert(stage.name.as_str()) {
        return Err(invalid(format!("duplicate stage name '{}'", stage.name)));
      }
    }
    Ok(())
  }
}
