// cartograph/src/conditions/reasons.rs

//! Condition types and reasons written for realize failures.

use crate::core::condition::{Condition, ConditionStatus};
use crate::error::{ErrorClass, RealizeError};

pub const PIPELINE_READY: &str = "PipelineReady";
pub const RESOURCES_SUBMITTED: &str = "ResourcesSubmitted";

pub const READY_REASON: &str = "Ready";
pub const TEMPLATE_NOT_FOUND: &str = "TemplateNotFound";
pub const PIPELINE_SELECTION_FAILED: &str = "PipelineSelectionFailed";
pub const TEMPLATE_STAMP_FAILURE: &str = "TemplateStampFailure";
pub const TEMPLATE_REJECTED_BY_API_SERVER: &str = "TemplateRejectedByAPIServer";
pub const FAILED_TO_LIST_CREATED_OBJECTS: &str = "FailedToListCreatedObjects";
pub const MISSING_VALUE_AT_PATH: &str = "MissingValueAtPath";
pub const UNKNOWN_ERROR: &str = "UnknownError";

pub fn reason_for(class: ErrorClass) -> &'static str {
  match class {
    ErrorClass::TemplateMissing => TEMPLATE_NOT_FOUND,
    ErrorClass::SelectorResolution => PIPELINE_SELECTION_FAILED,
    ErrorClass::Stamp => TEMPLATE_STAMP_FAILURE,
    ErrorClass::SubmissionRejected => TEMPLATE_REJECTED_BY_API_SERVER,
    ErrorClass::ListingFailure => FAILED_TO_LIST_CREATED_OBJECTS,
    ErrorClass::OutputNotReady => MISSING_VALUE_AT_PATH,
    ErrorClass::Unknown => UNKNOWN_ERROR,
  }
}

/// The `False` condition recording `err`. Selection failures are reported on
/// `PipelineReady`, everything else on `ResourcesSubmitted`.
pub fn condition_for_error(err: &RealizeError) -> Condition {
  let class = err.class();
  let type_ = match class {
    ErrorClass::SelectorResolution => PIPELINE_READY,
    _ => RESOURCES_SUBMITTED,
  };
  Condition::new(type_, ConditionStatus::False, reason_for(class), err.to_string())
}

/// The error that decides the summary condition and the escalation policy:
/// the first one in priority order.
pub fn decisive_error(errors: Vec<RealizeError>) -> Option<RealizeError> {
  errors.into_iter().min_by_key(RealizeError::class)
}
