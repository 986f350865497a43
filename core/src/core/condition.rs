// cartograph/src/core/condition.rs

//! The condition type surfaced in owner status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
  True,
  False,
  Unknown,
}

impl fmt::Display for ConditionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ConditionStatus::True => "True",
      ConditionStatus::False => "False",
      ConditionStatus::Unknown => "Unknown",
    };
    f.write_str(s)
  }
}

/// A typed health signal.
///
/// `last_transition_time` only moves when `status` changes; the condition
/// manager carries it over from the previous pass otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
  #[serde(rename = "type")]
  pub type_: String,
  pub status: ConditionStatus,
  pub reason: String,
  #[serde(default)]
  pub message: String,
  pub last_transition_time: DateTime<Utc>,
}

impl Condition {
  /// Builds a condition stamped with the current time. The manager replaces
  /// the time when finalizing, so callers rarely care about it.
  pub fn new(
    type_: impl Into<String>,
    status: ConditionStatus,
    reason: impl Into<String>,
    message: impl Into<String>,
  ) -> Self {
    Self {
      type_: type_.into(),
      status,
      reason: reason.into(),
      message: message.into(),
      last_transition_time: Utc::now(),
    }
  }

  pub fn is_true(&self) -> bool {
    self.status == ConditionStatus::True
  }
}
