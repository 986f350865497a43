// cartograph/src/conditions/manager.rs

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::reasons::{condition_for_error, READY_REASON};
use crate::core::condition::{Condition, ConditionStatus};
use crate::error::RealizeError;

/// Builds the condition list for one pass.
///
/// Seeded with the previous pass's conditions and the summary type. Callers
/// append conditions in the order they were discovered; `finalize` puts the
/// summary first, keeps the first appended condition of each type, and
/// carries `last_transition_time` over for every condition whose status did
/// not change.
#[derive(Debug, Clone)]
pub struct ConditionManager {
  ready_type: String,
  previous: Vec<Condition>,
  appended: Vec<Condition>,
  now: DateTime<Utc>,
}

impl ConditionManager {
  pub fn new(ready_type: impl Into<String>, previous: &[Condition]) -> Self {
    Self {
      ready_type: ready_type.into(),
      previous: previous.to_vec(),
      appended: Vec::new(),
      now: Utc::now(),
    }
  }

  /// Uses `now` as the transition time of conditions that changed.
  pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
    self.now = now;
    self
  }

  pub fn add(&mut self, condition: Condition) {
    self.appended.push(condition);
  }

  pub fn add_error(&mut self, err: &RealizeError) {
    self.add(condition_for_error(err));
  }

  /// Appends a condition per error, highest priority first, whatever order
  /// the errors were collected in.
  pub fn record_errors(&mut self, errors: &[RealizeError]) {
    let mut ordered: Vec<&RealizeError> = errors.iter().collect();
    ordered.sort_by_key(|err| err.class());
    for err in ordered {
      self.add_error(err);
    }
  }

  /// Produces the new condition list and whether it differs from the
  /// previous one. Calling it again yields the same result.
  pub fn finalize(&self) -> (Vec<Condition>, bool) {
    let mut seen = HashSet::new();
    seen.insert(self.ready_type.as_str());
    let appended: Vec<&Condition> = self
      .appended
      .iter()
      .filter(|c| seen.insert(c.type_.as_str()))
      .collect();

    let ready = match appended.first() {
      None => Condition::new(self.ready_type.clone(), ConditionStatus::True, READY_REASON, ""),
      Some(first) => Condition::new(
        self.ready_type.clone(),
        ConditionStatus::False,
        first.reason.clone(),
        first.message.clone(),
      ),
    };

    let conditions: Vec<Condition> = std::iter::once(ready)
      .chain(appended.into_iter().cloned())
      .map(|c| self.with_transition_time(c))
      .collect();
    let changed = self.differs_from_previous(&conditions);
    (conditions, changed)
  }

  fn with_transition_time(&self, mut condition: Condition) -> Condition {
    condition.last_transition_time = match self.previous_of(&condition.type_) {
      Some(prev) if prev.status == condition.status => prev.last_transition_time,
      _ => self.now,
    };
    condition
  }

  fn previous_of(&self, type_: &str) -> Option<&Condition> {
    self.previous.iter().find(|c| c.type_ == type_)
  }

  fn differs_from_previous(&self, conditions: &[Condition]) -> bool {
    if conditions.len() != self.previous.len() {
      return true;
    }
    conditions
      .iter()
      .any(|c| self.previous_of(&c.type_).map_or(true, |prev| prev != c))
  }
}
