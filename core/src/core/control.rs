// cartograph/src/core/control.rs

//! Reconcile requests and the signal a pass hands back to the framework.

use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Identifies the owning resource a pass should reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReconcileRequest {
  pub namespace: String,
  pub name: String,
}

impl ReconcileRequest {
  pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      namespace: namespace.into(),
      name: name.into(),
    }
  }
}

impl fmt::Display for ReconcileRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.namespace, self.name)
  }
}

/// Outcome of a pass that did not escalate.
///
/// Neither variant asks the framework to requeue: a `Blocked` pass waits for a
/// watched object or the owner's next generation to trigger it again.
/// Escalation is expressed by returning `Err(ReconcileError)` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
  /// Every stage was stamped and all outputs were available, or the owner
  /// no longer exists.
  Completed,
  /// A reported-only error was recorded as a condition.
  Blocked { reason: String },
}

/// Runs `fut` unless `cancel` fires first. The token is polled first, so an
/// already-cancelled token never starts the future's work.
pub async fn until_cancelled<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Cancelled>
where
  F: Future,
{
  tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(Cancelled),
    out = fut => Ok(out),
  }
}
