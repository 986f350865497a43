// cartograph/src/reconciler.rs

//! One reconcile pass for a workload: realize its pipeline, watch what was
//! stamped, record conditions and outputs in status, and tell the framework
//! whether to back off.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

use crate::api::{Resource, Workload};
use crate::cluster::Repository;
use crate::conditions::reasons::reason_for;
use crate::conditions::{decisive_error, ConditionManager};
use crate::config::ControllerConfig;
use crate::core::control::{until_cancelled, ReconcileOutcome, ReconcileRequest};
use crate::core::object::UnstructuredObject;
use crate::error::{Cancelled, ReconcileError, ReconcileResult, RealizeError, TrackError};
use crate::realizer::{RealizeOutcome, Realizer};
use crate::template::Stamper;
use crate::tracker::{DynamicTracker, EnqueueRequestForOwner};

pub struct Reconciler {
  repo: Repository,
  realizer: Realizer,
  tracker: Arc<DynamicTracker>,
  config: ControllerConfig,
}

impl Reconciler {
  /// The tracker is shared by every reconciler of the process so each kind
  /// is watched once.
  pub fn new(repo: Repository, tracker: Arc<DynamicTracker>, config: ControllerConfig) -> Self {
    let realizer = Realizer::new(Stamper::new(&config));
    Self::with_realizer(repo, realizer, tracker, config)
  }

  pub fn with_realizer(
    repo: Repository,
    realizer: Realizer,
    tracker: Arc<DynamicTracker>,
    config: ControllerConfig,
  ) -> Self {
    Self {
      repo,
      realizer,
      tracker,
      config,
    }
  }

  /// Runs one pass.
  ///
  /// `Err` asks the framework to back off: escalated realize errors, watch
  /// registration and status write failures, and cancellation. A cancelled
  /// pass never writes status.
  #[instrument(name = "Reconciler::reconcile", skip_all, fields(workload = %request), err(Display))]
  pub async fn reconcile(
    &self,
    request: &ReconcileRequest,
    cancel: &CancellationToken,
  ) -> ReconcileResult<ReconcileOutcome> {
    let lookup = self.repo.get_workload(&request.namespace, &request.name);
    let mut workload = match until_cancelled(cancel, lookup).await? {
      Ok(Some(workload)) => workload,
      Ok(None) => {
        event!(Level::INFO, "Workload no longer exists.");
        return Ok(ReconcileOutcome::Completed);
      }
      Err(source) => {
        return Err(ReconcileError::GetOwner {
          request: request.to_string(),
          source,
        })
      }
    };

    let RealizeOutcome {
      stamped,
      outputs,
      error,
      ..
    } = self.realizer.realize(&workload, &self.repo, cancel).await?;
    let errors: Vec<RealizeError> = error.into_iter().collect();

    let mut conditions = ConditionManager::new(&self.config.ready_condition_type, &workload.status.conditions);
    conditions.record_errors(&errors);

    let tracking_error = self.watch_stamped(&stamped).err();

    let (next_conditions, changed) = conditions.finalize();
    let generation = workload.metadata.generation;
    if changed || workload.status.observed_generation != generation {
      if cancel.is_cancelled() {
        return Err(Cancelled.into());
      }
      workload.status.conditions = next_conditions;
      workload.status.observed_generation = generation;
      workload.status.outputs = outputs;
      self
        .repo
        .update_workload_status(&workload)
        .await
        .map_err(|source| ReconcileError::StatusUpdate {
          request: request.to_string(),
          source,
        })?;
      event!(Level::DEBUG, changed, generation, "Workload status written.");
    }

    if let Some(err) = tracking_error {
      event!(Level::ERROR, error = %err, "Dynamic tracker watch failed.");
      return Err(err.into());
    }

    match decisive_error(errors) {
      None => Ok(ReconcileOutcome::Completed),
      Some(err) if err.is_escalated() => Err(ReconcileError::Unhandled(err)),
      Some(err) => {
        event!(Level::INFO, error = %err, "Handled error.");
        Ok(ReconcileOutcome::Blocked {
          reason: reason_for(err.class()).to_string(),
        })
      }
    }
  }

  fn watch_stamped(&self, stamped: &[UnstructuredObject]) -> Result<(), TrackError> {
    let handler = Arc::new(EnqueueRequestForOwner::new(Workload::object_kind()));
    for obj in stamped {
      if let Some(kind) = obj.kind() {
        self.tracker.watch(&kind, handler.clone())?;
      }
    }
    Ok(())
  }
}
