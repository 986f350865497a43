// cartograph/src/realizer/execution.rs

//! `Realizer::realize`, one pass over the selected pipeline.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

use super::{select_pipeline, RealizeOutcome, Realizer};
use crate::api::{Pipeline, Stage, Workload};
use crate::cluster::Repository;
use crate::core::control::until_cancelled;
use crate::error::{ApplyError, Cancelled, OutputError, RealizeError};
use crate::template::StampContext;

/// Outputs of finished stages, keyed by stage then output name.
type StageOutputs = BTreeMap<String, BTreeMap<String, Value>>;

/// Why a stage did not finish.
enum Halt {
  Cancelled,
  Failed(RealizeError),
}

impl From<Cancelled> for Halt {
  fn from(_: Cancelled) -> Self {
    Halt::Cancelled
  }
}

impl From<RealizeError> for Halt {
  fn from(err: RealizeError) -> Self {
    Halt::Failed(err)
  }
}

impl Realizer {
  /// Runs one pass for `owner`.
  ///
  /// Stage failures are returned inside the outcome; only cancellation
  /// aborts the pass as an error.
  #[instrument(
    name = "Realizer::realize",
    skip_all,
    fields(workload = %owner.request()),
    err(Display)
  )]
  pub async fn realize(
    &self,
    owner: &Workload,
    repo: &Repository,
    cancel: &CancellationToken,
  ) -> Result<RealizeOutcome, Cancelled> {
    let mut outcome = RealizeOutcome::default();

    let pipelines = match until_cancelled(cancel, repo.list_pipelines()).await? {
      Ok(pipelines) => pipelines,
      Err(err) => {
        outcome.error = Some(RealizeError::Unknown {
          context: "list pipelines".to_string(),
          source: anyhow::Error::new(err),
        });
        return Ok(outcome);
      }
    };
    let pipeline = match select_pipeline(pipelines, owner) {
      Ok(pipeline) => pipeline,
      Err(err) => {
        event!(Level::INFO, error = %err, "Pipeline selection failed.");
        outcome.error = Some(err);
        return Ok(outcome);
      }
    };
    outcome.pipeline = Some(pipeline.name().to_string());
    event!(Level::DEBUG, pipeline = %pipeline.name(), stages = pipeline.spec.stages.len(), "Pipeline selected.");

    let mut finished = StageOutputs::new();
    for stage in &pipeline.spec.stages {
      if cancel.is_cancelled() {
        event!(Level::INFO, stage = %stage.name, "Pass cancelled before stage.");
        return Err(Cancelled);
      }
      outcome.evaluated.push(stage.name.clone());

      match self.run_stage(owner, &pipeline, stage, repo, &finished, &mut outcome, cancel).await {
        Ok(outputs) => {
          for (output, value) in &outputs {
            outcome.outputs.insert(format!("{}.{}", stage.name, output), value.clone());
          }
          finished.insert(stage.name.clone(), outputs);
        }
        Err(Halt::Cancelled) => return Err(Cancelled),
        Err(Halt::Failed(err)) => {
          event!(Level::INFO, stage = %stage.name, class = ?err.class(), error = %err, "Stage did not complete.");
          outcome.error = Some(err);
          return Ok(outcome);
        }
      }
    }

    event!(Level::DEBUG, stamped = outcome.stamped.len(), "All stages realized.");
    Ok(outcome)
  }

  #[allow(clippy::too_many_arguments)]
  #[instrument(
    name = "Realizer::stage",
    skip_all,
    fields(stage = %stage.name, template = %stage.template_ref.name)
  )]
  async fn run_stage(
    &self,
    owner: &Workload,
    pipeline: &Pipeline,
    stage: &Stage,
    repo: &Repository,
    finished: &StageOutputs,
    outcome: &mut RealizeOutcome,
    cancel: &CancellationToken,
  ) -> Result<BTreeMap<String, Value>, Halt> {
    let template_name = stage.template_ref.name.as_str();

    let template = until_cancelled(cancel, repo.get_template(template_name))
      .await?
      .map_err(|err| RealizeError::Unknown {
        context: format!("get template '{}' for stage '{}'", template_name, stage.name),
        source: anyhow::Error::new(err),
      })?
      .ok_or_else(|| RealizeError::TemplateNotFound {
        stage: stage.name.clone(),
        template: template_name.to_string(),
      })?;

    let inputs = resolve_inputs(stage, finished)?;
    let ctx = StampContext {
      workload: owner,
      pipeline,
      stage,
      inputs,
    };
    let stamped = self.stamper.stamp(&template, &ctx).map_err(|source| RealizeError::Stamp {
      stage: stage.name.clone(),
      template: template_name.to_string(),
      source,
    })?;

    let applied = until_cancelled(cancel, self.stamper.apply(repo.store(), stamped, template.is_immutable()))
      .await?
      .map_err(|err| match err {
        ApplyError::Rejected(source) => RealizeError::ApplyRejected {
          stage: stage.name.clone(),
          template: template_name.to_string(),
          source,
        },
        ApplyError::ListCreatedObjects(source) => RealizeError::ListCreatedObjects {
          stage: stage.name.clone(),
          template: template_name.to_string(),
          source,
        },
        lookup @ ApplyError::Lookup(_) => RealizeError::Unknown {
          context: format!("apply object for stage '{}'", stage.name),
          source: anyhow::Error::new(lookup),
        },
      })?;
    outcome.stamped.push(applied.live.clone());

    let outputs = self
      .stamper
      .retrieve_outputs(&template, &applied)
      .map_err(|err| match err {
        OutputError::Stamp(source) => RealizeError::Stamp {
          stage: stage.name.clone(),
          template: template_name.to_string(),
          source,
        },
        source => RealizeError::OutputNotReady {
          stage: stage.name.clone(),
          template: template_name.to_string(),
          source,
        },
      })?;
    event!(Level::DEBUG, written = applied.written, outputs = outputs.len(), "Stage realized.");
    Ok(outputs)
  }
}

/// Builds the `inputs` map for a stage from the outputs of earlier stages.
/// An input without an `output` receives every output of its stage.
fn resolve_inputs(stage: &Stage, finished: &StageOutputs) -> Result<Map<String, Value>, RealizeError> {
  let mut inputs = Map::new();
  for input in &stage.inputs {
    let not_ready = || RealizeError::UpstreamNotReady {
      stage: stage.name.clone(),
      upstream: input.stage.clone(),
      output: input.output.clone().unwrap_or_else(|| "*".to_string()),
    };
    let upstream = finished.get(&input.stage).ok_or_else(not_ready)?;
    let value = match &input.output {
      Some(output) => upstream.get(output).cloned().ok_or_else(not_ready)?,
      None => Value::Object(upstream.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
    };
    inputs.insert(input.name.clone(), value);
  }
  Ok(inputs)
}
