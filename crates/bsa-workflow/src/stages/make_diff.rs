// Archivo: make_diff.rs
// Propósito: stage MAKE_DIFF. Compara las listas del job con las del último
// job terminado y guarda órdenes y labels resultantes.
use crate::artifacts::{read_block_lists, write_records};
use crate::diff::BlockLabelsDiff;
use crate::step::{StepContext, StepOutcome, StepResult, WorkflowStep};
use flow::domain::{ArtifactKind, DownloadStage};
use log::info;

pub struct MakeDiffStep;

impl WorkflowStep for MakeDiffStep {
  fn name(&self) -> &str {
    "make_diff"
  }

  fn stage(&self) -> DownloadStage {
    DownloadStage::MakeDiff
  }

  fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
    let current = read_block_lists(ctx.store(), ctx.job_name())?;
    let previous = match ctx.latest_completed() {
      Some(job) => Some(read_block_lists(ctx.store(), &job.job_name)?),
      None => None,
    };
    let diff = BlockLabelsDiff::create(current, previous)?;

    let n_orders = write_records(ctx.store(), ctx.job_name(), ArtifactKind::OrderDiffs, diff.orders())?;
    let idn_checker = ctx.services.idn_checker.as_ref();
    let n_labels = write_records(ctx.store(), ctx.job_name(), ArtifactKind::LabelDiffs, diff.labels(idn_checker))?;
    info!("Job {}: diff con {} órdenes y {} labels (base: {})",
          ctx.job_name(),
          n_orders,
          n_labels,
          ctx.latest_completed().map_or("ninguna", |j| j.job_name.as_str()));
    Ok(StepOutcome::Advance(DownloadStage::ApplyDiff))
  }
}
