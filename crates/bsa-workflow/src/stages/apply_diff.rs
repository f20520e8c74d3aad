// Archivo: apply_diff.rs
// Propósito: stage APPLY_DIFF. Aplica los labels del diff en lotes y guarda
// los dominios no bloqueables.
use crate::apply::apply_label_diff;
use crate::artifacts::read_records;
use crate::step::{StepContext, StepOutcome, StepResult, WorkflowStep};
use bsa_domain::Label;
use flow::domain::{ArtifactKind, DownloadStage};
use log::{debug, info};
use std::io::Write;

pub struct ApplyDiffStep;

impl WorkflowStep for ApplyDiffStep {
  fn name(&self) -> &str {
    "apply_diff"
  }

  fn stage(&self) -> DownloadStage {
    DownloadStage::ApplyDiff
  }

  fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
    let services = ctx.services;
    let batch_size = services.config.label_txn_batch_size;
    let job_creation_time = ctx.schedule.job_creation_time();
    let mut labels = read_records::<Label>(ctx.store(), ctx.job_name(), ArtifactKind::LabelDiffs)?;
    let mut out = ctx.store().create(ctx.job_name(), ArtifactKind::NonBlockedDomains)?;

    let (mut n_labels, mut n_domains, mut n_batches) = (0usize, 0usize, 0usize);
    loop {
      let mut batch = Vec::with_capacity(batch_size);
      for label in labels.by_ref().take(batch_size) {
        batch.push(label?);
      }
      if batch.is_empty() {
        break;
      }
      // los lotes se aplican uno tras otro: cada lote confirma sus labels
      // antes de contar dominios
      let domains = apply_label_diff(&batch,
                                     services.label_repo.as_ref(),
                                     services.idn_checker.as_ref(),
                                     job_creation_time,
                                     ctx.now())?;
      for d in &domains {
        writeln!(out, "{}", d)?;
      }
      n_batches += 1;
      n_labels += batch.len();
      n_domains += domains.len();
      debug!("Job {}: lote {} con {} labels, {} dominios", ctx.job_name(), n_batches, batch.len(), domains.len());
    }
    out.flush()?;
    out.commit()?;
    info!("Job {}: {} labels aplicados en {} lotes, {} dominios no bloqueables",
          ctx.job_name(),
          n_labels,
          n_batches,
          n_domains);
    Ok(StepOutcome::Advance(DownloadStage::StartUploading))
  }
}
