// Archivo: uploads.rs
// Propósito: stages START_UPLOADING, UPLOAD_DOMAINS_IN_USE y
// FINISH_UPLOADING. Cada uno arma un reporte desde los artefactos del job,
// guarda una copia en el store y lo envía a la autoridad.
use crate::artifacts::{read_records, write_document};
use crate::errors::WorkflowError;
use crate::report::{to_completed_orders_report, to_in_progress_orders_report, to_unblockable_domains_report};
use crate::step::{StepContext, StepOutcome, StepResult, WorkflowStep};
use bsa_domain::{NonBlockedDomain, Order};
use bsa_providers::{ProviderError, ReportSender};
use flow::domain::{ArtifactKind, DownloadStage};
use log::info;

fn read_orders(ctx: &StepContext<'_>) -> Result<Vec<Order>, WorkflowError> {
  read_records::<Order>(ctx.store(), ctx.job_name(), ArtifactKind::OrderDiffs)?.collect()
}

/// Guarda la copia de auditoría y envía el reporte con reintentos.
fn upload<F>(ctx: &StepContext<'_>, kind: ArtifactKind, report: &str, send: F) -> Result<(), WorkflowError>
  where F: Fn(&dyn ReportSender, &str) -> Result<(), ProviderError>
{
  write_document(ctx.store(), ctx.job_name(), kind, report)?;
  let sender = ctx.services.report_sender.as_ref();
  ctx.with_retry(&format!("envío de {}", kind), |_| send(sender, report).map_err(WorkflowError::from))
}

pub struct StartUploadingStep;

impl WorkflowStep for StartUploadingStep {
  fn name(&self) -> &str {
    "start_uploading"
  }

  fn stage(&self) -> DownloadStage {
    DownloadStage::StartUploading
  }

  fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
    match to_in_progress_orders_report(read_orders(ctx)?)? {
      Some(report) => {
        upload(ctx, ArtifactKind::InProgressOrdersReport, &report, |s, r| s.send_order_status_report(r))?;
      }
      None => info!("No new or deleted orders in this round."),
    }
    Ok(StepOutcome::Advance(DownloadStage::UploadDomainsInUse))
  }
}

pub struct UploadDomainsInUseStep;

impl WorkflowStep for UploadDomainsInUseStep {
  fn name(&self) -> &str {
    "upload_domains_in_use"
  }

  fn stage(&self) -> DownloadStage {
    DownloadStage::UploadDomainsInUse
  }

  fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
    let domains = read_records::<NonBlockedDomain>(ctx.store(), ctx.job_name(), ArtifactKind::NonBlockedDomains)?
                    .collect::<Result<Vec<_>, _>>()?;
    match to_unblockable_domains_report(domains)? {
      // durante una descarga los dominios sólo se agregan
      Some(report) => {
        upload(ctx, ArtifactKind::UnblockableDomainsReport, &report, |s, r| s.add_unblockable_domains(r))?;
      }
      None => info!("No changes in the set of unblockable domains in this round."),
    }
    Ok(StepOutcome::Advance(DownloadStage::FinishUploading))
  }
}

pub struct FinishUploadingStep;

impl WorkflowStep for FinishUploadingStep {
  fn name(&self) -> &str {
    "finish_uploading"
  }

  fn stage(&self) -> DownloadStage {
    DownloadStage::FinishUploading
  }

  fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
    if let Some(report) = to_completed_orders_report(read_orders(ctx)?)? {
      upload(ctx, ArtifactKind::CompletedOrdersReport, &report, |s, r| s.send_order_status_report(r))?;
    }
    Ok(StepOutcome::Advance(DownloadStage::Done))
  }
}
