// Archivo: download.rs
// Propósito: stage DOWNLOAD. Descarga ambas listas, las guarda en el store
// del job y registra sus checksums.
use crate::artifacts::save_and_checksum;
use crate::step::{StepContext, StepOutcome, StepResult, WorkflowStep};
use bsa_domain::BlockListType;
use flow::domain::{Checksums, DownloadStage};
use log::{error, info};

pub struct DownloadStep;

impl WorkflowStep for DownloadStep {
  fn name(&self) -> &str {
    "download"
  }

  fn stage(&self) -> DownloadStage {
    DownloadStage::Download
  }

  fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
    let mut fetched = Checksums::new();
    let mut actual = Checksums::new();
    for list in BlockListType::ALL {
      // descarga y copia se reintentan juntas: un cuerpo a medio leer no
      // se puede retomar
      let (peeked, computed) = ctx.with_retry(&format!("descarga de {}", list), |_| {
                                    let mut lazy = ctx.services.fetcher.fetch(list)?;
                                    let peeked = lazy.peek_checksum().map(str::to_string);
                                    let computed = save_and_checksum(ctx.store(), ctx.job_name(), &mut lazy)?;
                                    Ok((peeked, computed))
                                  })?;
      if let Some(p) = peeked {
        fetched.insert(list, p);
      }
      actual.insert(list, computed);
    }
    info!("Job {}: listas descargadas {:?}", ctx.job_name(), actual);

    if ctx.services.config.checksum_check_enabled && fetched.len() == BlockListType::ALL.len() {
      let previous = ctx.latest_completed().map(|c| &c.checksums);
      if !ctx.schedule.always_download() && previous == Some(&fetched) {
        info!("Job {}: las listas no cambiaron desde el job anterior", ctx.job_name());
        return Ok(StepOutcome::AdvanceWithChecksums(DownloadStage::Nop, fetched));
      }
      if fetched != actual {
        error!("Mismatching checksums: BSA's is [{:?}], ours is [{:?}]", fetched, actual);
        return Ok(StepOutcome::AdvanceWithChecksums(DownloadStage::ChecksumsNotMatch, actual));
      }
    }
    Ok(StepOutcome::AdvanceWithChecksums(DownloadStage::MakeDiff, actual))
  }
}
