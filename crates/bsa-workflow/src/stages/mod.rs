//! Un `WorkflowStep` por stage no terminal del pipeline.
mod apply_diff;
mod download;
mod make_diff;
mod uploads;

pub use apply_diff::ApplyDiffStep;
pub use download::DownloadStep;
pub use make_diff::MakeDiffStep;
pub use uploads::{FinishUploadingStep, StartUploadingStep, UploadDomainsInUseStep};

use crate::step::WorkflowStep;
use flow::domain::DownloadStage;

/// Paso que ejecuta `stage`, o `None` si el stage es terminal.
pub fn step_for(stage: DownloadStage) -> Option<Box<dyn WorkflowStep>> {
  let step: Box<dyn WorkflowStep> = match stage {
    DownloadStage::Download => Box::new(DownloadStep),
    DownloadStage::MakeDiff => Box::new(MakeDiffStep),
    DownloadStage::ApplyDiff => Box::new(ApplyDiffStep),
    DownloadStage::StartUploading => Box::new(StartUploadingStep),
    DownloadStage::UploadDomainsInUse => Box::new(UploadDomainsInUseStep),
    DownloadStage::FinishUploading => Box::new(FinishUploadingStep),
    DownloadStage::Done | DownloadStage::Nop | DownloadStage::ChecksumsNotMatch => return None,
  };
  Some(step)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_in_flight_stage_has_its_step() {
    for stage in [DownloadStage::Download,
                  DownloadStage::MakeDiff,
                  DownloadStage::ApplyDiff,
                  DownloadStage::StartUploading,
                  DownloadStage::UploadDomainsInUse,
                  DownloadStage::FinishUploading]
    {
      let step = step_for(stage).expect("step");
      assert_eq!(step.stage(), stage);
    }
    assert!(step_for(DownloadStage::Done).is_none());
    assert!(step_for(DownloadStage::Nop).is_none());
    assert!(step_for(DownloadStage::ChecksumsNotMatch).is_none());
  }
}
