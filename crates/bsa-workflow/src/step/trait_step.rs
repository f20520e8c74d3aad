use crate::errors::WorkflowError;
use crate::step::StepContext;
use flow::domain::{Checksums, DownloadStage};

/// Resultado de ejecutar un paso: el stage al que debe avanzar el job.
/// El motor persiste ese stage antes de ejecutar el siguiente paso.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
  Advance(DownloadStage),
  /// Avance desde `DOWNLOAD` guardando los checksums de las listas.
  AdvanceWithChecksums(DownloadStage, Checksums),
}

impl StepOutcome {
  pub fn next_stage(&self) -> DownloadStage {
    match self {
      StepOutcome::Advance(stage) | StepOutcome::AdvanceWithChecksums(stage, _) => *stage,
    }
  }
}

pub type StepResult = Result<StepOutcome, WorkflowError>;

/// Trait que representa un stage del pipeline.
///
/// Un paso se reejecuta completo si la invocación anterior falló a mitad:
/// sus salidas deben poder reescribirse sin efectos acumulados.
pub trait WorkflowStep: Send + Sync {
  /// Nombre o identificador del paso
  fn name(&self) -> &str;

  /// Stage que este paso ejecuta.
  fn stage(&self) -> DownloadStage;

  /// Ejecuta la logica del paso y devuelve el stage siguiente.
  fn execute(&self, ctx: &StepContext<'_>) -> StepResult;
}
