// Archivo: download_action.rs
// Propósito: una invocación del pipeline. Toma el lock, pide el job al
// scheduler y ejecuta los stages desde el stage registrado hasta uno
// terminal, persistiendo cada avance antes del siguiente stage.
use crate::errors::WorkflowError;
use crate::stages::step_for;
use crate::step::{PipelineServices, StepContext, StepOutcome};
use flow::domain::DownloadStage;
use flow::{BsaLock, DownloadScheduler};
use log::{debug, info, warn};

/// Qué hizo una invocación que llegó a ejecutarse bajo el lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
  /// El scheduler no tenía trabajo.
  NothingToDo,
  /// El job avanzó hasta `stage` (terminal).
  Finished { job_id: i64, stage: DownloadStage },
  /// El job a reanudar ya estaba en un stage terminal.
  UnexpectedStage { job_id: i64, stage: DownloadStage },
}

/// Resultado de `run`. Nunca es un error para quien dispara la acción.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
  Completed(RunOutcome),
  /// Otro worker tiene el lock.
  LockNotAcquired,
  /// La invocación falló; el próximo disparo reanuda desde el último
  /// stage persistido.
  Failed(String),
}

impl InvocationStatus {
  /// Código HTTP que se devuelve al scheduler: siempre 200, los reintentos
  /// los hace el siguiente disparo.
  pub fn http_status(&self) -> u16 {
    200
  }
}

pub struct BsaDownloadAction {
  scheduler: DownloadScheduler,
  lock: BsaLock,
  services: PipelineServices,
}

impl BsaDownloadAction {
  pub fn new(scheduler: DownloadScheduler, lock: BsaLock, services: PipelineServices) -> Self {
    Self { scheduler, lock, services }
  }

  /// Punto de entrada del disparo periódico. Atrapa cualquier error y lo
  /// registra.
  pub fn run(&self) -> InvocationStatus {
    match self.lock.execute_with_lock(|| self.run_within_lock()) {
      Ok(Some(outcome)) => InvocationStatus::Completed(outcome),
      Ok(None) => {
        info!("Job is being executed by another worker.");
        InvocationStatus::LockNotAcquired
      }
      Err(e) => {
        warn!("Failed to update block lists: {}", e);
        InvocationStatus::Failed(e.to_string())
      }
    }
  }

  /// Ejecuta el job que indique el scheduler. Debe llamarse con el lock
  /// tomado.
  pub fn run_within_lock(&self) -> Result<RunOutcome, WorkflowError> {
    let Some(mut schedule) = self.scheduler.schedule(self.services.clock.now())? else {
      info!("Nothing to do.");
      return Ok(RunOutcome::NothingToDo);
    };
    let job_id = schedule.job_id();
    if schedule.stage().is_terminal() {
      warn!("Unexpectedly reached the {} stage.", schedule.stage());
      return Ok(RunOutcome::UnexpectedStage { job_id, stage: schedule.stage() });
    }

    while let Some(step) = step_for(schedule.stage()) {
      info!("Job {} ({}): ejecutando {}", job_id, schedule.job_name(), step.name());
      let outcome = step.execute(&StepContext::new(&self.services, &schedule))?;
      debug!("Job {}: {} -> {}", job_id, step.stage(), outcome.next_stage());
      let now = self.services.clock.now();
      match outcome {
        StepOutcome::Advance(next) => schedule.update_job_stage(next, now)?,
        StepOutcome::AdvanceWithChecksums(next, checksums) => {
          schedule.update_job_stage_with_checksums(next, &checksums, now)?
        }
      }
    }
    info!("Job {} terminó en {}", job_id, schedule.stage());
    Ok(RunOutcome::Finished { job_id, stage: schedule.stage() })
  }
}
