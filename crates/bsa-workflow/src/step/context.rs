use crate::config::DownloadConfig;
use crate::errors::WorkflowError;
use crate::retry::{classify_workflow_error, retry_with_backoff};
use bsa_domain::{IdnChecker, LabelRepository};
use bsa_providers::{BlockListFetcher, ReportSender};
use chrono::{DateTime, Utc};
use flow::clock::Clock;
use flow::domain::CompletedJob;
use flow::repository::SnapshotStore;
use flow::DownloadSchedule;
use std::sync::Arc;

/// Colaboradores que comparten todos los pasos de una invocación.
pub struct PipelineServices {
  /// Labels persistentes y dominios en uso del registro.
  pub label_repo: Arc<dyn LabelRepository>,
  /// Artefactos por job (listas crudas, diffs, reportes).
  pub snapshot_store: Arc<dyn SnapshotStore>,
  pub fetcher: Arc<dyn BlockListFetcher>,
  pub report_sender: Arc<dyn ReportSender>,
  pub idn_checker: Arc<dyn IdnChecker>,
  pub clock: Arc<dyn Clock>,
  pub config: DownloadConfig,
}

/// Contexto pasado a cada paso: los servicios y el job en curso.
pub struct StepContext<'a> {
  pub services: &'a PipelineServices,
  pub schedule: &'a DownloadSchedule,
}

impl<'a> StepContext<'a> {
  pub fn new(services: &'a PipelineServices, schedule: &'a DownloadSchedule) -> Self {
    Self { services, schedule }
  }

  pub fn job_name(&self) -> &str {
    self.schedule.job_name()
  }

  /// Último job terminado contra el que se calcula el diff.
  pub fn latest_completed(&self) -> Option<&CompletedJob> {
    self.schedule.latest_completed()
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.services.clock.now()
  }

  pub fn store(&self) -> &dyn SnapshotStore {
    self.services.snapshot_store.as_ref()
  }

  /// Ejecuta una llamada a un colaborador externo con la política de
  /// reintentos configurada.
  pub fn with_retry<T, F>(&self, what: &str, operation: F) -> Result<T, WorkflowError>
    where F: FnMut(usize) -> Result<T, WorkflowError>
  {
    retry_with_backoff(&self.services.config.retry_backoff(), what, operation, classify_workflow_error)
  }
}
