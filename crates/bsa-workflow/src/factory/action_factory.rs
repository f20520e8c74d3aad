use crate::config::DownloadConfig;
use crate::engine::BsaDownloadAction;
use crate::errors::WorkflowError;
use crate::step::PipelineServices;
use bsa_domain::{IdnChecker, LabelRepository, StaticIdnChecker};
use bsa_persistence::DieselRepositories;
use bsa_providers::{BlockListFetcher, DirectoryBlockListFetcher, ReportSender, SpoolReportSender};
use flow::clock::{Clock, SystemClock};
use flow::repository::{ExecutionLock, JobRepository, SnapshotStore};
use flow::{BsaLock, DownloadScheduler, FileSnapshotStore};
use log::{info, warn};
use std::sync::Arc;

/// Fábrica de `BsaDownloadAction`.
///
/// `from_env`/`from_config` arman la acción de producción (Diesel, store en
/// disco, colaboradores sobre directorios). `assemble` recibe piezas ya
/// construidas, lo que permite cablear implementaciones en memoria.
pub struct BsaActionFactory;

impl BsaActionFactory {
  /// Lee la configuración del entorno y arma la acción.
  pub fn from_env() -> Result<BsaDownloadAction, WorkflowError> {
    let config = DownloadConfig::from_env()?;
    Self::from_config(config)
  }

  pub fn from_config(config: DownloadConfig) -> Result<BsaDownloadAction, WorkflowError> {
    config.validate()?;
    let repos = DieselRepositories::connect(&config.database_url)?;
    if config.enrolled_tlds.is_empty() {
      warn!("BSA_ENROLLED_TLDS está vacío: no se contarán dominios no bloqueables");
    }
    let idn_checker = StaticIdnChecker::ldh_only(config.enrolled_tlds.iter().cloned());
    info!("Pipeline BSA con base {} y store {}", config.redacted_database_url(), config.snapshot_dir.display());
    Ok(Self::assemble(config.clone(),
                      Arc::new(repos.labels),
                      Arc::new(repos.jobs),
                      Arc::new(repos.lock),
                      Arc::new(FileSnapshotStore::new(config.snapshot_dir.clone())),
                      Arc::new(DirectoryBlockListFetcher::new(config.block_list_dir.clone())),
                      Arc::new(SpoolReportSender::new(config.report_spool_dir.clone())),
                      Arc::new(idn_checker),
                      Arc::new(SystemClock)))
  }

  /// Cablea la acción con las piezas dadas.
  #[allow(clippy::too_many_arguments)]
  pub fn assemble(config: DownloadConfig,
                  label_repo: Arc<dyn LabelRepository>,
                  job_repo: Arc<dyn JobRepository>,
                  lock: Arc<dyn ExecutionLock>,
                  snapshot_store: Arc<dyn SnapshotStore>,
                  fetcher: Arc<dyn BlockListFetcher>,
                  report_sender: Arc<dyn ReportSender>,
                  idn_checker: Arc<dyn IdnChecker>,
                  clock: Arc<dyn Clock>)
                  -> BsaDownloadAction {
    let scheduler = DownloadScheduler::new(job_repo, config.download_interval(), config.max_nop_interval());
    let bsa_lock = BsaLock::new(lock, clock.clone(), config.lock_lease());
    let services = PipelineServices { label_repo,
                                      snapshot_store,
                                      fetcher,
                                      report_sender,
                                      idn_checker,
                                      clock,
                                      config };
    BsaDownloadAction::new(scheduler, bsa_lock, services)
  }
}
