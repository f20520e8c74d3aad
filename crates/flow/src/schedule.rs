// Archivo: schedule.rs
// Propósito: decidir qué job ejecuta una invocación (`DownloadScheduler`)
// y registrar su avance (`DownloadSchedule`).
use crate::domain::{Checksums, CompletedJob, DownloadJob, DownloadStage, PersistResult};
use crate::errors::{FlowError, Result};
use crate::repository::JobRepository;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::sync::Arc;

/// Job a ejecutar en esta invocación, con el último job completado contra
/// el que se calcula el diff.
///
/// Es el único escritor del stage del job mientras la invocación tiene el
/// lock.
pub struct DownloadSchedule {
    repo: Arc<dyn JobRepository>,
    job_id: i64,
    job_creation_time: DateTime<Utc>,
    job_name: String,
    stage: DownloadStage,
    latest_completed: Option<CompletedJob>,
    always_download: bool,
}

impl std::fmt::Debug for DownloadSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSchedule")
         .field("job_id", &self.job_id)
         .field("job_name", &self.job_name)
         .field("stage", &self.stage)
         .field("latest_completed", &self.latest_completed)
         .field("always_download", &self.always_download)
         .finish()
    }
}

impl DownloadSchedule {
    fn new(repo: Arc<dyn JobRepository>, job: &DownloadJob, latest_completed: Option<CompletedJob>, always_download: bool)
           -> Self {
        Self { repo,
               job_id: job.job_id,
               job_creation_time: job.creation_time,
               job_name: job.job_name(),
               stage: job.stage,
               latest_completed,
               always_download }
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub fn job_creation_time(&self) -> DateTime<Utc> {
        self.job_creation_time
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn stage(&self) -> DownloadStage {
        self.stage
    }

    pub fn latest_completed(&self) -> Option<&CompletedJob> {
        self.latest_completed.as_ref()
    }

    pub fn always_download(&self) -> bool {
        self.always_download
    }

    /// Avanza el job a `stage`. Falla si `stage` no es posterior al actual o
    /// si otro escritor cambió el stage persistido.
    pub fn update_job_stage(&mut self, stage: DownloadStage, now: DateTime<Utc>) -> Result<()> {
        if stage <= self.stage {
            return Err(FlowError::Other(format!("job {}: el stage no avanza ({} -> {})", self.job_id, self.stage, stage)));
        }
        self.persist(stage, None, now)
    }

    /// Avanza el job desde `Download` guardando los checksums de las listas.
    /// Sólo admite `MakeDiff`, `Nop` o `ChecksumsNotMatch` como destino.
    pub fn update_job_stage_with_checksums(&mut self, stage: DownloadStage, checksums: &Checksums, now: DateTime<Utc>)
                                           -> Result<()> {
        if self.stage != DownloadStage::Download {
            return Err(FlowError::Other(format!("job {}: checksums sólo se guardan desde DOWNLOAD, stage actual {}",
                                                self.job_id, self.stage)));
        }
        if !matches!(stage, DownloadStage::MakeDiff | DownloadStage::Nop | DownloadStage::ChecksumsNotMatch) {
            return Err(FlowError::Other(format!("job {}: destino inválido tras la descarga: {}", self.job_id, stage)));
        }
        self.persist(stage, Some(checksums), now)
    }

    fn persist(&mut self, stage: DownloadStage, checksums: Option<&Checksums>, now: DateTime<Utc>) -> Result<()> {
        match self.repo.persist_stage(self.job_id, self.stage, stage, checksums, now)? {
            PersistResult::Ok { job } => {
                self.stage = job.stage;
                Ok(())
            }
            PersistResult::Conflict { actual } => {
                Err(FlowError::Conflict(format!("job {}: se esperaba {} pero el stage persistido es {}",
                                                self.job_id, self.stage, actual)))
            }
        }
    }
}

/// Decide si hay que crear un job nuevo, reanudar uno en vuelo o no hacer
/// nada.
pub struct DownloadScheduler {
    repo: Arc<dyn JobRepository>,
    download_interval: Duration,
    max_nop_interval: Duration,
}

impl DownloadScheduler {
    pub fn new(repo: Arc<dyn JobRepository>, download_interval: Duration, max_nop_interval: Duration) -> Self {
        Self { repo, download_interval, max_nop_interval }
    }

    /// Devuelve el job a ejecutar, o `None` si no toca hacer nada.
    ///
    /// - Sin jobs: crea el primero.
    /// - Último job en vuelo: lo reanuda en su stage.
    /// - Último job `Done`/`Nop` con `download_interval` cumplido: crea uno
    ///   nuevo.
    /// - Último job `ChecksumsNotMatch`: nada (requiere un operador).
    pub fn schedule(&self, now: DateTime<Utc>) -> Result<Option<DownloadSchedule>> {
        let Some(latest) = self.repo.latest_job()? else {
            let job = self.repo.create_job(now)?;
            info!("Creado el primer job de descarga {} ({})", job.job_id, job.job_name());
            return Ok(Some(DownloadSchedule::new(self.repo.clone(), &job, None, true)));
        };
        match latest.stage {
            DownloadStage::ChecksumsNotMatch => {
                warn!("El job {} terminó en {}; se necesita intervención manual.", latest.job_id, latest.stage);
                Ok(None)
            }
            DownloadStage::Done | DownloadStage::Nop => {
                if now - latest.creation_time < self.download_interval {
                    return Ok(None);
                }
                let completed = self.latest_completed_before(i64::MAX)?;
                let always_download = self.needs_full_download(completed.as_ref(), now);
                let job = self.repo.create_job(now)?;
                info!("Creado el job de descarga {} ({})", job.job_id, job.job_name());
                Ok(Some(DownloadSchedule::new(self.repo.clone(), &job, completed.map(|c| CompletedJob::from(&c)), always_download)))
            }
            _ => {
                let completed = self.latest_completed_before(latest.job_id)?;
                let always_download = self.needs_full_download(completed.as_ref(), now);
                info!("Reanudando el job {} en {}", latest.job_id, latest.stage);
                Ok(Some(DownloadSchedule::new(self.repo.clone(), &latest, completed.map(|c| CompletedJob::from(&c)), always_download)))
            }
        }
    }

    fn latest_completed_before(&self, job_id: i64) -> Result<Option<DownloadJob>> {
        Ok(self.repo
               .latest_job_in_stage(DownloadStage::Done)?
               .filter(|j| j.job_id < job_id))
    }

    fn needs_full_download(&self, completed: Option<&DownloadJob>, now: DateTime<Utc>) -> bool {
        completed.map_or(true, |c| now - c.creation_time >= self.max_nop_interval)
    }
}
