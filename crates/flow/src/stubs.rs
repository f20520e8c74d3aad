// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye un repositorio de jobs (`InMemoryJobRepository`), un store de
// artefactos (`InMemorySnapshotStore`) y un lock por leases
// (`InMemoryExecutionLock`). No son durables.
use crate::domain::{ArtifactKind, Checksums, DownloadJob, DownloadStage, LeaseToken, PersistResult};
use crate::errors::{FlowError, Result};
use crate::repository::{ArtifactWriter, ExecutionLock, JobRepository, SnapshotStore};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Helper para mapear `Mutex::lock()` en un `Result` con
/// `FlowError::Storage`.
fn lock<T>(m: &Mutex<T>) -> std::result::Result<MutexGuard<'_, T>, FlowError> {
    m.lock().map_err(|e| FlowError::Storage(format!("mutex poisoned: {:?}", e)))
}

/// Repositorio de jobs en memoria.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<BTreeMap<i64, DownloadJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta un job tal cual (para preparar escenarios en pruebas).
    pub fn insert(&self, job: DownloadJob) -> Result<()> {
        lock(&self.jobs)?.insert(job.job_id, job);
        Ok(())
    }

    pub fn all_jobs(&self) -> Result<Vec<DownloadJob>> {
        Ok(lock(&self.jobs)?.values().cloned().collect())
    }
}

impl JobRepository for InMemoryJobRepository {
    fn create_job(&self, creation_time: DateTime<Utc>) -> Result<DownloadJob> {
        let mut jobs = lock(&self.jobs)?;
        let job_id = jobs.keys().next_back().map_or(1, |max| max + 1);
        let job = DownloadJob { job_id,
                                creation_time,
                                update_time: creation_time,
                                stage: DownloadStage::Download,
                                checksums: Checksums::new() };
        jobs.insert(job_id, job.clone());
        Ok(job)
    }

    fn get_job(&self, job_id: i64) -> Result<DownloadJob> {
        lock(&self.jobs)?.get(&job_id)
                         .cloned()
                         .ok_or(FlowError::NotFound(format!("job {}", job_id)))
    }

    fn latest_job(&self) -> Result<Option<DownloadJob>> {
        Ok(lock(&self.jobs)?.values().next_back().cloned())
    }

    fn latest_job_in_stage(&self, stage: DownloadStage) -> Result<Option<DownloadJob>> {
        Ok(lock(&self.jobs)?.values().rev().find(|j| j.stage == stage).cloned())
    }

    fn persist_stage(&self,
                     job_id: i64,
                     expected: DownloadStage,
                     new_stage: DownloadStage,
                     checksums: Option<&Checksums>,
                     now: DateTime<Utc>)
                     -> Result<PersistResult> {
        let mut jobs = lock(&self.jobs)?;
        let job = jobs.get_mut(&job_id)
                      .ok_or(FlowError::NotFound(format!("job {}", job_id)))?;
        if job.stage != expected {
            return Ok(PersistResult::Conflict { actual: job.stage });
        }
        job.stage = new_stage;
        job.update_time = now;
        if let Some(cs) = checksums {
            job.checksums = cs.clone();
        }
        Ok(PersistResult::Ok { job: job.clone() })
    }
}

type BlobMap = HashMap<(String, String), Vec<u8>>;

/// Store de artefactos en memoria, indexado por (job, archivo).
#[derive(Debug, Default, Clone)]
pub struct InMemorySnapshotStore {
    blobs: Arc<Mutex<BlobMap>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(job_name: &str, artifact: ArtifactKind) -> (String, String) {
        (job_name.to_string(), artifact.file_name())
    }

    /// Guarda bytes directamente (para preparar escenarios en pruebas).
    pub fn put(&self, job_name: &str, artifact: ArtifactKind, bytes: &[u8]) -> Result<()> {
        lock(&self.blobs)?.insert(Self::key(job_name, artifact), bytes.to_vec());
        Ok(())
    }

    /// Lee un artefacto como texto. `None` si no existe.
    pub fn read_to_string(&self, job_name: &str, artifact: ArtifactKind) -> Result<Option<String>> {
        let blobs = lock(&self.blobs)?;
        match blobs.get(&Self::key(job_name, artifact)) {
            Some(bytes) => String::from_utf8(bytes.clone()).map(Some)
                                                           .map_err(|e| FlowError::Storage(e.to_string())),
            None => Ok(None),
        }
    }
}

struct InMemoryArtifactWriter {
    key: (String, String),
    buf: Vec<u8>,
    blobs: Arc<Mutex<BlobMap>>,
}

impl Write for InMemoryArtifactWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl ArtifactWriter for InMemoryArtifactWriter {
    fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryArtifactWriter { key, buf, blobs } = *self;
        lock(&blobs)?.insert(key, buf);
        Ok(())
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn create(&self, job_name: &str, artifact: ArtifactKind) -> Result<Box<dyn ArtifactWriter>> {
        Ok(Box::new(InMemoryArtifactWriter { key: Self::key(job_name, artifact),
                                             buf: Vec::new(),
                                             blobs: Arc::clone(&self.blobs) }))
    }

    fn open(&self, job_name: &str, artifact: ArtifactKind) -> Result<Box<dyn Read + Send>> {
        let blobs = lock(&self.blobs)?;
        let bytes = blobs.get(&Self::key(job_name, artifact))
                         .cloned()
                         .ok_or(FlowError::NotFound(format!("{}/{}", job_name, artifact)))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn exists(&self, job_name: &str, artifact: ArtifactKind) -> Result<bool> {
        Ok(lock(&self.blobs)?.contains_key(&Self::key(job_name, artifact)))
    }
}

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    token: LeaseToken,
    expires_at: DateTime<Utc>,
}

/// Lock por leases en memoria. Un lease vencido puede tomarlo cualquiera;
/// el mismo dueño puede renovarlo.
#[derive(Debug, Default)]
pub struct InMemoryExecutionLock {
    leases: DashMap<String, Lease>,
}

impl InMemoryExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dueño del lease vigente en `now`, si lo hay.
    pub fn holder(&self, resource: &str, now: DateTime<Utc>) -> Option<String> {
        self.leases
            .get(resource)
            .filter(|l| l.expires_at > now)
            .map(|l| l.owner.clone())
    }
}

pub(crate) fn lease_expiry(now: DateTime<Utc>, lease: Duration) -> Result<DateTime<Utc>> {
    let lease = chrono::Duration::from_std(lease).map_err(|e| FlowError::Other(format!("lease inválido: {}", e)))?;
    now.checked_add_signed(lease)
       .ok_or_else(|| FlowError::Other(format!("lease de {}s desborda la fecha de expiración", lease.num_seconds())))
}

impl ExecutionLock for InMemoryExecutionLock {
    fn try_acquire(&self, resource: &str, owner: &str, lease: Duration, now: DateTime<Utc>)
                   -> Result<Option<LeaseToken>> {
        let expires_at = lease_expiry(now, lease)?;
        let token = LeaseToken::generate();
        let fresh = Lease { owner: owner.to_string(), token: token.clone(), expires_at };
        match self.leases.entry(resource.to_string()) {
            Entry::Occupied(mut e) => {
                let current = e.get();
                if current.expires_at > now && current.owner != owner {
                    return Ok(None);
                }
                e.insert(fresh);
            }
            Entry::Vacant(e) => {
                e.insert(fresh);
            }
        }
        Ok(Some(token))
    }

    fn release(&self, resource: &str, token: &LeaseToken) -> Result<bool> {
        Ok(self.leases.remove_if(resource, |_, l| l.token == *token).is_some())
    }
}
