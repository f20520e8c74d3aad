// Archivo: repository.rs
// Propósito: definir los contratos que deben implementar las persistencias
// (Diesel, in-memory, disco): el repositorio de jobs, el store de
// artefactos por job y el lock distribuido.
use crate::domain::{ArtifactKind, Checksums, DownloadJob, DownloadStage, LeaseToken, PersistResult};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use std::io::{Read, Write};
use std::time::Duration;

/// Contrato del repositorio de jobs de descarga.
///
/// Los stages sólo avanzan; `persist_stage` recibe el stage que el caller
/// cree vigente y devuelve `PersistResult::Conflict` si el persistido es
/// otro (control optimista al estilo `expected_version`).
pub trait JobRepository: Send + Sync {
    /// Crea un job en `Download`. El repositorio asigna el id
    /// (`max(job_id) + 1`) dentro de la misma transacción.
    fn create_job(&self, creation_time: DateTime<Utc>) -> Result<DownloadJob>;

    /// Obtiene un job por id. `NotFound` si no existe.
    fn get_job(&self, job_id: i64) -> Result<DownloadJob>;

    /// Job con mayor id, si existe.
    fn latest_job(&self) -> Result<Option<DownloadJob>>;

    /// Job con mayor id que está en `stage`, si existe.
    fn latest_job_in_stage(&self, stage: DownloadStage) -> Result<Option<DownloadJob>>;

    /// Mueve el job de `expected` a `new_stage`. Si se pasan checksums se
    /// guardan en la misma escritura.
    fn persist_stage(&self,
                     job_id: i64,
                     expected: DownloadStage,
                     new_stage: DownloadStage,
                     checksums: Option<&Checksums>,
                     now: DateTime<Utc>)
                     -> Result<PersistResult>;
}

/// Escritor de un artefacto. El contenido sólo se publica al llamar a
/// `commit`; si el escritor se descarta antes, el artefacto no existe (o
/// conserva su versión anterior).
pub trait ArtifactWriter: Write + Send {
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Store de artefactos organizado por carpeta de job.
pub trait SnapshotStore: Send + Sync {
    /// Abre un escritor para el artefacto. Reescribir un artefacto lo
    /// reemplaza completo.
    fn create(&self, job_name: &str, artifact: ArtifactKind) -> Result<Box<dyn ArtifactWriter>>;

    /// Abre un artefacto para lectura. `NotFound` si no existe.
    fn open(&self, job_name: &str, artifact: ArtifactKind) -> Result<Box<dyn Read + Send>>;

    fn exists(&self, job_name: &str, artifact: ArtifactKind) -> Result<bool>;
}

/// Lock distribuido basado en leases. Un lease expira solo tras `lease`,
/// por lo que un proceso caído no bloquea para siempre.
pub trait ExecutionLock: Send + Sync {
    /// Intenta adquirir `resource` para `owner`. Devuelve `None` si otro
    /// dueño tiene un lease vigente.
    fn try_acquire(&self, resource: &str, owner: &str, lease: Duration, now: DateTime<Utc>)
                   -> Result<Option<LeaseToken>>;

    /// Libera el lease si `token` sigue siendo el vigente. Devuelve `false`
    /// si el lease ya había expirado y otro lo tomó.
    fn release(&self, resource: &str, token: &LeaseToken) -> Result<bool>;
}
