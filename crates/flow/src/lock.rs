// Archivo: lock.rs
// Propósito: ejecutar una invocación del pipeline bajo el lock distribuido.
use crate::clock::Clock;
use crate::domain::LeaseToken;
use crate::errors::FlowError;
use crate::repository::ExecutionLock;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Nombre del recurso que protege al pipeline de descarga.
pub const BSA_LOCK_NAME: &str = "bsa_download";

/// Envuelve un `ExecutionLock` para ejecutar trabajo con exclusión mutua.
/// Cada llamada usa un dueño nuevo, así dos invocaciones nunca comparten
/// lease.
pub struct BsaLock {
    lock: Arc<dyn ExecutionLock>,
    clock: Arc<dyn Clock>,
    lease: Duration,
    resource: String,
}

impl BsaLock {
    pub fn new(lock: Arc<dyn ExecutionLock>, clock: Arc<dyn Clock>, lease: Duration) -> Self {
        Self { lock, clock, lease, resource: BSA_LOCK_NAME.to_string() }
    }

    /// Ejecuta `work` si se adquiere el lock y lo libera al terminar, falle
    /// o no `work`. Devuelve `Ok(None)` si otro proceso tiene el lock.
    pub fn execute_with_lock<T, E, F>(&self, work: F) -> Result<Option<T>, E>
        where F: FnOnce() -> Result<T, E>,
              E: From<FlowError>
    {
        let owner = Uuid::new_v4().to_string();
        let Some(token) = self.lock.try_acquire(&self.resource, &owner, self.lease, self.clock.now())? else {
            return Ok(None);
        };
        debug!("Lock {} adquirido por {}", self.resource, owner);
        let _guard = LeaseGuard { lock: self.lock.as_ref(), resource: &self.resource, token };
        work().map(Some)
    }
}

struct LeaseGuard<'a> {
    lock: &'a dyn ExecutionLock,
    resource: &'a str,
    token: LeaseToken,
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        match self.lock.release(self.resource, &self.token) {
            Ok(true) => debug!("Lock {} liberado", self.resource),
            Ok(false) => warn!("El lease de {} expiró antes de liberarlo", self.resource),
            Err(e) => warn!("No se pudo liberar el lock {}: {}", self.resource, e),
        }
    }
}
