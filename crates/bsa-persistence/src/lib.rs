//! Persistencia Diesel del pipeline BSA.
//! Expone el módulo `schema`, el pool con migraciones embebidas y los
//! repositorios que implementan `LabelRepository` (bsa-domain) y
//! `JobRepository`/`ExecutionLock` (flow). SQLite por defecto; la feature
//! `pg` cambia el backend a Postgres.

mod connection;
mod job_persistence;
mod label_persistence;
pub mod schema;

pub use connection::{build_pool, DbConn, DbPool, END_OF_TIME_MS, MIGRATIONS};
pub use job_persistence::{DieselExecutionLock, DieselJobRepository};
pub use label_persistence::DieselLabelRepository;

use bsa_domain::DomainError;

/// Los tres repositorios Diesel compartiendo un mismo pool.
pub struct DieselRepositories {
  pub labels: DieselLabelRepository,
  pub jobs: DieselJobRepository,
  pub lock: DieselExecutionLock,
}

impl DieselRepositories {
  /// Conecta a `database_url`, aplica migraciones y construye los
  /// repositorios.
  pub fn connect(database_url: &str) -> Result<Self, DomainError> {
    let pool = build_pool(database_url)?;
    Ok(Self { labels: DieselLabelRepository::from_pool(pool.clone()),
              jobs: DieselJobRepository::from_pool(pool.clone()),
              lock: DieselExecutionLock::from_pool(pool) })
  }
}
