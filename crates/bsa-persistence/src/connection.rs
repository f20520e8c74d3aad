// Archivo: connection.rs
// Propósito: pool r2d2, migraciones embebidas y helpers de transacción
// compartidos por los repositorios Diesel.
use bsa_domain::DomainError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(feature = "pg")]
pub type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
pub type DbConn = SqliteConnection;
pub type DbPool = Pool<ConnectionManager<DbConn>>;
pub(crate) type PooledConn = PooledConnection<ConnectionManager<DbConn>>;
/// Marca de "no borrado" para `deletion_time_ts`.
pub const END_OF_TIME_MS: i64 = i64::MAX;
/// Máximo de parámetros por `IN (...)`; SQLite limita las variables por
/// sentencia.
pub(crate) const QUERY_CHUNK: usize = 500;
/// Ajustes por conexión de SQLite: espera ante locks y claves foráneas.
#[cfg(not(feature = "pg"))]
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas;
#[cfg(not(feature = "pg"))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn)
                                                     .map_err(diesel::r2d2::Error::QueryError)?;
    diesel::sql_query("PRAGMA foreign_keys = ON;").execute(conn)
                                                   .map_err(diesel::r2d2::Error::QueryError)?;
    Ok(())
  }
}
/// Crea el pool y aplica las migraciones pendientes.
pub fn build_pool(database_url: &str) -> Result<Arc<DbPool>, DomainError> {
  let manager = ConnectionManager::<DbConn>::new(database_url);
  let builder = Pool::builder().max_size(4);
  #[cfg(not(feature = "pg"))]
  let builder = builder.connection_customizer(Box::new(SqlitePragmas));
  let pool = builder.build(manager)
                    .map_err(|e| DomainError::ExternalError(format!("no se pudo crear el pool de conexiones: {}", e)))?;
  let mut c = pool.get().map_err(|e| DomainError::ExternalError(format!("pool: {}", e)))?;
  #[cfg(not(feature = "pg"))]
  match enable_wal(&mut c) {
    Ok(mode) if mode.eq_ignore_ascii_case("wal") => {}
    Ok(mode) => log::warn!("SQLite mantiene journal_mode = {}; los lectores pueden bloquear al escritor", mode),
    Err(e) => log::warn!("No se pudo activar WAL: {}", e),
  }
  let applied = c.run_pending_migrations(MIGRATIONS)
                 .map_err(|e| DomainError::ExternalError(format!("migraciones: {}", e)))?;
  if !applied.is_empty() {
    log::info!("Aplicadas {} migraciones", applied.len());
  }
  Ok(Arc::new(pool))
}
#[cfg(not(feature = "pg"))]
#[derive(QueryableByName)]
struct JournalMode {
  #[diesel(sql_type = diesel::sql_types::Text)]
  journal_mode: String,
}
/// Pide modo WAL y devuelve el `journal_mode` que SQLite dejó activo
/// (`memory` para bases en memoria).
#[cfg(not(feature = "pg"))]
pub(crate) fn enable_wal(conn: &mut SqliteConnection) -> Result<String, DieselError> {
  let rows = diesel::sql_query("PRAGMA journal_mode = WAL;").load::<JournalMode>(conn)?;
  Ok(rows.into_iter().next().map(|r| r.journal_mode).unwrap_or_default())
}
/// `true` si el error es SQLITE_BUSY/SQLITE_LOCKED: otro proceso retiene el
/// lock de escritura más allá de `busy_timeout`. Diesel lo reporta como
/// `DatabaseErrorKind::Unknown`, así que se reconoce por el mensaje.
pub(crate) fn is_busy(e: &DieselError) -> bool {
  match e {
    DieselError::DatabaseError(_, info) => {
      let msg = info.message();
      msg.contains("database is locked") || msg.contains("database table is locked")
    }
    _ => false,
  }
}
/// Ejecuta `f` en una transacción que no ve escrituras concurrentes:
/// REPEATABLE READ en Postgres, `BEGIN IMMEDIATE` (serializable) en SQLite.
pub(crate) fn repeatable_read<T, F>(conn: &mut DbConn, f: F) -> Result<T, DieselError>
  where F: FnOnce(&mut DbConn) -> Result<T, DieselError>
{
  #[cfg(feature = "pg")]
  {
    conn.build_transaction().repeatable_read().run(f)
  }
  #[cfg(not(feature = "pg"))]
  {
    conn.immediate_transaction(f)
  }
}
pub(crate) fn map_db_err(e: DieselError) -> DomainError {
  DomainError::ExternalError(format!("db: {}", e))
}
pub(crate) fn to_ms(t: DateTime<Utc>) -> i64 {
  t.timestamp_millis()
}
pub(crate) fn from_ms(ms: i64) -> Result<DateTime<Utc>, DomainError> {
  DateTime::from_timestamp_millis(ms).ok_or_else(|| DomainError::SerializationError(format!("timestamp fuera de rango: {}", ms)))
}
