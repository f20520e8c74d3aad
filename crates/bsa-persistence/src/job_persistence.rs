use crate::connection::{from_ms, is_busy, repeatable_read, to_ms, DbPool, PooledConn};
use crate::schema;
use crate::schema::bsa_download::dsl as bd;
use crate::schema::execution_lock::dsl as lk;
use bsa_domain::DomainError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use flow::domain::{checksums_to_string, parse_checksums, Checksums, DownloadJob, DownloadStage, LeaseToken,
                   PersistResult};
use flow::errors::{FlowError, Result};
use flow::repository::{ExecutionLock, JobRepository};
use std::sync::Arc;
use std::time::Duration;
#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = schema::bsa_download)]
struct DownloadRow {
  pub job_id: i64,
  pub creation_time_ts: i64,
  pub update_time_ts: i64,
  pub stage: String,
  pub block_list_checksums: String,
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::execution_lock)]
struct LockRow {
  pub resource_name: String,
  pub owner: String,
  pub token: String,
  pub acquired_time_ts: i64,
  pub expire_time_ts: i64,
}
fn map_db_err(e: DieselError) -> FlowError {
  FlowError::Storage(format!("db: {}", e))
}
fn map_domain_err(e: DomainError) -> FlowError {
  FlowError::Storage(e.to_string())
}
impl DownloadRow {
  fn into_job(self) -> Result<DownloadJob> {
    Ok(DownloadJob { job_id: self.job_id,
                     creation_time: from_ms(self.creation_time_ts).map_err(map_domain_err)?,
                     update_time: from_ms(self.update_time_ts).map_err(map_domain_err)?,
                     stage: self.stage.parse()?,
                     checksums: parse_checksums(&self.block_list_checksums)? })
  }
}
/// Repo Diesel que implementa `JobRepository` sobre la tabla `bsa_download`.
pub struct DieselJobRepository {
  pool: Arc<DbPool>,
}
impl DieselJobRepository {
  pub fn from_pool(pool: Arc<DbPool>) -> Self {
    Self { pool }
  }
  fn conn(&self) -> Result<PooledConn> {
    self.pool.get().map_err(|e| FlowError::Storage(format!("pool: {}", e)))
  }
}
/// Resultado interno del cambio de stage dentro de la transacción.
enum StageWrite {
  Missing,
  Conflict(String),
  Written(DownloadRow),
}
impl JobRepository for DieselJobRepository {
  fn create_job(&self, creation_time: DateTime<Utc>) -> Result<DownloadJob> {
    let mut conn = self.conn()?;
    let row = repeatable_read(&mut conn, |c| {
                let max = bd::bsa_download.select(diesel::dsl::max(bd::job_id)).first::<Option<i64>>(c)?;
                let row = DownloadRow { job_id: max.unwrap_or(0) + 1,
                                        creation_time_ts: to_ms(creation_time),
                                        update_time_ts: to_ms(creation_time),
                                        stage: DownloadStage::Download.as_str().to_string(),
                                        block_list_checksums: String::new() };
                diesel::insert_into(bd::bsa_download).values(&row).execute(c)?;
                Ok(row)
              }).map_err(map_db_err)?;
    row.into_job()
  }
  fn get_job(&self, job_id: i64) -> Result<DownloadJob> {
    let mut conn = self.conn()?;
    bd::bsa_download.filter(bd::job_id.eq(job_id))
                    .first::<DownloadRow>(&mut conn)
                    .optional()
                    .map_err(map_db_err)?
                    .ok_or(FlowError::NotFound(format!("job {}", job_id)))?
                    .into_job()
  }
  fn latest_job(&self) -> Result<Option<DownloadJob>> {
    let mut conn = self.conn()?;
    bd::bsa_download.order(bd::job_id.desc())
                    .first::<DownloadRow>(&mut conn)
                    .optional()
                    .map_err(map_db_err)?
                    .map(DownloadRow::into_job)
                    .transpose()
  }
  fn latest_job_in_stage(&self, stage: DownloadStage) -> Result<Option<DownloadJob>> {
    let mut conn = self.conn()?;
    bd::bsa_download.filter(bd::stage.eq(stage.as_str()))
                    .order(bd::job_id.desc())
                    .first::<DownloadRow>(&mut conn)
                    .optional()
                    .map_err(map_db_err)?
                    .map(DownloadRow::into_job)
                    .transpose()
  }
  fn persist_stage(&self,
                   job_id: i64,
                   expected: DownloadStage,
                   new_stage: DownloadStage,
                   checksums: Option<&Checksums>,
                   now: DateTime<Utc>)
                   -> Result<PersistResult> {
    let mut conn = self.conn()?;
    let now_ms = to_ms(now);
    let write = repeatable_read(&mut conn, |c| {
                  let Some(row) = bd::bsa_download.filter(bd::job_id.eq(job_id)).first::<DownloadRow>(c).optional()?
                  else {
                    return Ok(StageWrite::Missing);
                  };
                  if row.stage != expected.as_str() {
                    return Ok(StageWrite::Conflict(row.stage));
                  }
                  let cs = checksums.map(checksums_to_string).unwrap_or_else(|| row.block_list_checksums.clone());
                  diesel::update(bd::bsa_download.filter(bd::job_id.eq(job_id)))
                    .set((bd::stage.eq(new_stage.as_str()), bd::update_time_ts.eq(now_ms), bd::block_list_checksums.eq(&cs)))
                    .execute(c)?;
                  Ok(StageWrite::Written(DownloadRow { stage: new_stage.as_str().to_string(),
                                                       update_time_ts: now_ms,
                                                       block_list_checksums: cs,
                                                       ..row }))
                }).map_err(map_db_err)?;
    match write {
      StageWrite::Missing => Err(FlowError::NotFound(format!("job {}", job_id))),
      StageWrite::Conflict(actual) => Ok(PersistResult::Conflict { actual: actual.parse()? }),
      StageWrite::Written(row) => Ok(PersistResult::Ok { job: row.into_job()? }),
    }
  }
}
/// Lock por leases sobre la tabla `execution_lock`.
pub struct DieselExecutionLock {
  pool: Arc<DbPool>,
}
impl DieselExecutionLock {
  pub fn from_pool(pool: Arc<DbPool>) -> Self {
    Self { pool }
  }
  fn conn(&self) -> Result<PooledConn> {
    self.pool.get().map_err(|e| FlowError::Storage(format!("pool: {}", e)))
  }
}
impl ExecutionLock for DieselExecutionLock {
  fn try_acquire(&self, resource: &str, owner: &str, lease: Duration, now: DateTime<Utc>) -> Result<Option<LeaseToken>> {
    let lease = chrono::Duration::from_std(lease).map_err(|e| FlowError::Other(format!("lease inválido: {}", e)))?;
    let expire_ms = now.checked_add_signed(lease)
                       .map(to_ms)
                       .ok_or_else(|| FlowError::Other(format!("lease de {}s desborda la fecha de expiración", lease.num_seconds())))?;
    let now_ms = to_ms(now);
    let token = LeaseToken::generate();
    let mut conn = self.conn()?;
    let res = repeatable_read(&mut conn, |c| {
      let current = lk::execution_lock.filter(lk::resource_name.eq(resource)).first::<LockRow>(c).optional()?;
      if let Some(cur) = &current {
        if cur.expire_time_ts > now_ms && cur.owner != owner {
          return Ok(false);
        }
        diesel::delete(lk::execution_lock.filter(lk::resource_name.eq(resource))).execute(c)?;
      }
      let row = LockRow { resource_name: resource.to_string(),
                          owner: owner.to_string(),
                          token: token.0.clone(),
                          acquired_time_ts: now_ms,
                          expire_time_ts: expire_ms };
      diesel::insert_into(lk::execution_lock).values(&row).execute(c)?;
      Ok(true)
    });
    match res {
      Ok(true) => Ok(Some(token)),
      Ok(false) => Ok(None),
      // otro proceso ganó la carrera por la misma fila
      Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
      | Err(DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _)) => Ok(None),
      // el escritor concurrente sigue dentro de su transacción
      Err(e) if is_busy(&e) => {
        log::info!("Lock {} ocupado por otra transacción: {}", resource, e);
        Ok(None)
      }
      Err(e) => Err(map_db_err(e)),
    }
  }
  fn release(&self, resource: &str, token: &LeaseToken) -> Result<bool> {
    let mut conn = self.conn()?;
    let n = diesel::delete(lk::execution_lock.filter(lk::resource_name.eq(resource)).filter(lk::token.eq(&token.0)))
              .execute(&mut conn)
              .map_err(map_db_err)?;
    Ok(n > 0)
  }
}
