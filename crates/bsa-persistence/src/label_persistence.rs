use crate::connection::{from_ms, map_db_err, repeatable_read, to_ms, DbConn, DbPool, PooledConn,
                        END_OF_TIME_MS, QUERY_CHUNK};
use crate::schema;
use crate::schema::bsa_domain_in_use::dsl as diu_dsl;
use crate::schema::bsa_label::dsl as label_dsl;
use crate::schema::registered_domain::dsl as reg_dsl;
use crate::schema::reserved_domain::dsl as res_dsl;
use bsa_domain::{BsaDomainInUse, BsaLabel, DomainError, LabelRepository, LabelTransaction};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use std::collections::BTreeSet;
use std::sync::Arc;
/// Repo Diesel que implementa `LabelRepository`.
pub struct DieselLabelRepository {
  pool: Arc<DbPool>,
}
// Diesel row structs for the label tables
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::bsa_label)]
struct LabelRow {
  pub label: String,
  pub creation_time_ts: i64,
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::bsa_domain_in_use)]
struct DomainInUseRow {
  pub label: String,
  pub tld: String,
  pub reason: String,
}
#[derive(Debug, Insertable)]
#[diesel(table_name = schema::registered_domain)]
struct RegisteredDomainRow {
  pub domain_name: String,
  pub creation_time_ts: i64,
  pub deletion_time_ts: i64,
}
impl LabelRow {
  fn into_label(self) -> Result<BsaLabel, DomainError> {
    Ok(BsaLabel::new(self.label, from_ms(self.creation_time_ts)?))
  }
}
impl DomainInUseRow {
  fn into_record(self) -> Result<BsaDomainInUse, DomainError> {
    let reason = self.reason.parse()?;
    Ok(BsaDomainInUse::new(self.label, self.tld, reason))
  }
}
impl DieselLabelRepository {
  /// Reutiliza un pool existente (compartido con los demás repositorios).
  pub fn from_pool(pool: Arc<DbPool>) -> Self {
    Self { pool }
  }
  fn conn(&self) -> Result<PooledConn, DomainError> {
    self.pool.get().map_err(|e| DomainError::ExternalError(format!("pool: {}", e)))
  }
  /// Registra el alta de un dominio en la vista del registro.
  pub fn register_domain(&self, domain_name: &str, creation_time: DateTime<Utc>) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    let row = RegisteredDomainRow { domain_name: domain_name.to_string(),
                                    creation_time_ts: to_ms(creation_time),
                                    deletion_time_ts: END_OF_TIME_MS };
    diesel::insert_into(reg_dsl::registered_domain).values(&row)
                                                   .execute(&mut conn)
                                                   .map_err(map_db_err)?;
    Ok(())
  }
  /// Marca como borradas las altas vigentes de un dominio.
  pub fn delete_domain(&self, domain_name: &str, deletion_time: DateTime<Utc>) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    let n = diesel::update(reg_dsl::registered_domain.filter(reg_dsl::domain_name.eq(domain_name))
                                                     .filter(reg_dsl::deletion_time_ts.eq(END_OF_TIME_MS)))
            .set(reg_dsl::deletion_time_ts.eq(to_ms(deletion_time)))
            .execute(&mut conn)
            .map_err(map_db_err)?;
    if n == 0 {
      return Err(DomainError::ValidationError(format!("dominio no registrado: {}", domain_name)));
    }
    Ok(())
  }
  pub fn reserve_domain(&self, domain_name: &str) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    diesel::insert_into(res_dsl::reserved_domain).values(res_dsl::domain_name.eq(domain_name))
                                                 .on_conflict_do_nothing()
                                                 .execute(&mut conn)
                                                 .map_err(map_db_err)?;
    Ok(())
  }
}
/// Transacción Diesel abierta por `transact`.
struct DieselLabelTransaction<'a> {
  conn: &'a mut DbConn,
}
impl LabelTransaction for DieselLabelTransaction<'_> {
  fn find_labels(&mut self, labels: &[String]) -> Result<BTreeSet<String>, DomainError> {
    let mut found = BTreeSet::new();
    for chunk in labels.chunks(QUERY_CHUNK) {
      let rows = label_dsl::bsa_label.filter(label_dsl::label.eq_any(chunk))
                                     .select(label_dsl::label)
                                     .load::<String>(self.conn)
                                     .map_err(map_db_err)?;
      found.extend(rows);
    }
    Ok(found)
  }
  fn delete_labels(&mut self, labels: &[String]) -> Result<usize, DomainError> {
    // borrado en dos pasos: primero los dominios en uso, luego los labels
    let mut deleted = 0;
    for chunk in labels.chunks(QUERY_CHUNK) {
      diesel::delete(diu_dsl::bsa_domain_in_use.filter(diu_dsl::label.eq_any(chunk))).execute(self.conn)
                                                                                    .map_err(map_db_err)?;
      deleted += diesel::delete(label_dsl::bsa_label.filter(label_dsl::label.eq_any(chunk))).execute(self.conn)
                                                                                           .map_err(map_db_err)?;
    }
    Ok(deleted)
  }
  fn domains_in_use_for_labels(&mut self, labels: &[String]) -> Result<Vec<BsaDomainInUse>, DomainError> {
    let mut out = Vec::new();
    for chunk in labels.chunks(QUERY_CHUNK) {
      let rows = diu_dsl::bsa_domain_in_use.filter(diu_dsl::label.eq_any(chunk))
                                           .load::<DomainInUseRow>(self.conn)
                                           .map_err(map_db_err)?;
      for r in rows {
        out.push(r.into_record()?);
      }
    }
    Ok(out)
  }
  fn put_domain_in_use(&mut self, record: &BsaDomainInUse) -> Result<(), DomainError> {
    let row = DomainInUseRow { label: record.label.clone(),
                               tld: record.tld.clone(),
                               reason: record.reason.as_str().to_string() };
    diesel::insert_into(diu_dsl::bsa_domain_in_use).values(&row)
                                                   .on_conflict_do_nothing()
                                                   .execute(self.conn)
                                                   .map_err(map_db_err)?;
    Ok(())
  }
  fn registered_domains(&mut self, domain_names: &[String], now: DateTime<Utc>)
                        -> Result<BTreeSet<String>, DomainError> {
    let now_ms = to_ms(now);
    let mut out = BTreeSet::new();
    for chunk in domain_names.chunks(QUERY_CHUNK) {
      let rows = reg_dsl::registered_domain.filter(reg_dsl::domain_name.eq_any(chunk))
                                           .filter(reg_dsl::creation_time_ts.le(now_ms))
                                           .filter(reg_dsl::deletion_time_ts.gt(now_ms))
                                           .select(reg_dsl::domain_name)
                                           .load::<String>(self.conn)
                                           .map_err(map_db_err)?;
      out.extend(rows);
    }
    Ok(out)
  }
  fn reserved_domains(&mut self, domain_names: &[String]) -> Result<BTreeSet<String>, DomainError> {
    let mut out = BTreeSet::new();
    for chunk in domain_names.chunks(QUERY_CHUNK) {
      let rows = res_dsl::reserved_domain.filter(res_dsl::domain_name.eq_any(chunk))
                                         .select(res_dsl::domain_name)
                                         .load::<String>(self.conn)
                                         .map_err(map_db_err)?;
      out.extend(rows);
    }
    Ok(out)
  }
}
impl LabelRepository for DieselLabelRepository {
  fn insert_labels(&self, labels: &[BsaLabel]) -> Result<usize, DomainError> {
    let mut conn = self.conn()?;
    repeatable_read(&mut conn, |c| {
      let mut inserted = 0;
      for l in labels {
        let row = LabelRow { label: l.label.clone(), creation_time_ts: to_ms(l.creation_time) };
        inserted += diesel::insert_into(label_dsl::bsa_label).values(&row).on_conflict_do_nothing().execute(c)?;
      }
      Ok(inserted)
    }).map_err(map_db_err)
  }
  fn transact(&self, work: &mut dyn FnMut(&mut dyn LabelTransaction) -> Result<(), DomainError>)
              -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    // el error de dominio se guarda aquí y se fuerza el rollback con
    // `RollbackTransaction`
    let mut failure: Option<DomainError> = None;
    let res = repeatable_read(&mut conn, |c| {
      let mut txn = DieselLabelTransaction { conn: c };
      work(&mut txn).map_err(|e| {
                      failure = Some(e);
                      DieselError::RollbackTransaction
                    })
    });
    match (res, failure) {
      (_, Some(e)) => Err(e),
      (Ok(()), None) => Ok(()),
      (Err(e), None) => Err(map_db_err(e)),
    }
  }
  fn find_label(&self, label: &str) -> Result<Option<BsaLabel>, DomainError> {
    let mut conn = self.conn()?;
    let opt = label_dsl::bsa_label.filter(label_dsl::label.eq(label))
                                  .first::<LabelRow>(&mut conn)
                                  .optional()
                                  .map_err(map_db_err)?;
    opt.map(LabelRow::into_label).transpose()
  }
  fn domains_in_use(&self, label: &str) -> Result<Vec<BsaDomainInUse>, DomainError> {
    let mut conn = self.conn()?;
    let rows = diu_dsl::bsa_domain_in_use.filter(diu_dsl::label.eq(label))
                                         .order(diu_dsl::tld.asc())
                                         .load::<DomainInUseRow>(&mut conn)
                                         .map_err(map_db_err)?;
    rows.into_iter().map(DomainInUseRow::into_record).collect()
  }
}
