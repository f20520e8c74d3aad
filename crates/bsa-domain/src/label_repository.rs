use crate::{DomainError, Reason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

/// Label bloqueado persistido junto con la hora de creación del job que lo
/// introdujo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BsaLabel {
  pub label: String,
  pub creation_time: DateTime<Utc>,
}

impl BsaLabel {
  pub fn new(label: impl Into<String>, creation_time: DateTime<Utc>) -> Self {
    Self { label: label.into(), creation_time }
  }
}

/// Motivo de un registro de dominio en uso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainInUseReason {
  Registered,
  Reserved,
}

impl DomainInUseReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      DomainInUseReason::Registered => "REGISTERED",
      DomainInUseReason::Reserved => "RESERVED",
    }
  }

  pub fn to_reason(self) -> Reason {
    match self {
      DomainInUseReason::Registered => Reason::Registered,
      DomainInUseReason::Reserved => Reason::Reserved,
    }
  }
}

impl fmt::Display for DomainInUseReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DomainInUseReason {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "REGISTERED" => Ok(DomainInUseReason::Registered),
      "RESERVED" => Ok(DomainInUseReason::Reserved),
      other => Err(DomainError::ValidationError(format!("motivo de uso desconocido: {}", other))),
    }
  }
}

/// Dominio (`label.tld`) que no pudo bloquearse porque ya estaba registrado o
/// reservado cuando se aplicó el label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BsaDomainInUse {
  pub label: String,
  pub tld: String,
  pub reason: DomainInUseReason,
}

impl BsaDomainInUse {
  pub fn new(label: impl Into<String>, tld: impl Into<String>, reason: DomainInUseReason) -> Self {
    Self { label: label.into(), tld: tld.into(), reason }
  }

  pub fn domain_name(&self) -> String {
    format!("{}.{}", self.label, self.tld)
  }
}

/// Operaciones disponibles dentro de una transacción de aplicación de diff.
/// Todo lo escrito a través de ella se confirma o descarta en bloque.
pub trait LabelTransaction {
  /// Devuelve cuáles de los labels dados existen como labels persistentes.
  fn find_labels(&mut self, labels: &[String]) -> Result<BTreeSet<String>, DomainError>;

  /// Borra los labels dados y sus registros de dominio en uso. Devuelve el
  /// número de labels borrados.
  fn delete_labels(&mut self, labels: &[String]) -> Result<usize, DomainError>;

  /// Registros de dominio en uso asociados a los labels dados.
  fn domains_in_use_for_labels(&mut self, labels: &[String]) -> Result<Vec<BsaDomainInUse>, DomainError>;

  /// Inserta un registro de dominio en uso; si ya existe (mismo label y
  /// tld) se conserva el existente.
  fn put_domain_in_use(&mut self, record: &BsaDomainInUse) -> Result<(), DomainError>;

  /// Subconjunto de `domain_names` que está registrado (no borrado) en
  /// `now`.
  fn registered_domains(&mut self, domain_names: &[String], now: DateTime<Utc>)
                        -> Result<BTreeSet<String>, DomainError>;

  /// Subconjunto de `domain_names` que está reservado.
  fn reserved_domains(&mut self, domain_names: &[String]) -> Result<BTreeSet<String>, DomainError>;
}

/// Repositorio de labels persistentes y dominios en uso.
pub trait LabelRepository: Send + Sync {
  /// Inserta labels nuevos en su propia transacción. Los labels ya
  /// existentes se ignoran. Devuelve cuántos se insertaron.
  fn insert_labels(&self, labels: &[BsaLabel]) -> Result<usize, DomainError>;

  /// Ejecuta `work` dentro de una transacción. Si `work` falla nada de lo
  /// escrito se confirma y el error se propaga.
  fn transact(&self, work: &mut dyn FnMut(&mut dyn LabelTransaction) -> Result<(), DomainError>)
              -> Result<(), DomainError>;

  /// Busca un label persistente.
  fn find_label(&self, label: &str) -> Result<Option<BsaLabel>, DomainError>;

  /// Registros de dominio en uso de un label.
  fn domains_in_use(&self, label: &str) -> Result<Vec<BsaDomainInUse>, DomainError>;
}

/// Entrada del diario de commits del repositorio en memoria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitRecord {
  /// Labels insertados por `insert_labels`.
  Labels(Vec<String>),
  /// Commit de `transact`: labels borrados y dominios en uso escritos.
  Transaction { deleted: usize, domains_in_use: Vec<String> },
}

#[derive(Debug, Clone, Default)]
struct RegistryTables {
  labels: BTreeMap<String, BsaLabel>,
  domains_in_use: BTreeMap<(String, String), BsaDomainInUse>,
  /// nombre -> (creación, borrado); `None` = vigente.
  registered: BTreeMap<String, Vec<(DateTime<Utc>, Option<DateTime<Utc>>)>>,
  reserved: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Store {
  tables: RegistryTables,
  journal: Vec<CommitRecord>,
}

/// Implementación en memoria para tests y desarrollo. Las transacciones
/// trabajan sobre una copia y la publican al terminar, manteniendo el lock
/// durante toda la transacción (serializable).
#[derive(Debug, Default)]
pub struct InMemoryLabelRepository {
  store: Mutex<Store>,
}

impl InMemoryLabelRepository {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Store>, DomainError> {
    self.store.lock().map_err(|e| DomainError::ExternalError(format!("mutex poisoned: {:?}", e)))
  }

  /// Registra un dominio activo desde `creation_time`.
  pub fn register_domain(&self, domain_name: &str, creation_time: DateTime<Utc>) -> Result<(), DomainError> {
    let mut store = self.lock()?;
    store.tables.registered.entry(domain_name.to_string()).or_default().push((creation_time, None));
    Ok(())
  }

  /// Marca como borradas en `deletion_time` las altas vigentes del dominio.
  pub fn delete_domain(&self, domain_name: &str, deletion_time: DateTime<Utc>) -> Result<(), DomainError> {
    let mut store = self.lock()?;
    let spans = store.tables
                     .registered
                     .get_mut(domain_name)
                     .ok_or_else(|| DomainError::ValidationError(format!("dominio no registrado: {}", domain_name)))?;
    for span in spans.iter_mut().filter(|s| s.1.is_none()) {
      span.1 = Some(deletion_time);
    }
    Ok(())
  }

  pub fn reserve_domain(&self, domain_name: &str) -> Result<(), DomainError> {
    self.lock()?.tables.reserved.insert(domain_name.to_string());
    Ok(())
  }

  /// Copia del diario de commits, en orden.
  pub fn journal(&self) -> Result<Vec<CommitRecord>, DomainError> {
    Ok(self.lock()?.journal.clone())
  }

  pub fn labels(&self) -> Result<Vec<BsaLabel>, DomainError> {
    Ok(self.lock()?.tables.labels.values().cloned().collect())
  }

  pub fn all_domains_in_use(&self) -> Result<Vec<BsaDomainInUse>, DomainError> {
    Ok(self.lock()?.tables.domains_in_use.values().cloned().collect())
  }
}

struct InMemoryTransaction {
  tables: RegistryTables,
  deleted: usize,
  written: Vec<String>,
}

impl LabelTransaction for InMemoryTransaction {
  fn find_labels(&mut self, labels: &[String]) -> Result<BTreeSet<String>, DomainError> {
    Ok(labels.iter().filter(|l| self.tables.labels.contains_key(*l)).cloned().collect())
  }

  fn delete_labels(&mut self, labels: &[String]) -> Result<usize, DomainError> {
    let targets: BTreeSet<&String> = labels.iter().collect();
    self.tables.domains_in_use.retain(|(label, _), _| !targets.contains(label));
    let mut count = 0;
    for label in targets {
      if self.tables.labels.remove(label).is_some() {
        count += 1;
      }
    }
    self.deleted += count;
    Ok(count)
  }

  fn domains_in_use_for_labels(&mut self, labels: &[String]) -> Result<Vec<BsaDomainInUse>, DomainError> {
    let targets: BTreeSet<&String> = labels.iter().collect();
    Ok(self.tables
           .domains_in_use
           .values()
           .filter(|d| targets.contains(&d.label))
           .cloned()
           .collect())
  }

  fn put_domain_in_use(&mut self, record: &BsaDomainInUse) -> Result<(), DomainError> {
    let key = (record.label.clone(), record.tld.clone());
    if !self.tables.domains_in_use.contains_key(&key) {
      self.tables.domains_in_use.insert(key, record.clone());
      self.written.push(record.domain_name());
    }
    Ok(())
  }

  fn registered_domains(&mut self, domain_names: &[String], now: DateTime<Utc>)
                        -> Result<BTreeSet<String>, DomainError> {
    let active = |spans: &Vec<(DateTime<Utc>, Option<DateTime<Utc>>)>| {
      spans.iter().any(|(created, deleted)| *created <= now && deleted.map_or(true, |d| d > now))
    };
    Ok(domain_names.iter()
                   .filter(|n| self.tables.registered.get(*n).map_or(false, |spans| active(spans)))
                   .cloned()
                   .collect())
  }

  fn reserved_domains(&mut self, domain_names: &[String]) -> Result<BTreeSet<String>, DomainError> {
    Ok(domain_names.iter().filter(|n| self.tables.reserved.contains(*n)).cloned().collect())
  }
}

impl LabelRepository for InMemoryLabelRepository {
  fn insert_labels(&self, labels: &[BsaLabel]) -> Result<usize, DomainError> {
    let mut store = self.lock()?;
    let mut inserted = Vec::new();
    for l in labels {
      if !store.tables.labels.contains_key(&l.label) {
        store.tables.labels.insert(l.label.clone(), l.clone());
        inserted.push(l.label.clone());
      }
    }
    let count = inserted.len();
    store.journal.push(CommitRecord::Labels(inserted));
    Ok(count)
  }

  fn transact(&self, work: &mut dyn FnMut(&mut dyn LabelTransaction) -> Result<(), DomainError>)
              -> Result<(), DomainError> {
    let mut store = self.lock()?;
    let mut txn = InMemoryTransaction { tables: store.tables.clone(), deleted: 0, written: Vec::new() };
    work(&mut txn)?;
    store.tables = txn.tables;
    store.journal.push(CommitRecord::Transaction { deleted: txn.deleted, domains_in_use: txn.written });
    Ok(())
  }

  fn find_label(&self, label: &str) -> Result<Option<BsaLabel>, DomainError> {
    Ok(self.lock()?.tables.labels.get(label).cloned())
  }

  fn domains_in_use(&self, label: &str) -> Result<Vec<BsaDomainInUse>, DomainError> {
    Ok(self.lock()?
           .tables
           .domains_in_use
           .values()
           .filter(|d| d.label == label)
           .cloned()
           .collect())
  }
}
