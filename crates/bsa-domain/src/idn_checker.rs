// Archivo: idn_checker.rs
// Propósito: consulta de pertenencia label -> tablas IDN -> TLDs.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Servicio puro de consulta IDN. Indica bajo qué tablas es válido un label
/// y qué TLDs soportan esas tablas.
pub trait IdnChecker: Send + Sync {
  /// Tablas IDN bajo las que `label` es válido.
  fn valid_idn_tables(&self, label: &str) -> BTreeSet<String>;

  /// TLDs que aceptan al menos una de las tablas dadas.
  fn supporting_tlds(&self, idn_tables: &BTreeSet<String>) -> BTreeSet<String>;

  /// Todos los TLDs inscritos en el programa de bloqueo.
  fn all_tlds(&self) -> BTreeSet<String>;

  /// TLDs que no aceptan ninguna de las tablas dadas.
  fn forbidding_tlds(&self, idn_tables: &BTreeSet<String>) -> BTreeSet<String> {
    let supporting = self.supporting_tlds(idn_tables);
    self.all_tlds().into_iter().filter(|tld| !supporting.contains(tld)).collect()
  }
}

/// Nombre de la tabla LDH (letras ASCII, dígitos y guion).
pub const LDH_TABLE: &str = "LDH";

/// `true` si el label es LDH: 1 a 63 caracteres alfanuméricos ASCII o
/// guiones, sin guion al inicio ni al final.
pub fn is_ldh_label(label: &str) -> bool {
  !label.is_empty()
  && label.len() <= 63
  && !label.starts_with('-')
  && !label.ends_with('-')
  && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

type LabelValidator = Box<dyn Fn(&str) -> bool + Send + Sync>;

struct IdnTable {
  name: String,
  validator: LabelValidator,
}

/// Implementación estática: tablas con su validador y el mapa de qué TLDs
/// soportan cada tabla.
#[derive(Default)]
pub struct StaticIdnChecker {
  tables: Vec<IdnTable>,
  tlds_by_table: BTreeMap<String, BTreeSet<String>>,
  all_tlds: BTreeSet<String>,
}

impl StaticIdnChecker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Checker con una única tabla LDH soportada por todos los TLDs dados.
  pub fn ldh_only<I, S>(tlds: I) -> Self
    where I: IntoIterator<Item = S>,
          S: Into<String>
  {
    let tlds: Vec<String> = tlds.into_iter().map(Into::into).collect();
    Self::new().with_table(LDH_TABLE, is_ldh_label, tlds)
  }

  /// Registra una tabla, su validador y los TLDs que la soportan.
  pub fn with_table<F, I, S>(mut self, name: &str, validator: F, tlds: I) -> Self
    where F: Fn(&str) -> bool + Send + Sync + 'static,
          I: IntoIterator<Item = S>,
          S: Into<String>
  {
    let tlds: BTreeSet<String> = tlds.into_iter().map(|t| t.into().to_lowercase()).collect();
    self.all_tlds.extend(tlds.iter().cloned());
    self.tlds_by_table.entry(name.to_string()).or_default().extend(tlds);
    self.tables.push(IdnTable { name: name.to_string(), validator: Box::new(validator) });
    self
  }

  /// Inscribe un TLD sin soporte para ninguna tabla: todos sus labels son
  /// inválidos.
  pub fn with_tld(mut self, tld: &str) -> Self {
    self.all_tlds.insert(tld.to_lowercase());
    self
  }
}

impl fmt::Debug for StaticIdnChecker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StaticIdnChecker")
     .field("tables", &self.tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>())
     .field("tlds_by_table", &self.tlds_by_table)
     .field("all_tlds", &self.all_tlds)
     .finish()
  }
}

impl IdnChecker for StaticIdnChecker {
  fn valid_idn_tables(&self, label: &str) -> BTreeSet<String> {
    self.tables.iter().filter(|t| (t.validator)(label)).map(|t| t.name.clone()).collect()
  }

  fn supporting_tlds(&self, idn_tables: &BTreeSet<String>) -> BTreeSet<String> {
    idn_tables.iter()
              .filter_map(|t| self.tlds_by_table.get(t))
              .flat_map(|tlds| tlds.iter().cloned())
              .collect()
  }

  fn all_tlds(&self) -> BTreeSet<String> {
    self.all_tlds.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn checker() -> StaticIdnChecker {
    StaticIdnChecker::new().with_table(LDH_TABLE, is_ldh_label, ["app", "dev"])
                           .with_table("DIGITS", |l: &str| l.bytes().all(|b| b.is_ascii_digit()), ["page"])
                           .with_tld("xn--q9jyb4c")
  }

  #[test]
  fn ldh_validation() {
    assert!(is_ldh_label("foo-bar1"));
    assert!(!is_ldh_label("-foo"));
    assert!(!is_ldh_label("foo-"));
    assert!(!is_ldh_label("fóo"));
    assert!(!is_ldh_label(""));
    assert!(!is_ldh_label(&"a".repeat(64)));
  }

  #[test]
  fn supporting_and_forbidding_partition_all_tlds() {
    let c = checker();
    let tables = c.valid_idn_tables("foo");
    assert_eq!(tables.iter().cloned().collect::<Vec<_>>(), vec![LDH_TABLE.to_string()]);
    let supporting = c.supporting_tlds(&tables);
    let forbidding = c.forbidding_tlds(&tables);
    assert_eq!(supporting, ["app", "dev"].iter().map(|s| s.to_string()).collect());
    assert_eq!(forbidding, ["page", "xn--q9jyb4c"].iter().map(|s| s.to_string()).collect());
  }

  #[test]
  fn label_valid_nowhere_is_forbidden_everywhere() {
    let c = checker();
    let tables = c.valid_idn_tables("fóo");
    assert!(tables.is_empty());
    assert_eq!(c.forbidding_tlds(&tables), c.all_tlds());
  }
}
