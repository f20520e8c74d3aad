use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Clasificación de un label dentro de un diff.
///
/// `Create` y `Add` se tratan igual al aplicar el diff; `Add` existe para
/// conservar la distinción que hace la autoridad entre listas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelType {
  Create,
  Add,
  NewOrderAssociation,
  Delete,
}

impl LabelType {
  pub fn as_str(&self) -> &'static str {
    match self {
      LabelType::Create => "CREATE",
      LabelType::Add => "ADD",
      LabelType::NewOrderAssociation => "NEW_ORDER_ASSOCIATION",
      LabelType::Delete => "DELETE",
    }
  }

  /// `true` para los tipos que crean un label persistente nuevo.
  pub fn is_creation(&self) -> bool {
    matches!(self, LabelType::Create | LabelType::Add)
  }
}

impl fmt::Display for LabelType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for LabelType {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "CREATE" => Ok(LabelType::Create),
      "ADD" => Ok(LabelType::Add),
      "NEW_ORDER_ASSOCIATION" => Ok(LabelType::NewOrderAssociation),
      "DELETE" => Ok(LabelType::Delete),
      other => Err(DomainError::ValidationError(format!("tipo de label desconocido: {}", other))),
    }
  }
}

/// Un label clasificado junto con las tablas IDN bajo las que es válido.
/// Para `Delete` el conjunto de tablas siempre está vacío.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
  label: String,
  label_type: LabelType,
  idn_tables: BTreeSet<String>,
}

impl Label {
  pub fn new(label: impl Into<String>, label_type: LabelType, idn_tables: BTreeSet<String>) -> Self {
    let idn_tables = if label_type == LabelType::Delete { BTreeSet::new() } else { idn_tables };
    Self { label: label.into(), label_type, idn_tables }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn label_type(&self) -> LabelType {
    self.label_type
  }

  pub fn idn_tables(&self) -> &BTreeSet<String> {
    &self.idn_tables
  }
}

/// Formato de artefacto: `label,TYPE[,tabla...]`.
impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{}", self.label, self.label_type)?;
    for table in &self.idn_tables {
      write!(f, ",{}", table)?;
    }
    Ok(())
  }
}

impl FromStr for Label {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut columns = s.trim().split(',').map(str::trim);
    let label = columns.next().filter(|l| !l.is_empty())
                       .ok_or_else(|| DomainError::SerializationError(format!("label sin nombre: '{}'", s)))?;
    let label_type = columns.next()
                            .ok_or_else(|| DomainError::SerializationError(format!("label sin tipo: '{}'", s)))?
                            .parse::<LabelType>()?;
    let idn_tables = columns.filter(|t| !t.is_empty()).map(str::to_string).collect();
    Ok(Label::new(label, label_type, idn_tables))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_line_format_round_trips() {
    let tables: BTreeSet<String> = ["JA".to_string(), "LATIN".to_string()].into_iter().collect();
    let label = Label::new("foo", LabelType::Create, tables);
    assert_eq!(label.to_string(), "foo,CREATE,JA,LATIN");
    assert_eq!("foo,CREATE,JA,LATIN".parse::<Label>().unwrap(), label);
  }

  #[test]
  fn delete_labels_carry_no_idn_tables() {
    let tables: BTreeSet<String> = ["LATIN".to_string()].into_iter().collect();
    let label = Label::new("foo", LabelType::Delete, tables);
    assert!(label.idn_tables().is_empty());
    assert_eq!(label.to_string(), "foo,DELETE");
  }

  #[test]
  fn unknown_label_type_is_rejected() {
    assert!("foo,MAYBE".parse::<Label>().is_err());
    assert!("foo".parse::<Label>().is_err());
  }
}
