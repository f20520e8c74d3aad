// Archivo: block_list.rs
// Propósito: categorías de listas de bloqueo y parseo de sus líneas
// (`label,orderId;orderId;...`).
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

/// Valor de orden reservado; ninguna orden real puede usarlo.
pub const ORDER_ID_SENTINEL: i64 = i64::MIN;

/// Cabecera que publica la autoridad en la primera línea de cada lista.
pub const BLOCK_LIST_HEADER: &str = "domainLabel,orderIDs";

/// Categoría de lista de bloqueo publicada por la autoridad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockListType {
  Block,
  BlockPlus,
}

impl BlockListType {
  pub const ALL: [BlockListType; 2] = [BlockListType::Block, BlockListType::BlockPlus];

  pub fn as_str(&self) -> &'static str {
    match self {
      BlockListType::Block => "BLOCK",
      BlockListType::BlockPlus => "BLOCK_PLUS",
    }
  }

  /// Nombre del archivo con el que se guarda la descarga cruda.
  pub fn file_name(&self) -> String {
    format!("{}.csv", self.as_str())
  }
}

impl fmt::Display for BlockListType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for BlockListType {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "BLOCK" => Ok(BlockListType::Block),
      "BLOCK_PLUS" => Ok(BlockListType::BlockPlus),
      other => Err(DomainError::ValidationError(format!("tipo de lista desconocido: {}", other))),
    }
  }
}

/// Una línea de lista de bloqueo: un label y las órdenes que lo bloquean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
  label: String,
  order_ids: Vec<i64>,
}

impl Line {
  /// Construye una línea validando que el label y la lista de órdenes no
  /// estén vacíos y que ninguna orden use el valor reservado.
  pub fn new(label: impl Into<String>, order_ids: Vec<i64>) -> Result<Self, DomainError> {
    let label = label.into();
    if label.trim().is_empty() {
      return Err(DomainError::ValidationError("label vacío".into()));
    }
    if order_ids.is_empty() {
      return Err(DomainError::ValidationError(format!("label {} sin órdenes", label)));
    }
    if order_ids.contains(&ORDER_ID_SENTINEL) {
      return Err(DomainError::ValidationError(format!("label {} usa un id de orden reservado", label)));
    }
    Ok(Self { label, order_ids })
  }

  /// Parsea `label,orderId1;orderId2;...`. Cualquier línea mal formada es
  /// un error de validación que incluye el texto original.
  pub fn parse(text: &str) -> Result<Self, DomainError> {
    let columns: Vec<&str> = text.trim().split(',').map(str::trim).collect();
    if columns.len() != 2 {
      return Err(DomainError::ValidationError(format!("se esperaban 2 columnas en '{}'", text)));
    }
    if columns[0].is_empty() {
      return Err(DomainError::ValidationError(format!("label vacío en '{}'", text)));
    }
    let mut order_ids = Vec::new();
    for raw in columns[1].split(';').map(str::trim) {
      let id = raw.parse::<i64>()
                  .map_err(|_| DomainError::ValidationError(format!("id de orden inválido '{}' en '{}'", raw, text)))?;
      order_ids.push(id);
    }
    Line::new(columns[0], order_ids).map_err(|e| match e {
                                       DomainError::ValidationError(m) => {
                                         DomainError::ValidationError(format!("{} en '{}'", m, text))
                                       }
                                       other => other,
                                     })
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn order_ids(&self) -> &[i64] {
    &self.order_ids
  }

  pub fn into_parts(self) -> (String, Vec<i64>) {
    (self.label, self.order_ids)
  }
}

impl fmt::Display for Line {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let ids: Vec<String> = self.order_ids.iter().map(|id| id.to_string()).collect();
    write!(f, "{},{}", self.label, ids.join(";"))
  }
}

/// Iterador perezoso sobre las líneas de una lista de bloqueo. Omite líneas
/// en blanco y la cabecera inicial; cualquier otra línea se parsea con
/// [`Line::parse`].
pub struct BlockListLines<R> {
  reader: R,
  first: bool,
  buf: String,
}

impl<R: BufRead> BlockListLines<R> {
  pub fn new(reader: R) -> Self {
    Self { reader, first: true, buf: String::new() }
  }
}

impl<R: BufRead> Iterator for BlockListLines<R> {
  type Item = Result<Line, DomainError>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      self.buf.clear();
      match self.reader.read_line(&mut self.buf) {
        Ok(0) => return None,
        Ok(_) => {}
        Err(e) => return Some(Err(e.into())),
      }
      let text = self.buf.trim();
      if text.is_empty() {
        continue;
      }
      let first = std::mem::replace(&mut self.first, false);
      if first && text.eq_ignore_ascii_case(BLOCK_LIST_HEADER) {
        continue;
      }
      return Some(Line::parse(text));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_trims_columns_and_ids() {
    let line = Line::parse("  foo , 1 ; 22 ;3 ").unwrap();
    assert_eq!(line.label(), "foo");
    assert_eq!(line.order_ids(), &[1, 22, 3]);
    assert_eq!(line.to_string(), "foo,1;22;3");
  }

  #[test]
  fn parse_rejects_malformed_lines() {
    for bad in ["foo", "foo,1,2", ",1", "foo,", "foo,abc", "foo,1;;2"] {
      match Line::parse(bad) {
        Err(DomainError::ValidationError(msg)) => assert!(msg.contains(bad), "mensaje sin la línea: {}", msg),
        other => panic!("se esperaba error para '{}', got {:?}", bad, other),
      }
    }
  }

  #[test]
  fn reserved_order_id_is_rejected() {
    let text = format!("foo,{}", ORDER_ID_SENTINEL);
    assert!(Line::parse(&text).is_err());
  }

  #[test]
  fn lines_iterator_skips_header_and_blank_lines() {
    let raw = "domainLabel,orderIDs\n\nfoo,1\n  \nbar,2;3\n";
    let lines: Vec<Line> = BlockListLines::new(raw.as_bytes()).collect::<Result<_, _>>().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].label(), "bar");
  }

  #[test]
  fn block_list_type_round_trips_names() {
    for t in BlockListType::ALL {
      assert_eq!(t.as_str().parse::<BlockListType>().unwrap(), t);
    }
    assert_eq!(BlockListType::BlockPlus.file_name(), "BLOCK_PLUS.csv");
  }
}
