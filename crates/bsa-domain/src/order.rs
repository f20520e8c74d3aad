use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
  Create,
  Delete,
}

impl OrderType {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderType::Create => "CREATE",
      OrderType::Delete => "DELETE",
    }
  }
}

impl fmt::Display for OrderType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderType {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "CREATE" => Ok(OrderType::Create),
      "DELETE" => Ok(OrderType::Delete),
      other => Err(DomainError::ValidationError(format!("tipo de orden desconocido: {}", other))),
    }
  }
}

/// Orden de la autoridad que aparece o desaparece entre dos descargas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
  pub order_id: i64,
  pub order_type: OrderType,
}

impl Order {
  pub fn new(order_id: i64, order_type: OrderType) -> Self {
    Self { order_id, order_type }
  }
}

/// Formato de artefacto: `orderId,TYPE`.
impl fmt::Display for Order {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{}", self.order_id, self.order_type)
  }
}

impl FromStr for Order {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (id, kind) = s.trim()
                      .split_once(',')
                      .ok_or_else(|| DomainError::SerializationError(format!("orden mal formada: '{}'", s)))?;
    let order_id = id.trim()
                     .parse::<i64>()
                     .map_err(|_| DomainError::SerializationError(format!("id de orden inválido: '{}'", s)))?;
    Ok(Order::new(order_id, kind.parse()?))
  }
}
