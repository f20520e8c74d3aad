// errors.rs
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
  #[error("Error de validación: {0}")]
  ValidationError(String),
  #[error("Error externo: {0}")]
  ExternalError(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
  /// El estado persistido no coincide con lo que el diff espera (por
  /// ejemplo, una asociación de órdenes nuevas sobre labels inexistentes).
  #[error("Estado inconsistente: {0}")]
  InconsistentState(String),
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}

impl From<std::io::Error> for DomainError {
  fn from(e: std::io::Error) -> Self {
    Self::ExternalError(format!("io: {}", e))
  }
}
