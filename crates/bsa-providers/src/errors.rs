// errors.rs
use thiserror::Error;

/// Error de un colaborador externo. `retriable` indica si reintentar la
/// misma operación puede tener éxito (fallo de red, respuesta no 2xx) o no
/// (credenciales rechazadas, respuesta mal formada).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
  message: String,
  retriable: bool,
}

impl ProviderError {
  pub fn retriable(message: impl Into<String>) -> Self {
    Self { message: message.into(), retriable: true }
  }

  pub fn fatal(message: impl Into<String>) -> Self {
    Self { message: message.into(), retriable: false }
  }

  pub fn is_retriable(&self) -> bool {
    self.retriable
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl From<std::io::Error> for ProviderError {
  fn from(e: std::io::Error) -> Self {
    Self::retriable(format!("io: {}", e))
  }
}
