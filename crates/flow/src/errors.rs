// Archivo: errors.rs
// Propósito: definir los errores del crate y el alias Result<T> usado por
// sus APIs.
use thiserror::Error;
/// Errores comunes de la capa de jobs, stores y locks.
///
/// - `NotFound`: job o artefacto inexistente.
/// - `Conflict`: otro escritor movió el stage antes que nosotros.
/// - `Storage`: error al acceder al almacenamiento externo.
/// - `Other`: cualquier otro error.
#[derive(Error, Debug)]
pub enum FlowError {
  /// Entidad no encontrada (por ejemplo, job o artefacto).
  #[error("No encontrado: {0}")]
  NotFound(String),
  /// Conflicto optimista (stage esperado distinto del persistido).
  #[error("Conflicto: {0}")]
  Conflict(String),
  /// Error genérico de almacenamiento (BD, disco, etc.).
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  /// Otro tipo de error.
  #[error("Otro: {0}")]
  Other(String),
}

impl From<std::io::Error> for FlowError {
  fn from(e: std::io::Error) -> Self {
    FlowError::Storage(format!("io: {}", e))
  }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, FlowError>;
