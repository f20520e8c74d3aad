use bsa_providers::ProviderError;
use thiserror::Error;

// Errores comunes del pipeline de descarga.
//
// Este enum centraliza los errores que pueden ocurrir durante una
// invocación: persistencia de jobs y artefactos (`FlowError`), dominio y
// repositorio de labels (`DomainError`), colaboradores externos
// (`ProviderError`), validaciones y serialización.
#[derive(Error, Debug)]
pub enum WorkflowError {
  /// Errores de la capa de jobs/artefactos (crate `flow`).
  #[error("Error de flujo: {0}")]
  Flow(#[from] flow::errors::FlowError),

  /// Errores del dominio o del repositorio de labels.
  #[error("Error de dominio: {0}")]
  Domain(#[from] bsa_domain::DomainError),

  /// Fallos de descarga o de envío de reportes.
  #[error("Error del proveedor: {0}")]
  Provider(#[from] ProviderError),

  /// Errores de serializacion/deserializacion JSON.
  #[error("Error de serializacion: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Error de E/S: {0}")]
  Io(#[from] std::io::Error),

  /// Configuración o precondiciones inválidas.
  #[error("Error de validacion: {0}")]
  Validation(String),

  #[error("Otro error: {0}")]
  Other(String),
}

impl WorkflowError {
  /// `true` si reintentar la misma operación puede tener éxito. Sólo los
  /// fallos de transporte lo son; un error de E/S al copiar el cuerpo de
  /// una lista cuenta como tal.
  pub fn is_retriable(&self) -> bool {
    match self {
      WorkflowError::Provider(e) => e.is_retriable(),
      WorkflowError::Io(_) => true,
      _ => false,
    }
  }
}
