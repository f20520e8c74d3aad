use crate::errors::ProviderError;

/// Destino de los reportes JSON hacia la autoridad.
pub trait ReportSender: Send + Sync {
  /// Reporta el estado de órdenes (en progreso o completadas).
  fn send_order_status_report(&self, report: &str) -> Result<(), ProviderError>;

  /// Agrega dominios no bloqueables. Es sólo aditivo: nunca retira
  /// dominios reportados antes.
  fn add_unblockable_domains(&self, report: &str) -> Result<(), ProviderError>;
}
