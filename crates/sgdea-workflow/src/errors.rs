// Archivo: errors.rs
// Propósito: definir los errores del dominio y el alias Result<T> usado por
// las APIs del crate. Los mensajes están en español.
use thiserror::Error;
use uuid::Uuid;

/// Errores del núcleo de workflow.
///
/// - `Validation`: entrada malformada (lista de pasos vacía, tipo de entidad
///   que no corresponde).
/// - `Conflict`: precondición de estado violada (instancias activas que
///   bloquean edición/borrado, pérdida en modificación concurrente). El
///   mensaje nombra siempre la condición bloqueante.
/// - `InactiveDefinition`: intento de iniciar sobre una definición inactiva.
/// - `InvalidTransition`: avance/cancelación sobre una instancia terminal.
/// - `Authorization`: denegación de la puerta, con el motivo específico.
#[derive(Error, Debug)]
pub enum WorkflowError {
  /// Entrada malformada.
  #[error("Error de validación: {0}")]
  Validation(String),
  /// Precondición de estado violada; el mensaje nombra la condición.
  #[error("Conflicto: {0}")]
  Conflict(String),
  /// La definición está inactiva y no admite nuevas instancias.
  #[error("Definición inactiva: {0}")]
  InactiveDefinition(Uuid),
  /// Transición no permitida desde un estado terminal.
  #[error("Transición inválida: {0}")]
  InvalidTransition(String),
  /// Denegación de autorización con motivo legible para el usuario.
  #[error("No autorizado: {0}")]
  Authorization(String),
  /// Entidad no encontrada (definición, instancia o entidad gobernada).
  #[error("No encontrado: {0}")]
  NotFound(String),
  /// Error genérico de almacenamiento.
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  /// Errores originados en el crate de dominio.
  #[error("Error de dominio: {0}")]
  Domain(#[from] sgdea_domain::DomainError),
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, WorkflowError>;
