// Archivo: repository.rs
// Propósito: definir el trait `WorkflowRepository` y los traits de los
// colaboradores externos (índice de búsqueda, notificaciones, auditoría,
// cola de trabajo). Describe el contrato que deben implementar las
// persistencias (Postgres, in-memory, etc.).
use crate::domain::{AuditRecord, IndexOp, InstanceStats, NewDefinition, PersistResult, Priority, WorkflowDefinition,
                    WorkflowInstance};
use crate::errors::Result;
use serde_json::Value as JsonValue;
use sgdea_domain::{EntityKind, EntityRef};
use uuid::Uuid;

/// Contrato de persistencia para definiciones e instancias de workflow.
///
/// El repositorio es dueño de la generación de ids y de los campos
/// derivados (timestamps, versión inicial). Las reglas de negocio
/// (autorización, preconditions de estado) viven fuera, en los stores.
pub trait WorkflowRepository: Send + Sync {
    /// Inserta una definición nueva (activa por defecto) y devuelve su id.
    fn create_definition(&self, input: NewDefinition, created_by: Uuid) -> Result<Uuid>;

    /// Obtiene una definición viva. `NotFound` si no existe o está borrada
    /// lógicamente.
    fn get_definition(&self, id: &Uuid) -> Result<WorkflowDefinition>;

    /// Lista las definiciones vivas (excluye borradas lógicamente).
    fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>>;

    /// Reemplaza la fila completa de la definición. El caller ya validó
    /// las precondiciones y fijó `updated_at`.
    fn update_definition(&self, definition: &WorkflowDefinition) -> Result<()>;

    /// Borrado lógico: marca `deleted_at` y la definición deja de listarse.
    fn soft_delete_definition(&self, id: &Uuid, at: chrono::DateTime<chrono::Utc>) -> Result<()>;

    /// Revierte un borrado lógico y devuelve la definición restaurada.
    /// Falla con `NotFound` si no existe o no estaba borrada.
    fn restore_definition(&self, id: &Uuid) -> Result<WorkflowDefinition>;

    /// Borrado físico e irreversible de la fila.
    fn hard_delete_definition(&self, id: &Uuid) -> Result<()>;

    /// Crea una instancia nueva (status pending, paso 0, historial vacío)
    /// sólo si la definición está activa.
    ///
    /// La lectura del flag `active` y la inserción deben ocurrir como una
    /// sola unidad atómica en el repositorio concreto: una desactivación
    /// concurrente no puede intercalarse entre ambas. Falla con
    /// `InactiveDefinition` si el flag es falso.
    fn create_instance_if_active(&self, definition_id: &Uuid, target: EntityRef) -> Result<WorkflowInstance>;

    /// Obtiene una instancia por id.
    fn get_instance(&self, id: &Uuid) -> Result<WorkflowInstance>;

    /// Reemplaza la instancia aplicando control optimista: si la versión
    /// almacenada no coincide con `expected_version` devuelve
    /// `PersistResult::Conflict` sin escribir.
    fn update_instance(&self, instance: &WorkflowInstance, expected_version: i64) -> Result<PersistResult>;

    /// Lista las instancias de una definición (cualquier estado).
    fn list_instances(&self, definition_id: &Uuid) -> Result<Vec<WorkflowInstance>>;

    /// Agrega estados de instancia: total, activas (pending + in_progress)
    /// y completadas. `total` cuenta toda instancia que haya existido para
    /// la definición, terminal o no.
    fn instance_stats(&self, definition_id: &Uuid) -> Result<InstanceStats>;

    /// Mayor índice de paso referenciado por alguna instancia de la
    /// definición (índice actual o historial). `None` si nunca hubo
    /// instancias. Guarda el invariante de no-truncamiento de pasos.
    fn max_referenced_step(&self, definition_id: &Uuid) -> Result<Option<usize>>;
}

// Traits de colaboradores externos. El núcleo los consume tras el commit;
// sus fallos se registran y nunca revierten la mutación.

/// Índice de búsqueda. Ambas operaciones son idempotentes: repetir la
/// llamada con el mismo id tiene el mismo efecto observable que hacerla
/// una vez.
pub trait IndexDispatcher: Send + Sync {
    /// Alta o reemplazo del documento indexado.
    fn index_entity(&self, kind: EntityKind, id: &Uuid, body: &JsonValue) -> Result<()>;

    /// Baja del índice. Recibe sólo el identificador: el cuerpo ya no existe.
    fn delete_from_index(&self, kind: EntityKind, id: &Uuid) -> Result<()>;
}

/// Despacho de notificaciones. Fire-and-forget: los reintentos son del
/// colaborador, no del núcleo.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, user_id: &Uuid, message: &str, priority: Priority) -> Result<()>;
}

/// Destino de los registros de auditoría (append-only, write-once).
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Cola de trabajo con nombre para el modo diferido de indexación.
/// El colaborador asume entrega at-least-once.
pub trait WorkQueue: Send + Sync {
    fn enqueue(&self, queue: &str, op: IndexOp) -> Result<()>;

    /// Reclama la siguiente operación pendiente de la cola, si hay.
    fn claim(&self, queue: &str) -> Result<Option<IndexOp>>;
}
