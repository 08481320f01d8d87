// Archivo: domain.rs
// Propósito: tipos de dominio del motor de workflow: definiciones, instancias,
// eventos de paso, registros de auditoría y efectos post-commit.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sgdea_domain::{EntityKind, EntityRef, Role};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Un paso de la definición: una etapa que exige decisión de un actor
/// (aprobar/rechazar) antes de avanzar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Rol exigido para decidir este paso; `None` = basta con ser creador
    /// o admin-tier.
    pub required_role: Option<Role>,
    /// Regla de auto-avance: al entrar aprobado en este paso se registra el
    /// evento y se continúa sin esperar decisión de un actor.
    pub auto_advance: bool,
}

impl Step {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), required_role: None, auto_advance: false }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn auto(mut self) -> Self {
        self.auto_advance = true;
        self
    }
}

/// Plantilla reutilizable de workflow: pasos ordenados aplicables a un tipo
/// de entidad. Mutable sólo mientras ninguna instancia está pendiente o en
/// curso; borrable sólo sin instancias que la referencien.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub entity_kind: EntityKind,
    /// Secuencia ordenada y no vacía de pasos.
    pub steps: Vec<Step>,
    /// Configuración libre: nombre de opción -> valor (orden estable).
    pub configuration: IndexMap<String, JsonValue>,
    pub active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Borrado lógico (recuperable); el borrado físico elimina la fila.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Datos de entrada para crear una definición. El repositorio genera el id
/// y los campos derivados.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDefinition {
    pub name: String,
    pub description: String,
    pub entity_kind: EntityKind,
    pub steps: Vec<Step>,
    pub configuration: IndexMap<String, JsonValue>,
}

/// Parche de actualización: sólo los campos presentes se reemplazan.
/// El flag `active` se cambia únicamente vía activar/desactivar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<Step>>,
    pub configuration: Option<IndexMap<String, JsonValue>>,
}

/// Estado de una instancia. `completed`, `cancelled` y `rejected` son
/// terminales: ninguna transición sale de ellos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Cancelled | InstanceStatus::Rejected)
    }

    /// Activa = cuenta para el bloqueo de edición de la definición.
    pub fn is_active(&self) -> bool {
        matches!(self, InstanceStatus::Pending | InstanceStatus::InProgress)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::InProgress => "in_progress",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Cancelled => "cancelled",
            InstanceStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// Resultado de la decisión de un actor sobre el paso actual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Approved,
    Rejected,
    Cancelled,
}

/// Entrada del historial: quién decidió qué en qué paso y cuándo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_index: usize,
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
    pub outcome: StepOutcome,
}

/// Una ejecución de una definición contra una entidad concreta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub target: EntityRef,
    pub status: InstanceStatus,
    /// Invariante: 0 <= current_step_index < len(definition.steps); congelado
    /// al llegar a un estado terminal.
    pub current_step_index: usize,
    pub history: Vec<StepEvent>,
    /// Contador de revisión para locking optimista.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Agregado de estados de instancia por definición.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStats {
    pub total: usize,
    /// pending + in_progress.
    pub active: usize,
    pub completed: usize,
}

/// Resultado de una escritura con control optimista de versiones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistResult {
    Ok { new_version: i64 },
    Conflict,
}

/// Acción registrada en auditoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Restored,
    ForceDeleted,
}

/// Severidad del registro de auditoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Registro de auditoría emitido tras una mutación confirmada. El núcleo lo
/// entrega al `AuditSink`; la persistencia append-only es del colaborador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Tipo de entidad auditada ("workflow_definition", "workflow_instance").
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
    /// Campos modificados (sólo para `Updated`).
    pub changed_fields: BTreeSet<String>,
    pub severity: Severity,
}

/// Prioridad de una notificación saliente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Notificación a despachar por el colaborador de mensajería.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub message: String,
    pub priority: Priority,
}

/// Mutación pendiente del índice de búsqueda. El borrado viaja sólo con el
/// identificador: el cuerpo de la entidad ya no existe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexOp {
    Upsert { kind: EntityKind, id: Uuid, body: JsonValue },
    Delete { kind: EntityKind, id: Uuid },
}

/// Efecto colateral devuelto por una mutación, a ejecutar después del commit.
/// Su fallo se registra y nunca revierte la mutación que lo originó.
#[derive(Debug, Clone)]
pub enum SideEffect {
    Audit(AuditRecord),
    Index(IndexOp),
    Notify(Notification),
}
