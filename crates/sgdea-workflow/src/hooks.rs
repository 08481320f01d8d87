// Archivo: hooks.rs
// Propósito: ejecución post-commit de efectos colaterales (auditoría,
// indexación, notificaciones) y utilidades de diff de campos para decidir
// qué actualizaciones merecen registro de auditoría.
use crate::domain::{AuditRecord, IndexOp, SideEffect, WorkflowDefinition};
use crate::errors::Result;
use crate::repository::{AuditSink, IndexDispatcher, NotificationDispatcher, WorkQueue};
use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use sgdea_domain::EntityKind;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Campos cuya modificación dispara auditoría. Los campos de canal lateral
/// (timestamps) quedan fuera por construcción: `changed_fields` nunca los
/// compara.
static SIGNIFICANT_FIELDS: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| BTreeSet::from(["name", "steps", "active", "configuration"]));

/// Diferencia de campos entre dos versiones de una definición. Sólo campos
/// de negocio; `created_at`/`updated_at`/`deleted_at` no participan.
pub fn changed_fields(prev: &WorkflowDefinition, next: &WorkflowDefinition) -> BTreeSet<String> {
    let mut changed = BTreeSet::new();
    if prev.name != next.name {
        changed.insert("name".to_string());
    }
    if prev.description != next.description {
        changed.insert("description".to_string());
    }
    if prev.steps != next.steps {
        changed.insert("steps".to_string());
    }
    if prev.configuration != next.configuration {
        changed.insert("configuration".to_string());
    }
    if prev.active != next.active {
        changed.insert("active".to_string());
    }
    changed
}

/// ¿Intersecta el conjunto de campos modificados con el conjunto
/// significativo?
pub fn is_significant(changed: &BTreeSet<String>) -> bool {
    changed.iter().any(|f| SIGNIFICANT_FIELDS.contains(f.as_str()))
}

/// Modo de despacho del índice de búsqueda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMode {
    /// La mutación del índice se aplica antes de que el hook retorne.
    Synchronous,
    /// La mutación se encola en la cola nombrada; un worker la aplica
    /// después (entrega at-least-once del colaborador).
    Deferred { queue: String },
}

/// Ejecutor de efectos post-commit.
///
/// Se invoca siempre después de confirmar la mutación, nunca antes: la
/// auditoría sólo refleja cambios durables. Un fallo de cualquier hook se
/// registra con `tracing` y jamás se propaga a la mutación que lo originó.
pub struct HookRunner {
    audit: Arc<dyn AuditSink>,
    index: Arc<dyn IndexDispatcher>,
    notifier: Arc<dyn NotificationDispatcher>,
    queue: Arc<dyn WorkQueue>,
    mode: IndexMode,
}

impl HookRunner {
    pub fn new(audit: Arc<dyn AuditSink>,
               index: Arc<dyn IndexDispatcher>,
               notifier: Arc<dyn NotificationDispatcher>,
               queue: Arc<dyn WorkQueue>,
               mode: IndexMode)
               -> Self {
        Self { audit, index, notifier, queue, mode }
    }

    /// Ejecuta los efectos en orden. Nunca falla: cada error se registra y
    /// se continúa con el siguiente efecto.
    pub fn run(&self, effects: Vec<SideEffect>) {
        for effect in effects {
            let outcome = match effect {
                SideEffect::Audit(record) => self.emit_audit(&record),
                SideEffect::Index(op) => self.apply_index(op),
                SideEffect::Notify(n) => self.notifier.notify(&n.user_id, &n.message, n.priority),
            };
            if let Err(e) = outcome {
                tracing::warn!(error = %e, "fallo de hook post-commit; la mutación ya está confirmada");
            }
        }
    }

    /// Hook de indexación por ciclo de vida de entidad: alta o modificación.
    pub fn entity_saved(&self, kind: EntityKind, id: Uuid, body: JsonValue) {
        self.run(vec![SideEffect::Index(IndexOp::Upsert { kind, id, body })]);
    }

    /// Hook de indexación por ciclo de vida de entidad: baja. Viaja sólo el
    /// identificador.
    pub fn entity_deleted(&self, kind: EntityKind, id: Uuid) {
        self.run(vec![SideEffect::Index(IndexOp::Delete { kind, id })]);
    }

    /// Worker del modo diferido: reclama y aplica operaciones pendientes de
    /// la cola nombrada. Devuelve cuántas aplicó.
    pub fn drain_queue(&self, queue: &str) -> usize {
        let mut applied = 0;
        loop {
            match self.queue.claim(queue) {
                Ok(Some(op)) => {
                    if let Err(e) = self.dispatch_index(op) {
                        tracing::warn!(error = %e, queue, "fallo aplicando operación de índice diferida");
                    }
                    applied += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, queue, "fallo reclamando trabajo de la cola");
                    break;
                }
            }
        }
        applied
    }

    fn emit_audit(&self, record: &AuditRecord) -> Result<()> {
        self.audit.record(record)
    }

    fn apply_index(&self, op: IndexOp) -> Result<()> {
        match &self.mode {
            IndexMode::Synchronous => self.dispatch_index(op),
            IndexMode::Deferred { queue } => self.queue.enqueue(queue, op),
        }
    }

    fn dispatch_index(&self, op: IndexOp) -> Result<()> {
        match op {
            IndexOp::Upsert { kind, id, body } => self.index.index_entity(kind, &id, &body),
            IndexOp::Delete { kind, id } => self.index.delete_from_index(kind, &id),
        }
    }
}
