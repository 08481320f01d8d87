// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye el repositorio en memoria (`InMemoryWorkflowRepository`), un índice
// de búsqueda, un buzón de notificaciones, un sumidero de auditoría y una
// cola de trabajo con nombre. Estas implementaciones no son durables y se
// usan para demos o pruebas locales.
use crate::domain::{AuditRecord, IndexOp, InstanceStats, InstanceStatus, NewDefinition, Notification, PersistResult,
                    Priority, WorkflowDefinition, WorkflowInstance};
use crate::errors::{Result, WorkflowError};
use crate::repository::{AuditSink, IndexDispatcher, NotificationDispatcher, WorkQueue, WorkflowRepository};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use sgdea_domain::{EntityKind, EntityRef};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Repositorio en memoria. La atomicidad exigida por el contrato se
/// consigue manteniendo el lock de definiciones durante las operaciones
/// que leen el flag `active` y escriben instancias.
pub struct InMemoryWorkflowRepository {
    /// Definiciones (vivas y borradas lógicamente) por id.
    definitions: Mutex<HashMap<Uuid, WorkflowDefinition>>,
    /// Instancias por id.
    instances: Mutex<HashMap<Uuid, WorkflowInstance>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self { definitions: Mutex::new(HashMap::new()),
               instances: Mutex::new(HashMap::new()) }
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `WorkflowError::Storage`.
    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> std::result::Result<MutexGuard<'a, T>, WorkflowError> {
        m.lock().map_err(|e| WorkflowError::Storage(format!("mutex poisoned: {:?}", e)))
    }
}

impl Default for InMemoryWorkflowRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    /// Inserta la definición con id generado. Nace activa y sin borrar.
    fn create_definition(&self, input: NewDefinition, created_by: Uuid) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let definition = WorkflowDefinition { id,
                                              name: input.name,
                                              description: input.description,
                                              entity_kind: input.entity_kind,
                                              steps: input.steps,
                                              configuration: input.configuration,
                                              active: true,
                                              created_by,
                                              created_at: now,
                                              updated_at: now,
                                              deleted_at: None };
        self.lock(&self.definitions)?.insert(id, definition);
        Ok(id)
    }

    /// Retorna `NotFound` si no existe o está borrada lógicamente.
    fn get_definition(&self, id: &Uuid) -> Result<WorkflowDefinition> {
        let definitions = self.lock(&self.definitions)?;
        definitions.get(id)
                   .filter(|d| d.deleted_at.is_none())
                   .cloned()
                   .ok_or(WorkflowError::NotFound(format!("definición {}", id)))
    }

    fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>> {
        let definitions = self.lock(&self.definitions)?;
        let mut alive: Vec<WorkflowDefinition> =
            definitions.values().filter(|d| d.deleted_at.is_none()).cloned().collect();
        alive.sort_by_key(|d| d.created_at);
        Ok(alive)
    }

    fn update_definition(&self, definition: &WorkflowDefinition) -> Result<()> {
        let mut definitions = self.lock(&self.definitions)?;
        let stored = definitions.get_mut(&definition.id)
                                .filter(|d| d.deleted_at.is_none())
                                .ok_or(WorkflowError::NotFound(format!("definición {}", definition.id)))?;
        *stored = definition.clone();
        Ok(())
    }

    fn soft_delete_definition(&self, id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut definitions = self.lock(&self.definitions)?;
        let stored = definitions.get_mut(id)
                                .filter(|d| d.deleted_at.is_none())
                                .ok_or(WorkflowError::NotFound(format!("definición {}", id)))?;
        stored.deleted_at = Some(at);
        Ok(())
    }

    fn restore_definition(&self, id: &Uuid) -> Result<WorkflowDefinition> {
        let mut definitions = self.lock(&self.definitions)?;
        let stored = definitions.get_mut(id)
                                .ok_or(WorkflowError::NotFound(format!("definición {}", id)))?;
        if stored.deleted_at.is_none() {
            return Err(WorkflowError::Validation(format!("la definición {} no está borrada", id)));
        }
        stored.deleted_at = None;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    fn hard_delete_definition(&self, id: &Uuid) -> Result<()> {
        let mut definitions = self.lock(&self.definitions)?;
        definitions.remove(id).ok_or(WorkflowError::NotFound(format!("definición {}", id)))?;
        Ok(())
    }

    /// Lee el flag `active` e inserta la instancia bajo el mismo lock de
    /// definiciones: una desactivación concurrente no puede intercalarse.
    fn create_instance_if_active(&self, definition_id: &Uuid, target: EntityRef) -> Result<WorkflowInstance> {
        let definitions = self.lock(&self.definitions)?;
        let definition = definitions.get(definition_id)
                                    .filter(|d| d.deleted_at.is_none())
                                    .ok_or(WorkflowError::NotFound(format!("definición {}", definition_id)))?;
        if !definition.active {
            return Err(WorkflowError::InactiveDefinition(*definition_id));
        }

        let now = Utc::now();
        let instance = WorkflowInstance { id: Uuid::new_v4(),
                                          definition_id: *definition_id,
                                          target,
                                          status: InstanceStatus::Pending,
                                          current_step_index: 0,
                                          history: Vec::new(),
                                          version: 0,
                                          created_at: now,
                                          updated_at: now };
        self.lock(&self.instances)?.insert(instance.id, instance.clone());
        drop(definitions);
        Ok(instance)
    }

    fn get_instance(&self, id: &Uuid) -> Result<WorkflowInstance> {
        let instances = self.lock(&self.instances)?;
        instances.get(id)
                 .cloned()
                 .ok_or(WorkflowError::NotFound(format!("instancia {}", id)))
    }

    /// Compare-and-swap sobre el contador de versión: exactamente una de
    /// dos escrituras concurrentes desde la misma versión gana.
    fn update_instance(&self, instance: &WorkflowInstance, expected_version: i64) -> Result<PersistResult> {
        let mut instances = self.lock(&self.instances)?;
        let stored = instances.get_mut(&instance.id)
                              .ok_or(WorkflowError::NotFound(format!("instancia {}", instance.id)))?;
        if stored.version != expected_version {
            return Ok(PersistResult::Conflict);
        }
        let new_version = expected_version.saturating_add(1);
        *stored = instance.clone();
        stored.version = new_version;
        Ok(PersistResult::Ok { new_version })
    }

    fn list_instances(&self, definition_id: &Uuid) -> Result<Vec<WorkflowInstance>> {
        let instances = self.lock(&self.instances)?;
        let mut out: Vec<WorkflowInstance> =
            instances.values().filter(|i| &i.definition_id == definition_id).cloned().collect();
        out.sort_by_key(|i| i.created_at);
        Ok(out)
    }

    fn instance_stats(&self, definition_id: &Uuid) -> Result<InstanceStats> {
        let instances = self.lock(&self.instances)?;
        let mut stats = InstanceStats::default();
        for instance in instances.values().filter(|i| &i.definition_id == definition_id) {
            stats.total += 1;
            if instance.status.is_active() {
                stats.active += 1;
            }
            if instance.status == InstanceStatus::Completed {
                stats.completed += 1;
            }
        }
        Ok(stats)
    }

    fn max_referenced_step(&self, definition_id: &Uuid) -> Result<Option<usize>> {
        let instances = self.lock(&self.instances)?;
        let max = instances.values()
                           .filter(|i| &i.definition_id == definition_id)
                           .map(|i| {
                               i.history
                                .iter()
                                .map(|e| e.step_index)
                                .chain(std::iter::once(i.current_step_index))
                                .max()
                                .unwrap_or(0)
                           })
                           .max();
        Ok(max)
    }
}

/// Índice de búsqueda en memoria. Idempotente por construcción: indexar
/// dos veces deja un documento, borrar dos veces deja cero.
pub struct InMemoryIndex {
    documents: DashMap<(EntityKind, Uuid), JsonValue>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self { documents: DashMap::new() }
    }

    pub fn contains(&self, kind: EntityKind, id: &Uuid) -> bool {
        self.documents.contains_key(&(kind, *id))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexDispatcher for InMemoryIndex {
    fn index_entity(&self, kind: EntityKind, id: &Uuid, body: &JsonValue) -> Result<()> {
        self.documents.insert((kind, *id), body.clone());
        Ok(())
    }

    fn delete_from_index(&self, kind: EntityKind, id: &Uuid) -> Result<()> {
        self.documents.remove(&(kind, *id));
        Ok(())
    }
}

/// Buzón de notificaciones en memoria, inspeccionable en pruebas.
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()) }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationDispatcher for MemoryNotifier {
    fn notify(&self, user_id: &Uuid, message: &str, priority: Priority) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notification { user_id: *user_id, message: message.to_string(), priority });
        Ok(())
    }
}

/// Sumidero de auditoría en memoria (append-only), inspeccionable.
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self { records: Mutex::new(Vec::new()) }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(record.clone());
        Ok(())
    }
}

/// Cola de trabajo con nombre, en memoria. Pensada para el modo diferido
/// de indexación en demos y pruebas; no garantiza durabilidad.
pub struct InMemoryWorkQueue {
    queues: Mutex<HashMap<String, VecDeque<IndexOp>>>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self { queues: Mutex::new(HashMap::new()) }
    }

    pub fn pending(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(queue)
            .map(|q| q.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue for InMemoryWorkQueue {
    fn enqueue(&self, queue: &str, op: IndexOp) -> Result<()> {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(queue.to_string())
            .or_default()
            .push_back(op);
        Ok(())
    }

    fn claim(&self, queue: &str) -> Result<Option<IndexOp>> {
        Ok(self.queues
               .lock()
               .unwrap_or_else(|e| e.into_inner())
               .get_mut(queue)
               .and_then(|q| q.pop_front()))
    }
}
