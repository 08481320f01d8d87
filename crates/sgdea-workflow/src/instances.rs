// Archivo: instances.rs
// Propósito: gestor de instancias de workflow. Crea instancias contra una
// entidad concreta, las avanza por la máquina de estados y agrega
// estadísticas. Las mutaciones usan control optimista de versiones y
// devuelven sus efectos post-commit.
//
// Máquina de estados por instancia:
//   pending → in_progress → (in_progress)* → completed
// Todo estado no terminal puede pasar a cancelled o rejected. Ninguna
// transición sale de un estado terminal.
use crate::domain::{AuditAction, AuditRecord, InstanceStats, InstanceStatus, Notification, PersistResult,
                    Priority, Severity, SideEffect, StepEvent, StepOutcome, WorkflowDefinition, WorkflowInstance};
use crate::errors::{Result, WorkflowError};
use crate::gate::{AuthorizationGate, GateAction};
use crate::repository::WorkflowRepository;
use chrono::Utc;
use sgdea_domain::{Actor, EntityDirectory, EntityRef};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Tipo de entidad con el que las instancias aparecen en auditoría.
pub const INSTANCE_AUDIT_TYPE: &str = "workflow_instance";

/// Gestor de instancias sobre un `WorkflowRepository` y un directorio de
/// entidades gobernadas.
pub struct InstanceManager<R>
    where R: WorkflowRepository
{
    repo: Arc<R>,
    directory: Arc<dyn EntityDirectory>,
}

impl<R> InstanceManager<R> where R: WorkflowRepository
{
    pub fn new(repo: Arc<R>, directory: Arc<dyn EntityDirectory>) -> Self {
        Self { repo, directory }
    }

    /// Inicia una instancia de la definición contra la entidad referida.
    ///
    /// Valida que la entidad exista y sea del tipo que la definición
    /// gobierna; la comprobación del flag `active` y la inserción ocurren
    /// como unidad atómica en el repositorio (`InactiveDefinition` si el
    /// flag es falso). La instancia nace en `pending`, paso 0, historial
    /// vacío.
    pub fn start(&self,
                 actor: &Actor,
                 definition_id: &Uuid,
                 target: EntityRef)
                 -> Result<(WorkflowInstance, Vec<SideEffect>)> {
        let definition = self.repo.get_definition(definition_id)?;
        if definition.entity_kind != target.kind {
            return Err(WorkflowError::Validation(format!("la definición gobierna entidades {} y se recibió {}",
                                                         definition.entity_kind, target.kind)));
        }
        self.directory
            .fetch(&target)?
            .ok_or(WorkflowError::NotFound(format!("entidad {}", target)))?;

        // El chequeo autoritativo del flag activo es el del repositorio,
        // bajo su propio lock; su denegación es InactiveDefinition, no un
        // error de autorización.
        let instance = self.repo.create_instance_if_active(definition_id, target)?;
        let effects =
            vec![SideEffect::Audit(audit(instance.id, AuditAction::Created, actor, Severity::Info))];
        Ok((instance, effects))
    }

    /// Decide el paso actual de la instancia.
    ///
    /// - `approved` en el último paso → `completed`.
    /// - `approved` en un paso intermedio → `in_progress`, índice +1, y se
    ///   consumen los pasos con auto-avance.
    /// - `rejected` → `rejected` (terminal), índice congelado.
    ///
    /// Falla con `InvalidTransition` si la instancia ya es terminal y con
    /// `Conflict` si otra mutación ganó la carrera de versiones.
    pub fn advance(&self,
                   actor: &Actor,
                   instance_id: &Uuid,
                   outcome: StepOutcome)
                   -> Result<(WorkflowInstance, Vec<SideEffect>)> {
        if outcome == StepOutcome::Cancelled {
            return Err(WorkflowError::Validation("para cancelar una instancia use la operación de cancelación".into()));
        }
        let instance = self.repo.get_instance(instance_id)?;
        let definition = self.repo.get_definition(&instance.definition_id)?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::InvalidTransition(format!("la instancia {} está en estado terminal {}",
                                                                instance.id, instance.status)));
        }

        let step = &definition.steps[instance.current_step_index];
        AuthorizationGate::authorize(actor, &GateAction::AdvanceInstance { definition: &definition, step })?;

        let now = Utc::now();
        let mut next = instance.clone();
        next.history.push(StepEvent { step_index: next.current_step_index,
                                      actor_id: actor.id(),
                                      at: now,
                                      outcome });

        match outcome {
            StepOutcome::Approved => self.apply_approval(&definition, &mut next, actor.id()),
            StepOutcome::Rejected => {
                // Rechazo: terminal, el índice queda congelado donde estaba.
                next.status = InstanceStatus::Rejected;
            }
            StepOutcome::Cancelled => unreachable!("rechazado arriba"),
        }
        next.updated_at = now;

        self.commit(&mut next, instance.version)?;

        let mut effects = vec![SideEffect::Audit(audit(next.id, AuditAction::Updated, actor, Severity::Info))];
        match next.status {
            InstanceStatus::Completed => {
                effects.push(SideEffect::Notify(Notification { user_id: definition.created_by,
                                                               message: completion_message(&definition, &next),
                                                               priority: Priority::Normal }));
                // El dueño de la entidad también se entera; si la entidad ya
                // no existe, simplemente no hay a quién avisar.
                if let Ok(Some(record)) = self.directory.fetch(&next.target) {
                    effects.push(SideEffect::Notify(Notification { user_id: record.owner_id,
                                                                   message: completion_message(&definition, &next),
                                                                   priority: Priority::Normal }));
                }
            }
            InstanceStatus::Rejected => {
                effects.push(SideEffect::Notify(Notification {
                    user_id: definition.created_by,
                    message: format!("la instancia {} del workflow '{}' fue rechazada en el paso {}",
                                     next.id, definition.name, next.current_step_index),
                    priority: Priority::High,
                }));
            }
            _ => {}
        }
        Ok((next, effects))
    }

    /// Cancela una instancia no terminal (status `cancelled`, índice
    /// congelado). Falla con `InvalidTransition` desde estados terminales.
    pub fn cancel(&self, actor: &Actor, instance_id: &Uuid) -> Result<(WorkflowInstance, Vec<SideEffect>)> {
        let instance = self.repo.get_instance(instance_id)?;
        let definition = self.repo.get_definition(&instance.definition_id)?;
        AuthorizationGate::authorize(actor, &GateAction::CancelInstance { definition: &definition })?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::InvalidTransition(format!("la instancia {} está en estado terminal {}",
                                                                instance.id, instance.status)));
        }

        let now = Utc::now();
        let mut next = instance.clone();
        next.history.push(StepEvent { step_index: next.current_step_index,
                                      actor_id: actor.id(),
                                      at: now,
                                      outcome: StepOutcome::Cancelled });
        next.status = InstanceStatus::Cancelled;
        next.updated_at = now;

        self.commit(&mut next, instance.version)?;

        let effects = vec![SideEffect::Audit(audit(next.id, AuditAction::Updated, actor, Severity::Info)),
                           SideEffect::Notify(Notification {
                               user_id: definition.created_by,
                               message: format!("la instancia {} del workflow '{}' fue cancelada", next.id,
                                                definition.name),
                               priority: Priority::Normal,
                           })];
        Ok((next, effects))
    }

    /// Obtiene una instancia por id (lectura pura).
    pub fn get(&self, instance_id: &Uuid) -> Result<WorkflowInstance> {
        self.repo.get_instance(instance_id)
    }

    /// Estadísticas agregadas de la definición (lectura pura): total,
    /// activas (pending + in_progress) y completadas.
    pub fn statistics(&self, definition_id: &Uuid) -> Result<InstanceStats> {
        self.repo.instance_stats(definition_id)
    }

    /// Aplica una aprobación: completa en el último paso, si no avanza el
    /// índice y consume los pasos de auto-avance intermedios.
    fn apply_approval(&self, definition: &WorkflowDefinition, next: &mut WorkflowInstance, actor_id: Uuid) {
        let last = definition.steps.len() - 1;
        if next.current_step_index == last {
            next.status = InstanceStatus::Completed;
            return;
        }
        next.current_step_index += 1;
        next.status = InstanceStatus::InProgress;

        while definition.steps[next.current_step_index].auto_advance {
            next.history.push(StepEvent { step_index: next.current_step_index,
                                          actor_id,
                                          at: Utc::now(),
                                          outcome: StepOutcome::Approved });
            if next.current_step_index == last {
                next.status = InstanceStatus::Completed;
                break;
            }
            next.current_step_index += 1;
        }
    }

    /// Escritura con control optimista; la pérdida de la carrera aflora
    /// como `Conflict` reintentable por el caller.
    fn commit(&self, next: &mut WorkflowInstance, expected_version: i64) -> Result<()> {
        match self.repo.update_instance(next, expected_version)? {
            PersistResult::Ok { new_version } => {
                next.version = new_version;
                Ok(())
            }
            PersistResult::Conflict => {
                Err(WorkflowError::Conflict(format!("la instancia {} fue modificada concurrentemente", next.id)))
            }
        }
    }
}

fn completion_message(definition: &WorkflowDefinition, instance: &WorkflowInstance) -> String {
    format!("la instancia {} del workflow '{}' sobre {} fue completada", instance.id, definition.name,
            instance.target)
}

fn audit(entity_id: Uuid, action: AuditAction, actor: &Actor, severity: Severity) -> AuditRecord {
    AuditRecord { entity_type: INSTANCE_AUDIT_TYPE.to_string(),
                  entity_id,
                  action,
                  actor_id: actor.id(),
                  at: Utc::now(),
                  changed_fields: BTreeSet::new(),
                  severity }
}
