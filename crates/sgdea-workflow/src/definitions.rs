// Archivo: definitions.rs
// Propósito: almacén de definiciones de workflow. Aplica la puerta de
// autorización, valida invariantes (pasos no vacíos, no-truncamiento,
// bloqueo por instancias activas, borrado sólo sin instancias) y devuelve
// los efectos post-commit de cada mutación.
use crate::domain::{AuditAction, AuditRecord, DefinitionPatch, NewDefinition, Severity, SideEffect, WorkflowDefinition};
use crate::errors::{Result, WorkflowError};
use crate::gate::{AuthorizationGate, GateAction};
use crate::hooks::{changed_fields, is_significant};
use crate::repository::WorkflowRepository;
use chrono::Utc;
use sgdea_domain::Actor;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Tipo de entidad con el que las definiciones aparecen en auditoría.
pub const DEFINITION_AUDIT_TYPE: &str = "workflow_definition";

/// Almacén de definiciones sobre un `WorkflowRepository` inyectado.
///
/// Cada mutación devuelve `(valor, efectos)`: el caller (normalmente
/// `WorkflowService`) ejecuta los efectos después del commit.
pub struct DefinitionStore<R>
    where R: WorkflowRepository
{
    repo: Arc<R>,
}

impl<R> DefinitionStore<R> where R: WorkflowRepository
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Crea una definición. Falla con `Validation` si la lista de pasos
    /// está vacía. La definición nace activa.
    pub fn create(&self, actor: &Actor, input: NewDefinition) -> Result<(Uuid, Vec<SideEffect>)> {
        AuthorizationGate::authorize(actor, &GateAction::CreateDefinition)?;
        if input.steps.is_empty() {
            return Err(WorkflowError::Validation("la definición debe tener al menos un paso".into()));
        }
        let id = self.repo.create_definition(input, actor.id())?;
        let effects = vec![SideEffect::Audit(audit(id, AuditAction::Created, actor, BTreeSet::new(), Severity::Info))];
        Ok((id, effects))
    }

    /// Consulta una definición aplicando la regla de visibilidad.
    pub fn get(&self, actor: &Actor, id: &Uuid) -> Result<WorkflowDefinition> {
        let definition = self.repo.get_definition(id)?;
        AuthorizationGate::authorize(actor, &GateAction::ViewDefinition { definition: &definition })?;
        Ok(definition)
    }

    /// Lista las definiciones visibles para el actor.
    pub fn list(&self, actor: &Actor) -> Result<Vec<WorkflowDefinition>> {
        let all = self.repo.list_definitions()?;
        Ok(all.into_iter()
              .filter(|d| AuthorizationGate::evaluate(actor, &GateAction::ViewDefinition { definition: d }).is_allowed())
              .collect())
    }

    /// Actualiza campos de la definición de forma atómica.
    ///
    /// Precondiciones, en orden:
    /// - permiso de edición (creador o admin-tier);
    /// - ninguna instancia pendiente o en curso (`Conflict` con el conteo);
    /// - el parche no deja la lista de pasos vacía ni la recorta por debajo
    ///   del mayor índice de paso referenciado por alguna instancia.
    ///
    /// Emite auditoría sólo si el diff toca un campo significativo.
    pub fn update(&self,
                  actor: &Actor,
                  id: &Uuid,
                  patch: DefinitionPatch)
                  -> Result<(WorkflowDefinition, Vec<SideEffect>)> {
        let prev = self.repo.get_definition(id)?;
        AuthorizationGate::authorize(actor, &GateAction::UpdateDefinition { definition: &prev })?;

        let stats = self.repo.instance_stats(id)?;
        if stats.active > 0 {
            return Err(WorkflowError::Conflict(format!("existen {} instancias activas que bloquean la edición",
                                                       stats.active)));
        }

        if let Some(steps) = &patch.steps {
            if steps.is_empty() {
                return Err(WorkflowError::Validation("la definición debe tener al menos un paso".into()));
            }
            if let Some(max) = self.repo.max_referenced_step(id)? {
                if steps.len() <= max {
                    return Err(WorkflowError::Conflict(format!(
                        "el recorte de pasos invalidaría instancias existentes (mayor paso referenciado: {})",
                        max
                    )));
                }
            }
        }

        let mut next = prev.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(steps) = patch.steps {
            next.steps = steps;
        }
        if let Some(configuration) = patch.configuration {
            next.configuration = configuration;
        }
        next.updated_at = Utc::now();
        self.repo.update_definition(&next)?;

        let changed = changed_fields(&prev, &next);
        let mut effects = Vec::new();
        if is_significant(&changed) {
            effects.push(SideEffect::Audit(audit(next.id, AuditAction::Updated, actor, changed, Severity::Info)));
        }
        Ok((next, effects))
    }

    /// Activa la definición. No afecta a instancias en curso.
    pub fn activate(&self, actor: &Actor, id: &Uuid) -> Result<(WorkflowDefinition, Vec<SideEffect>)> {
        self.set_active(actor, id, true)
    }

    /// Desactiva la definición: deja de admitir instancias nuevas, las en
    /// curso continúan. La transición true→false se audita con severidad
    /// warning.
    pub fn deactivate(&self, actor: &Actor, id: &Uuid) -> Result<(WorkflowDefinition, Vec<SideEffect>)> {
        self.set_active(actor, id, false)
    }

    fn set_active(&self, actor: &Actor, id: &Uuid, active: bool) -> Result<(WorkflowDefinition, Vec<SideEffect>)> {
        let prev = self.repo.get_definition(id)?;
        AuthorizationGate::authorize(actor, &GateAction::UpdateDefinition { definition: &prev })?;
        if prev.active == active {
            return Ok((prev, Vec::new()));
        }
        let mut next = prev.clone();
        next.active = active;
        next.updated_at = Utc::now();
        self.repo.update_definition(&next)?;

        let severity = if active { Severity::Info } else { Severity::Warning };
        let changed = changed_fields(&prev, &next);
        let effects = vec![SideEffect::Audit(audit(next.id, AuditAction::Updated, actor, changed, severity))];
        Ok((next, effects))
    }

    /// Elimina la definición. Política "cero instancias jamás": cualquier
    /// instancia que la referencie, terminal o no, bloquea el borrado con
    /// `Conflict`. Por defecto el borrado es lógico (recuperable); con
    /// `permanent` se elimina la fila, lo que exige la capacidad elevada.
    pub fn delete(&self, actor: &Actor, id: &Uuid, permanent: bool) -> Result<Vec<SideEffect>> {
        let definition = self.repo.get_definition(id)?;
        AuthorizationGate::authorize(actor, &GateAction::DeleteDefinition { permanent })?;

        let stats = self.repo.instance_stats(id)?;
        if stats.total > 0 {
            return Err(WorkflowError::Conflict(format!(
                "existen {} instancias ({} activas) que referencian la definición",
                stats.total, stats.active
            )));
        }

        let effects = if permanent {
            self.repo.hard_delete_definition(id)?;
            vec![SideEffect::Audit(audit(definition.id, AuditAction::ForceDeleted, actor, BTreeSet::new(),
                                         Severity::Critical))]
        } else {
            self.repo.soft_delete_definition(id, Utc::now())?;
            vec![SideEffect::Audit(audit(definition.id, AuditAction::Deleted, actor, BTreeSet::new(),
                                         Severity::Warning))]
        };
        Ok(effects)
    }

    /// Revierte un borrado lógico.
    pub fn restore(&self, actor: &Actor, id: &Uuid) -> Result<(WorkflowDefinition, Vec<SideEffect>)> {
        AuthorizationGate::authorize(actor, &GateAction::RestoreDefinition)?;
        let restored = self.repo.restore_definition(id)?;
        let effects =
            vec![SideEffect::Audit(audit(restored.id, AuditAction::Restored, actor, BTreeSet::new(), Severity::Info))];
        Ok((restored, effects))
    }
}

fn audit(entity_id: Uuid,
         action: AuditAction,
         actor: &Actor,
         changed_fields: BTreeSet<String>,
         severity: Severity)
         -> AuditRecord {
    AuditRecord { entity_type: DEFINITION_AUDIT_TYPE.to_string(),
                  entity_id,
                  action,
                  actor_id: actor.id(),
                  at: Utc::now(),
                  changed_fields,
                  severity }
}
