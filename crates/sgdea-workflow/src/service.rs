// Archivo: service.rs
// Propósito: implementar `WorkflowService`, la capa orquestadora que expone
// las operaciones de alto nivel (definiciones, instancias, estadísticas,
// disparo de indexación por ciclo de vida de entidad). Esta capa debe ser
// invocada desde handlers HTTP o desde workers.
//
// Disciplina post-commit: cada mutación del store/gestor devuelve sus
// efectos pendientes; el servicio los ejecuta con `HookRunner` sólo después
// de que la escritura quedó confirmada. Un fallo de hook se registra y no
// altera el resultado de la operación.
use crate::definitions::DefinitionStore;
use crate::domain::{DefinitionPatch, InstanceStats, NewDefinition, StepOutcome, WorkflowDefinition, WorkflowInstance};
use crate::errors::Result;
use crate::hooks::HookRunner;
use crate::instances::InstanceManager;
use crate::repository::WorkflowRepository;
use serde_json::Value as JsonValue;
use sgdea_domain::{Actor, EntityDirectory, EntityKind, EntityRef};
use std::sync::Arc;
use uuid::Uuid;

/// Servicio de alto nivel sobre el núcleo de workflow.
pub struct WorkflowService<R>
    where R: WorkflowRepository
{
    definitions: DefinitionStore<R>,
    instances: InstanceManager<R>,
    hooks: HookRunner,
}

impl<R> WorkflowService<R> where R: WorkflowRepository + 'static
{
    /// Crea el servicio inyectando el repositorio, el directorio de
    /// entidades y el ejecutor de hooks.
    pub fn new(repo: Arc<R>, directory: Arc<dyn EntityDirectory>, hooks: HookRunner) -> Self {
        Self { definitions: DefinitionStore::new(repo.clone()),
               instances: InstanceManager::new(repo, directory),
               hooks }
    }

    // --- Definiciones ---

    pub fn create_definition(&self, actor: &Actor, input: NewDefinition) -> Result<Uuid> {
        let (id, effects) = self.definitions.create(actor, input)?;
        self.hooks.run(effects);
        Ok(id)
    }

    pub fn get_definition(&self, actor: &Actor, id: &Uuid) -> Result<WorkflowDefinition> {
        self.definitions.get(actor, id)
    }

    pub fn list_definitions(&self, actor: &Actor) -> Result<Vec<WorkflowDefinition>> {
        self.definitions.list(actor)
    }

    pub fn update_definition(&self, actor: &Actor, id: &Uuid, patch: DefinitionPatch) -> Result<WorkflowDefinition> {
        let (definition, effects) = self.definitions.update(actor, id, patch)?;
        self.hooks.run(effects);
        Ok(definition)
    }

    pub fn activate_definition(&self, actor: &Actor, id: &Uuid) -> Result<WorkflowDefinition> {
        let (definition, effects) = self.definitions.activate(actor, id)?;
        self.hooks.run(effects);
        Ok(definition)
    }

    pub fn deactivate_definition(&self, actor: &Actor, id: &Uuid) -> Result<WorkflowDefinition> {
        let (definition, effects) = self.definitions.deactivate(actor, id)?;
        self.hooks.run(effects);
        Ok(definition)
    }

    /// Borra la definición; `permanent` pide el borrado físico (capacidad
    /// elevada). El borrado lógico es recuperable vía `restore_definition`.
    pub fn delete_definition(&self, actor: &Actor, id: &Uuid, permanent: bool) -> Result<()> {
        let effects = self.definitions.delete(actor, id, permanent)?;
        self.hooks.run(effects);
        Ok(())
    }

    pub fn restore_definition(&self, actor: &Actor, id: &Uuid) -> Result<WorkflowDefinition> {
        let (definition, effects) = self.definitions.restore(actor, id)?;
        self.hooks.run(effects);
        Ok(definition)
    }

    // --- Instancias ---

    pub fn start_instance(&self, actor: &Actor, definition_id: &Uuid, target: EntityRef) -> Result<WorkflowInstance> {
        let (instance, effects) = self.instances.start(actor, definition_id, target)?;
        self.hooks.run(effects);
        Ok(instance)
    }

    pub fn advance_instance(&self, actor: &Actor, instance_id: &Uuid, outcome: StepOutcome) -> Result<WorkflowInstance> {
        let (instance, effects) = self.instances.advance(actor, instance_id, outcome)?;
        self.hooks.run(effects);
        Ok(instance)
    }

    pub fn cancel_instance(&self, actor: &Actor, instance_id: &Uuid) -> Result<WorkflowInstance> {
        let (instance, effects) = self.instances.cancel(actor, instance_id)?;
        self.hooks.run(effects);
        Ok(instance)
    }

    pub fn get_instance(&self, instance_id: &Uuid) -> Result<WorkflowInstance> {
        self.instances.get(instance_id)
    }

    pub fn statistics(&self, definition_id: &Uuid) -> Result<InstanceStats> {
        self.instances.statistics(definition_id)
    }

    // --- Hook de indexación por ciclo de vida de entidad ---
    // Se dispara en alta/modificación/baja de una entidad gobernada,
    // independiente del workflow. Nunca falla hacia el caller.

    pub fn entity_saved(&self, kind: EntityKind, id: Uuid, body: JsonValue) {
        self.hooks.entity_saved(kind, id, body);
    }

    pub fn entity_deleted(&self, kind: EntityKind, id: Uuid) {
        self.hooks.entity_deleted(kind, id);
    }

    /// Acceso al ejecutor de hooks (p.ej. para drenar la cola diferida
    /// desde un worker).
    pub fn hooks(&self) -> &HookRunner {
        &self.hooks
    }
}
