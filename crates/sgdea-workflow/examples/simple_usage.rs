use serde_json::json;
use sgdea_domain::{Actor, Capability, EntityKind, EntityRecord, EntityRef, InMemoryEntityDirectory, Role};
use sgdea_workflow::errors::WorkflowError;
use sgdea_workflow::stubs::{InMemoryIndex, InMemoryWorkQueue, InMemoryWorkflowRepository, MemoryAuditSink,
                            MemoryNotifier};
use sgdea_workflow::{HookRunner, IndexMode, NewDefinition, Step, StepOutcome, WorkflowService};
use std::sync::Arc;
use uuid::Uuid;

fn main() -> Result<(), WorkflowError> {
    // Repositorio, colaboradores y servicio
    let repo = Arc::new(InMemoryWorkflowRepository::new());
    let directory = Arc::new(InMemoryEntityDirectory::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let index = Arc::new(InMemoryIndex::new());
    let queue = Arc::new(InMemoryWorkQueue::new());
    let hooks = HookRunner::new(audit.clone(), index.clone(), notifier.clone(), queue, IndexMode::Synchronous);
    let service = WorkflowService::new(repo, directory.clone(), hooks);

    let gestora = Actor::new(Uuid::new_v4(), "gestora").with_role(Role::Gestor)
                                                       .with_capability(Capability::CreateDefinitions);

    // Definir un trámite de tres pasos sobre documentos
    let definition_id = service.create_definition(&gestora,
                                                  NewDefinition { name: "aprobación de oficios".into(),
                                                                  description: "revisión y firma".into(),
                                                                  entity_kind: EntityKind::Document,
                                                                  steps: vec![Step::new("revisión"),
                                                                              Step::new("visto bueno").auto(),
                                                                              Step::new("firma")],
                                                                  configuration: Default::default() })?;
    println!("definición creada: {}\n", definition_id);

    // Registrar el documento gobernado e indexarlo
    let document = EntityRef::new(EntityKind::Document, Uuid::new_v4());
    directory.put(EntityRecord { reference: document,
                                 title: "oficio 042".into(),
                                 owner_id: Uuid::new_v4(),
                                 body: json!({"titulo": "oficio 042", "folios": 3}) })?;
    service.entity_saved(document.kind, document.id, json!({"titulo": "oficio 042", "folios": 3}));
    println!("documento indexado: {}", index.contains(document.kind, &document.id));

    // Iniciar la instancia y aprobar el primer paso; el segundo ("visto
    // bueno") es de auto-avance y se consume solo
    let instance = service.start_instance(&gestora, &definition_id, document)?;
    println!("instancia {} en {}", instance.id, instance.status);

    let instance = service.advance_instance(&gestora, &instance.id, StepOutcome::Approved)?;
    println!("tras primera aprobación: {} (paso {})", instance.status, instance.current_step_index);

    // Aprobar la firma completa el trámite y notifica
    let instance = service.advance_instance(&gestora, &instance.id, StepOutcome::Approved)?;
    println!("tras la firma: {}\n", instance.status);

    for n in notifier.sent() {
        println!("notificación para {}: {}", n.user_id, n.message);
    }
    for record in audit.records() {
        println!("auditoría: {:?} {} {}", record.action, record.entity_type, record.entity_id);
    }

    let stats = service.statistics(&definition_id)?;
    println!("\nestadísticas: total={} activas={} completadas={}", stats.total, stats.active, stats.completed);

    Ok(())
}
