use serde_json::json;
use sgdea_domain::{Actor, Capability, EntityKind, EntityRecord, EntityRef, InMemoryEntityDirectory, Role};
use sgdea_workflow::{AuditAction, AuditRecord, DefinitionPatch, HookRunner, IndexDispatcher, IndexMode,
                     InMemoryIndex, InMemoryWorkQueue, InMemoryWorkflowRepository, MemoryAuditSink, MemoryNotifier,
                     NewDefinition, Priority, Severity, Step, StepOutcome, WorkflowService};
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
  service: WorkflowService<InMemoryWorkflowRepository>,
  directory: Arc<InMemoryEntityDirectory>,
  audit: Arc<MemoryAuditSink>,
  notifier: Arc<MemoryNotifier>,
  index: Arc<InMemoryIndex>,
  queue: Arc<InMemoryWorkQueue>,
}

fn fixture(mode: IndexMode) -> Fixture {
  let repo = Arc::new(InMemoryWorkflowRepository::new());
  let directory = Arc::new(InMemoryEntityDirectory::new());
  let audit = Arc::new(MemoryAuditSink::new());
  let notifier = Arc::new(MemoryNotifier::new());
  let index = Arc::new(InMemoryIndex::new());
  let queue = Arc::new(InMemoryWorkQueue::new());
  let hooks = HookRunner::new(audit.clone(), index.clone(), notifier.clone(), queue.clone(), mode);
  Fixture { service: WorkflowService::new(repo, directory.clone(), hooks),
            directory,
            audit,
            notifier,
            index,
            queue }
}

fn creator() -> Actor {
  Actor::new(Uuid::new_v4(), "gestora").with_role(Role::Gestor)
                                       .with_capability(Capability::CreateDefinitions)
}

fn simple_definition() -> NewDefinition {
  NewDefinition { name: "tramite".into(),
                  description: "original".into(),
                  entity_kind: EntityKind::Document,
                  steps: vec![Step::new("revisión")],
                  configuration: Default::default() }
}

fn seed_document(directory: &InMemoryEntityDirectory, owner: Uuid) -> EntityRef {
  let reference = EntityRef::new(EntityKind::Document, Uuid::new_v4());
  directory.put(EntityRecord { reference,
                               title: "oficio".into(),
                               owner_id: owner,
                               body: json!({}) })
           .expect("put");
  reference
}

fn last_record(audit: &MemoryAuditSink) -> AuditRecord {
  audit.records().last().cloned().expect("registro de auditoría")
}

#[test]
fn significant_field_update_emits_audit_with_diff() {
  let f = fixture(IndexMode::Synchronous);
  let actor = creator();
  let id = f.service.create_definition(&actor, simple_definition()).expect("create");
  let before = f.audit.records().len();

  let patch = DefinitionPatch { name: Some("tramite-v2".into()), ..Default::default() };
  f.service.update_definition(&actor, &id, patch).expect("update");

  let records = f.audit.records();
  assert_eq!(records.len(), before + 1);
  let record = records.last().unwrap();
  assert_eq!(record.action, AuditAction::Updated);
  assert_eq!(record.severity, Severity::Info);
  assert!(record.changed_fields.contains("name"));
}

#[test]
fn side_channel_only_update_emits_nothing() {
  let f = fixture(IndexMode::Synchronous);
  let actor = creator();
  let id = f.service.create_definition(&actor, simple_definition()).expect("create");
  let before = f.audit.records().len();

  // la descripción no pertenece al conjunto significativo
  let patch = DefinitionPatch { description: Some("retocada".into()), ..Default::default() };
  f.service.update_definition(&actor, &id, patch).expect("update");
  assert_eq!(f.audit.records().len(), before);
}

#[test]
fn deactivation_and_deletion_escalate_severity() {
  let f = fixture(IndexMode::Synchronous);
  let actor = creator();
  let admin = Actor::new(Uuid::new_v4(), "admin").with_role(Role::Admin).with_capability(Capability::HardDelete);

  let id = f.service.create_definition(&actor, simple_definition()).expect("create");
  f.service.deactivate_definition(&actor, &id).expect("deactivate");
  let record = last_record(&f.audit);
  assert_eq!(record.severity, Severity::Warning);
  assert!(record.changed_fields.contains("active"));

  // reactivar vuelve a info
  f.service.activate_definition(&actor, &id).expect("activate");
  assert_eq!(last_record(&f.audit).severity, Severity::Info);

  f.service.delete_definition(&admin, &id, false).expect("soft delete");
  let record = last_record(&f.audit);
  assert_eq!(record.action, AuditAction::Deleted);
  assert_eq!(record.severity, Severity::Warning);

  f.service.restore_definition(&admin, &id).expect("restore");
  assert_eq!(last_record(&f.audit).action, AuditAction::Restored);

  f.service.delete_definition(&admin, &id, true).expect("hard delete");
  let record = last_record(&f.audit);
  assert_eq!(record.action, AuditAction::ForceDeleted);
  assert_eq!(record.severity, Severity::Critical);
}

#[test]
fn hook_failure_never_fails_the_mutation() {
  struct FallaSink;
  impl sgdea_workflow::AuditSink for FallaSink {
    fn record(&self, _record: &AuditRecord) -> sgdea_workflow::Result<()> {
      Err(sgdea_workflow::WorkflowError::Storage("sumidero caído".into()))
    }
  }

  let repo = Arc::new(InMemoryWorkflowRepository::new());
  let directory = Arc::new(InMemoryEntityDirectory::new());
  let hooks = HookRunner::new(Arc::new(FallaSink),
                              Arc::new(InMemoryIndex::new()),
                              Arc::new(MemoryNotifier::new()),
                              Arc::new(InMemoryWorkQueue::new()),
                              IndexMode::Synchronous);
  let service = WorkflowService::new(repo, directory, hooks);

  let actor = creator();
  // el sumidero de auditoría falla siempre; la mutación igual se confirma
  let id = service.create_definition(&actor, simple_definition()).expect("create pese al hook");
  assert_eq!(service.get_definition(&actor, &id).expect("get").id, id);
}

#[test]
fn index_delete_is_idempotent() {
  let index = InMemoryIndex::new();
  let id = Uuid::new_v4();
  index.index_entity(EntityKind::Document, &id, &json!({"t": 1})).expect("index");
  index.index_entity(EntityKind::Document, &id, &json!({"t": 2})).expect("reindex");
  assert_eq!(index.len(), 1);

  index.delete_from_index(EntityKind::Document, &id).expect("delete");
  index.delete_from_index(EntityKind::Document, &id).expect("delete otra vez");
  assert!(!index.contains(EntityKind::Document, &id));
  assert!(index.is_empty());
}

#[test]
fn synchronous_mode_indexes_before_returning() {
  let f = fixture(IndexMode::Synchronous);
  let id = Uuid::new_v4();
  f.service.entity_saved(EntityKind::Document, id, json!({"titulo": "oficio"}));
  assert!(f.index.contains(EntityKind::Document, &id));

  f.service.entity_deleted(EntityKind::Document, id);
  assert!(!f.index.contains(EntityKind::Document, &id));
}

#[test]
fn deferred_mode_enqueues_and_worker_drains() {
  let f = fixture(IndexMode::Deferred { queue: "indexado".into() });
  let id = Uuid::new_v4();
  f.service.entity_saved(EntityKind::CaseFile, id, json!({"serie": "historias"}));

  // nada aplicado aún: la operación quedó en la cola nombrada
  assert!(!f.index.contains(EntityKind::CaseFile, &id));
  assert_eq!(f.queue.pending("indexado"), 1);

  assert_eq!(f.service.hooks().drain_queue("indexado"), 1);
  assert!(f.index.contains(EntityKind::CaseFile, &id));
  assert_eq!(f.service.hooks().drain_queue("indexado"), 0);
}

#[test]
fn completion_notifies_creator_and_entity_owner() {
  let f = fixture(IndexMode::Synchronous);
  let actor = creator();
  let owner = Uuid::new_v4();
  let id = f.service.create_definition(&actor, simple_definition()).expect("create");
  let target = seed_document(&f.directory, owner);

  let instance = f.service.start_instance(&actor, &id, target).expect("start");
  f.service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("completar");

  let sent = f.notifier.sent();
  assert!(sent.iter().any(|n| n.user_id == actor.id() && n.priority == Priority::Normal));
  assert!(sent.iter().any(|n| n.user_id == owner));
}

#[test]
fn rejection_notifies_creator_with_high_priority() {
  let f = fixture(IndexMode::Synchronous);
  let actor = creator();
  let id = f.service.create_definition(&actor, simple_definition()).expect("create");
  let target = seed_document(&f.directory, Uuid::new_v4());

  let instance = f.service.start_instance(&actor, &id, target).expect("start");
  f.service.advance_instance(&actor, &instance.id, StepOutcome::Rejected).expect("rechazar");

  let sent = f.notifier.sent();
  assert!(sent.iter().any(|n| n.user_id == actor.id() && n.priority == Priority::High));
}
