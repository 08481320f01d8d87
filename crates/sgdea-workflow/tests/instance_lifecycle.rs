use serde_json::json;
use sgdea_domain::{Actor, Capability, EntityKind, EntityRecord, EntityRef, InMemoryEntityDirectory, Role};
use sgdea_workflow::{HookRunner, IndexMode, InMemoryIndex, InMemoryWorkQueue, InMemoryWorkflowRepository,
                     InstanceStatus, MemoryAuditSink, MemoryNotifier, NewDefinition, Step, StepOutcome,
                     WorkflowError, WorkflowService};
use std::sync::Arc;
use uuid::Uuid;

fn service_with_directory() -> (WorkflowService<InMemoryWorkflowRepository>, Arc<InMemoryEntityDirectory>) {
  let repo = Arc::new(InMemoryWorkflowRepository::new());
  let directory = Arc::new(InMemoryEntityDirectory::new());
  let hooks = HookRunner::new(Arc::new(MemoryAuditSink::new()),
                              Arc::new(InMemoryIndex::new()),
                              Arc::new(MemoryNotifier::new()),
                              Arc::new(InMemoryWorkQueue::new()),
                              IndexMode::Synchronous);
  (WorkflowService::new(repo, directory.clone(), hooks), directory)
}

fn creator() -> Actor {
  Actor::new(Uuid::new_v4(), "gestora").with_role(Role::Gestor)
                                       .with_capability(Capability::CreateDefinitions)
}

fn definition_with(steps: Vec<Step>) -> NewDefinition {
  NewDefinition { name: "revision-expedientes".into(),
                  description: String::new(),
                  entity_kind: EntityKind::CaseFile,
                  steps,
                  configuration: Default::default() }
}

fn seed_case_file(directory: &InMemoryEntityDirectory, owner: Uuid) -> EntityRef {
  let reference = EntityRef::new(EntityKind::CaseFile, Uuid::new_v4());
  directory.put(EntityRecord { reference,
                               title: "expediente-2026-009".into(),
                               owner_id: owner,
                               body: json!({"serie": "contractual"}) })
           .expect("put entity");
  reference
}

#[test]
fn three_step_walkthrough_reaches_completed() {
  let (service, directory) = service_with_directory();
  let actor = creator();
  let id = service.create_definition(&actor,
                                     definition_with(vec![Step::new("radicación"), Step::new("revisión"),
                                                          Step::new("aprobación")]))
                  .expect("create");
  let target = seed_case_file(&directory, actor.id());

  let instance = service.start_instance(&actor, &id, target).expect("start");
  assert_eq!(instance.status, InstanceStatus::Pending);
  assert_eq!(instance.current_step_index, 0);
  assert!(instance.history.is_empty());

  let instance = service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("paso 0");
  assert_eq!(instance.status, InstanceStatus::InProgress);
  assert_eq!(instance.current_step_index, 1);

  let instance = service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("paso 1");
  assert_eq!(instance.current_step_index, 2);

  let instance = service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("paso 2");
  assert_eq!(instance.status, InstanceStatus::Completed);
  assert_eq!(instance.history.len(), 3);
  assert!(instance.history.iter().all(|e| e.actor_id == actor.id()));
}

#[test]
fn rejection_freezes_index_and_is_terminal() {
  let (service, directory) = service_with_directory();
  let actor = creator();
  let id = service.create_definition(&actor,
                                     definition_with(vec![Step::new("revisión"), Step::new("aprobación")]))
                  .expect("create");
  let target = seed_case_file(&directory, actor.id());
  let instance = service.start_instance(&actor, &id, target).expect("start");
  let instance = service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("aprobar");
  assert_eq!(instance.current_step_index, 1);

  let rejected = service.advance_instance(&actor, &instance.id, StepOutcome::Rejected).expect("rechazar");
  assert_eq!(rejected.status, InstanceStatus::Rejected);
  // el índice queda congelado donde estaba
  assert_eq!(rejected.current_step_index, 1);

  let err = service.advance_instance(&actor, &rejected.id, StepOutcome::Approved).unwrap_err();
  assert!(matches!(err, WorkflowError::InvalidTransition(_)));
  // y el estado persistido no cambió
  let stored = service.get_instance(&rejected.id).expect("get");
  assert_eq!(stored.status, InstanceStatus::Rejected);
  assert_eq!(stored.current_step_index, 1);
}

#[test]
fn terminal_instances_ignore_cancel_too() {
  let (service, directory) = service_with_directory();
  let actor = creator();
  let id = service.create_definition(&actor, definition_with(vec![Step::new("única")])).expect("create");
  let target = seed_case_file(&directory, actor.id());
  let instance = service.start_instance(&actor, &id, target).expect("start");
  let done = service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("completar");
  assert_eq!(done.status, InstanceStatus::Completed);

  let err = service.cancel_instance(&actor, &done.id).unwrap_err();
  assert!(matches!(err, WorkflowError::InvalidTransition(_)));
  let stored = service.get_instance(&done.id).expect("get");
  assert_eq!(stored.status, InstanceStatus::Completed);
}

#[test]
fn cancel_from_pending_and_in_progress() {
  let (service, directory) = service_with_directory();
  let actor = creator();
  let id = service.create_definition(&actor,
                                     definition_with(vec![Step::new("revisión"), Step::new("aprobación")]))
                  .expect("create");

  let target = seed_case_file(&directory, actor.id());
  let pending = service.start_instance(&actor, &id, target).expect("start");
  let cancelled = service.cancel_instance(&actor, &pending.id).expect("cancel pending");
  assert_eq!(cancelled.status, InstanceStatus::Cancelled);
  assert_eq!(cancelled.history.len(), 1);
  assert_eq!(cancelled.history[0].outcome, StepOutcome::Cancelled);

  let target2 = seed_case_file(&directory, actor.id());
  let started = service.start_instance(&actor, &id, target2).expect("start 2");
  let in_progress = service.advance_instance(&actor, &started.id, StepOutcome::Approved).expect("advance");
  assert_eq!(in_progress.status, InstanceStatus::InProgress);
  let cancelled = service.cancel_instance(&actor, &in_progress.id).expect("cancel in_progress");
  assert_eq!(cancelled.status, InstanceStatus::Cancelled);
}

#[test]
fn auto_advance_steps_are_consumed_on_entry() {
  let (service, directory) = service_with_directory();
  let actor = creator();
  let id = service.create_definition(&actor,
                                     definition_with(vec![Step::new("radicación"),
                                                          Step::new("registro-automático").auto(),
                                                          Step::new("aprobación")]))
                  .expect("create");
  let target = seed_case_file(&directory, actor.id());
  let instance = service.start_instance(&actor, &id, target).expect("start");

  // una sola aprobación consume también el paso automático intermedio
  let instance = service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("advance");
  assert_eq!(instance.status, InstanceStatus::InProgress);
  assert_eq!(instance.current_step_index, 2);
  assert_eq!(instance.history.len(), 2);
  assert_eq!(instance.history[1].step_index, 1);

  let instance = service.advance_instance(&actor, &instance.id, StepOutcome::Approved).expect("final");
  assert_eq!(instance.status, InstanceStatus::Completed);
}

#[test]
fn start_validates_entity_kind_and_existence() {
  let (service, directory) = service_with_directory();
  let actor = creator();
  let id = service.create_definition(&actor, definition_with(vec![Step::new("revisión")])).expect("create");

  // tipo que no corresponde a la definición
  let document = EntityRef::new(EntityKind::Document, Uuid::new_v4());
  let err = service.start_instance(&actor, &id, document).unwrap_err();
  assert!(matches!(err, WorkflowError::Validation(_)));

  // referencia colgante del tipo correcto
  let dangling = EntityRef::new(EntityKind::CaseFile, Uuid::new_v4());
  let err = service.start_instance(&actor, &id, dangling).unwrap_err();
  assert!(matches!(err, WorkflowError::NotFound(_)));

  let _ = directory;
}

#[test]
fn statistics_count_active_and_completed() {
  let (service, directory) = service_with_directory();
  let actor = creator();
  let id = service.create_definition(&actor,
                                     definition_with(vec![Step::new("revisión"), Step::new("aprobación")]))
                  .expect("create");

  // completada
  let t1 = seed_case_file(&directory, actor.id());
  let i1 = service.start_instance(&actor, &id, t1).expect("start 1");
  service.advance_instance(&actor, &i1.id, StepOutcome::Approved).expect("a");
  service.advance_instance(&actor, &i1.id, StepOutcome::Approved).expect("b");
  // en curso
  let t2 = seed_case_file(&directory, actor.id());
  let i2 = service.start_instance(&actor, &id, t2).expect("start 2");
  service.advance_instance(&actor, &i2.id, StepOutcome::Approved).expect("c");
  // pendiente
  let t3 = seed_case_file(&directory, actor.id());
  service.start_instance(&actor, &id, t3).expect("start 3");
  // cancelada: ni activa ni completada
  let t4 = seed_case_file(&directory, actor.id());
  let i4 = service.start_instance(&actor, &id, t4).expect("start 4");
  service.cancel_instance(&actor, &i4.id).expect("cancel");

  let stats = service.statistics(&id).expect("stats");
  assert_eq!(stats.total, 4);
  assert_eq!(stats.active, 2);
  assert_eq!(stats.completed, 1);
}
