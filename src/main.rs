use serde_json::json;
use sgdea_domain::{Actor, EntityKind, EntityRecord, EntityRef, InMemoryEntityDirectory, Role};
use sgdea_workflow::{HookRunner, IndexMode, InMemoryIndex, InMemoryWorkQueue, InMemoryWorkflowRepository,
                     MemoryAuditSink, MemoryNotifier, NewDefinition, Step, StepOutcome, WorkflowService};
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use uuid::Uuid;

/// Pequeño menú interactivo para administrar definiciones e instancias de
/// workflow usando el wiring en memoria del crate `sgdea-workflow`.
///
/// Opciones soportadas:
/// 1) Ver definiciones
/// 2) Crear definición
/// 3) Activar/desactivar definición
/// 4) Iniciar instancia sobre una entidad de prueba
/// 5) Avanzar instancia (aprobar/rechazar)
/// 6) Cancelar instancia
/// 7) Estadísticas de una definición
/// 8) Salir
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let repo = Arc::new(InMemoryWorkflowRepository::new());
    let directory = Arc::new(InMemoryEntityDirectory::new());
    let index = Arc::new(InMemoryIndex::new());
    let hooks = HookRunner::new(Arc::new(MemoryAuditSink::new()),
                                index,
                                Arc::new(MemoryNotifier::new()),
                                Arc::new(InMemoryWorkQueue::new()),
                                IndexMode::Synchronous);
    let service = WorkflowService::new(repo, directory.clone(), hooks);

    // Actor fijo de la demo: mesa de control con rol de máximo privilegio.
    let actor = Actor::new(Uuid::new_v4(), "mesa-de-control").with_role(Role::SuperAdmin);

    loop {
        println!("\n== SGDEA workflow menu ==");
        println!("1) Ver definiciones");
        println!("2) Crear definición");
        println!("3) Activar/desactivar definición");
        println!("4) Iniciar instancia");
        println!("5) Avanzar instancia");
        println!("6) Cancelar instancia");
        println!("7) Estadísticas de una definición");
        println!("8) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        match choice.trim() {
            "1" => match service.list_definitions(&actor) {
                Ok(definitions) => {
                    println!("\nID                                   | ACTIVA | PASOS | NOMBRE");
                    println!("---------------------------------------------------------------");
                    for d in definitions {
                        println!("{} | {}     | {}     | {}",
                                 d.id,
                                 if d.active { "sí" } else { "no" },
                                 d.steps.len(),
                                 d.name);
                    }
                }
                Err(e) => eprintln!("Error listando definiciones: {}", e),
            },
            "2" => {
                let name = prompt("Nombre: ")?;
                let steps_s = prompt("Cantidad de pasos: ")?;
                let count: usize = match steps_s.trim().parse() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        eprintln!("Cantidad inválida");
                        continue;
                    }
                };
                let steps = (1..=count).map(|i| Step::new(&format!("paso-{}", i))).collect();
                let input = NewDefinition { name: name.trim().to_string(),
                                            description: String::new(),
                                            entity_kind: EntityKind::Document,
                                            steps,
                                            configuration: Default::default() };
                match service.create_definition(&actor, input) {
                    Ok(id) => println!("Definición creada: {}", id),
                    Err(e) => eprintln!("Error creando definición: {}", e),
                }
            }
            "3" => {
                let id = match prompt_uuid("Id de definición: ")? {
                    Some(id) => id,
                    None => continue,
                };
                let onoff = prompt("¿Activar (a) o desactivar (d)?: ")?;
                let result = match onoff.trim() {
                    "a" => service.activate_definition(&actor, &id),
                    "d" => service.deactivate_definition(&actor, &id),
                    _ => {
                        eprintln!("Opción inválida");
                        continue;
                    }
                };
                match result {
                    Ok(d) => println!("Definición {} activa={}", d.id, d.active),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            "4" => {
                let id = match prompt_uuid("Id de definición: ")? {
                    Some(id) => id,
                    None => continue,
                };
                // Entidad de prueba registrada al vuelo en el directorio.
                let target = EntityRef::new(EntityKind::Document, Uuid::new_v4());
                directory.put(EntityRecord { reference: target,
                                             title: format!("documento-{}", target.id),
                                             owner_id: actor.id(),
                                             body: json!({"origen": "demo"}) })?;
                match service.start_instance(&actor, &id, target) {
                    Ok(i) => println!("Instancia {} iniciada sobre {} (estado {})", i.id, i.target, i.status),
                    Err(e) => eprintln!("Error iniciando instancia: {}", e),
                }
            }
            "5" => {
                let id = match prompt_uuid("Id de instancia: ")? {
                    Some(id) => id,
                    None => continue,
                };
                let decision = prompt("¿Aprobar (a) o rechazar (r)?: ")?;
                let outcome = match decision.trim() {
                    "a" => StepOutcome::Approved,
                    "r" => StepOutcome::Rejected,
                    _ => {
                        eprintln!("Opción inválida");
                        continue;
                    }
                };
                match service.advance_instance(&actor, &id, outcome) {
                    Ok(i) => println!("Instancia {}: estado {}, paso {}", i.id, i.status, i.current_step_index),
                    Err(e) => eprintln!("Error avanzando instancia: {}", e),
                }
            }
            "6" => {
                let id = match prompt_uuid("Id de instancia: ")? {
                    Some(id) => id,
                    None => continue,
                };
                match service.cancel_instance(&actor, &id) {
                    Ok(i) => println!("Instancia {} cancelada", i.id),
                    Err(e) => eprintln!("Error cancelando instancia: {}", e),
                }
            }
            "7" => {
                let id = match prompt_uuid("Id de definición: ")? {
                    Some(id) => id,
                    None => continue,
                };
                match service.statistics(&id) {
                    Ok(s) => println!("total={} activas={} completadas={}", s.total, s.active, s.completed),
                    Err(e) => eprintln!("Error consultando estadísticas: {}", e),
                }
            }
            "8" => break,
            other => eprintln!("Opción desconocida: {}", other),
        }
    }

    Ok(())
}

fn prompt(message: &str) -> Result<String, io::Error> {
    print!("{}", message);
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

fn prompt_uuid(message: &str) -> Result<Option<Uuid>, io::Error> {
    let raw = prompt(message)?;
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Ok(Some(id)),
        Err(_) => {
            eprintln!("UUID inválido");
            Ok(None)
        }
    }
}
