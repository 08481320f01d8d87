// entity.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Tipos de entidad gobernados por el SGDEA.
///
/// Cada instancia de workflow apunta a exactamente una entidad de uno
/// de estos tipos. El despacho por tipo se hace siempre sobre este enum
/// (unión etiquetada), nunca por resolución dinámica de clases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Document,
  CaseFile,
  Contract,
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      EntityKind::Document => "document",
      EntityKind::CaseFile => "case_file",
      EntityKind::Contract => "contract",
    };
    write!(f, "{}", s)
  }
}

impl FromStr for EntityKind {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "document" | "documento" => Ok(EntityKind::Document),
      "case_file" | "expediente" => Ok(EntityKind::CaseFile),
      "contract" | "contrato" => Ok(EntityKind::Contract),
      other => Err(DomainError::ValidationError(format!("tipo de entidad desconocido: {}", other))),
    }
  }
}

/// Referencia polimórfica débil a una entidad gobernada: (tipo, id).
/// El núcleo del workflow no es dueño del ciclo de vida de la entidad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
  pub kind: EntityKind,
  pub id: Uuid,
}

impl EntityRef {
  pub fn new(kind: EntityKind, id: Uuid) -> Self {
    Self { kind, id }
  }
}

impl fmt::Display for EntityRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.id)
  }
}

/// Vista mínima de una entidad gobernada, suficiente para el workflow:
/// título para mensajes, dueño para notificaciones y cuerpo para indexar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
  pub reference: EntityRef,
  pub title: String,
  pub owner_id: Uuid,
  pub body: JsonValue,
}

/// Contrato de acceso a entidades por tipo: consultar y notificar al dueño.
/// Las implementaciones concretas (BD documental, servicio de expedientes)
/// viven fuera de este crate.
pub trait EntityDirectory: Send + Sync {
  /// Busca la entidad referida. `Ok(None)` significa que la referencia ya
  /// no apunta a nada (la entidad fue eliminada por su propio ciclo de vida).
  fn fetch(&self, reference: &EntityRef) -> Result<Option<EntityRecord>, DomainError>;

  /// Envía un mensaje al dueño de la entidad. Entrega delegada al
  /// colaborador; este método no reintenta.
  fn notify_owner(&self, reference: &EntityRef, message: &str) -> Result<(), DomainError>;
}

// Directorio en memoria para pruebas y wiring rápido (no durable).
pub struct InMemoryEntityDirectory {
  entities: Mutex<HashMap<EntityRef, EntityRecord>>,
  /// Mensajes enviados: (dueño, mensaje). Sólo para inspección en tests.
  outbox: Mutex<Vec<(Uuid, String)>>,
}

impl InMemoryEntityDirectory {
  pub fn new() -> Self {
    Self { entities: Mutex::new(HashMap::new()),
           outbox: Mutex::new(Vec::new()) }
  }

  fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> Result<MutexGuard<'a, T>, DomainError> {
    m.lock().map_err(|e| DomainError::StorageError(format!("mutex poisoned: {:?}", e)))
  }

  /// Registra (o reemplaza) una entidad en el directorio.
  pub fn put(&self, record: EntityRecord) -> Result<(), DomainError> {
    self.lock(&self.entities)?.insert(record.reference, record);
    Ok(())
  }

  /// Elimina la entidad del directorio, si existe.
  pub fn remove(&self, reference: &EntityRef) -> Result<(), DomainError> {
    self.lock(&self.entities)?.remove(reference);
    Ok(())
  }

  /// Copia de los mensajes enviados hasta ahora.
  pub fn sent_messages(&self) -> Result<Vec<(Uuid, String)>, DomainError> {
    Ok(self.lock(&self.outbox)?.clone())
  }
}

impl Default for InMemoryEntityDirectory {
  fn default() -> Self {
    Self::new()
  }
}

impl EntityDirectory for InMemoryEntityDirectory {
  fn fetch(&self, reference: &EntityRef) -> Result<Option<EntityRecord>, DomainError> {
    Ok(self.lock(&self.entities)?.get(reference).cloned())
  }

  fn notify_owner(&self, reference: &EntityRef, message: &str) -> Result<(), DomainError> {
    let owner = {
      let entities = self.lock(&self.entities)?;
      entities.get(reference)
              .map(|r| r.owner_id)
              .ok_or(DomainError::NotFound(format!("entidad {}", reference)))?
    };
    self.lock(&self.outbox)?.push((owner, message.to_string()));
    Ok(())
  }
}
