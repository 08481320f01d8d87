// actor.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Roles del sistema, de mayor a menor privilegio.
///
/// `SuperAdmin` es el rol de máximo privilegio: salta todos los chequeos
/// de propiedad. El "nivel administrador" (admin-tier) agrupa `SuperAdmin`
/// y `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  SuperAdmin,
  Admin,
  Gestor,
  Consulta,
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Role::SuperAdmin => "super_admin",
      Role::Admin => "admin",
      Role::Gestor => "gestor",
      Role::Consulta => "consulta",
    };
    write!(f, "{}", s)
  }
}

impl FromStr for Role {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
      "admin" => Ok(Role::Admin),
      "gestor" => Ok(Role::Gestor),
      "consulta" => Ok(Role::Consulta),
      _ => Err(()),
    }
  }
}

/// Capacidades explícitas, independientes del rol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
  /// Permite crear definiciones de workflow sin ser admin-tier.
  CreateDefinitions,
  /// Permite la eliminación permanente (irreversible) de definiciones.
  HardDelete,
}

/// Identidad resuelta del actor que invoca una operación.
///
/// El núcleo recibe el actor ya autenticado con sus roles y capacidades;
/// la verificación de credenciales ocurre fuera de este crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
  id: Uuid,
  name: String,
  roles: Vec<Role>,
  capabilities: Vec<Capability>,
}

impl Actor {
  pub fn new(id: Uuid, name: &str) -> Self {
    Self { id, name: name.to_string(), roles: Vec::new(), capabilities: Vec::new() }
  }

  pub fn with_role(mut self, role: Role) -> Self {
    if !self.roles.contains(&role) {
      self.roles.push(role);
    }
    self
  }

  pub fn with_capability(mut self, capability: Capability) -> Self {
    if !self.capabilities.contains(&capability) {
      self.capabilities.push(capability);
    }
    self
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn has_role(&self, role: Role) -> bool {
    self.roles.contains(&role)
  }

  pub fn has_capability(&self, capability: Capability) -> bool {
    self.capabilities.contains(&capability)
  }

  /// Rol de máximo privilegio: salta todo chequeo posterior.
  pub fn is_super_admin(&self) -> bool {
    self.has_role(Role::SuperAdmin)
  }

  /// Nivel administrador: `SuperAdmin` o `Admin`.
  pub fn is_admin_tier(&self) -> bool {
    self.has_role(Role::SuperAdmin) || self.has_role(Role::Admin)
  }
}
