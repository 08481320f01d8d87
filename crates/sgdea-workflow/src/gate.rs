// Archivo: gate.rs
// Propósito: puerta de autorización única del núcleo. Evalúa reglas
// ordenadas sobre (actor, acción) y devuelve permiso o denegación con
// motivo legible. Centraliza el bypass de administrador y los textos de
// denegación: ninguna otra capa duplica estos chequeos.
use crate::domain::{Step, WorkflowDefinition};
use crate::errors::{Result, WorkflowError};
use sgdea_domain::{Actor, Capability};

/// Acción a autorizar, con el contexto mínimo que las reglas necesitan.
#[derive(Debug)]
pub enum GateAction<'a> {
    /// Consultar una definición.
    ViewDefinition { definition: &'a WorkflowDefinition },
    /// Crear una definición nueva.
    CreateDefinition,
    /// Modificar campos de una definición existente.
    UpdateDefinition { definition: &'a WorkflowDefinition },
    /// Eliminar una definición; `permanent` distingue el borrado físico.
    DeleteDefinition { permanent: bool },
    /// Restaurar una definición borrada lógicamente.
    RestoreDefinition,
    /// Iniciar una instancia de la definición.
    StartInstance { definition: &'a WorkflowDefinition },
    /// Decidir el paso actual de una instancia.
    AdvanceInstance { definition: &'a WorkflowDefinition, step: &'a Step },
    /// Cancelar una instancia no terminal.
    CancelInstance { definition: &'a WorkflowDefinition },
}

/// Veredicto de la puerta. Toda denegación lleva un motivo distinto por
/// regla, destinado a mensajes de cara al usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    fn deny(reason: impl Into<String>) -> Self {
        Decision::Deny { reason: reason.into() }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Evaluación de políticas sin estado: reglas en orden, gana la primera
/// que aplica.
pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Evalúa la acción para el actor. Regla 0: el rol de máximo
    /// privilegio salta todos los chequeos posteriores.
    pub fn evaluate(actor: &Actor, action: &GateAction<'_>) -> Decision {
        if actor.is_super_admin() {
            return Decision::Allow;
        }

        match action {
            GateAction::ViewDefinition { definition } => {
                let is_creator = definition.created_by == actor.id();
                if definition.active || is_creator || actor.is_admin_tier() {
                    Decision::Allow
                } else {
                    Decision::deny("la definición está inactiva y sólo su creador o un administrador puede consultarla")
                }
            }
            GateAction::CreateDefinition => {
                if actor.is_admin_tier() || actor.has_capability(Capability::CreateDefinitions) {
                    Decision::Allow
                } else {
                    Decision::deny("se requiere nivel administrador o el permiso de creación de definiciones")
                }
            }
            GateAction::UpdateDefinition { definition } => {
                let is_creator = definition.created_by == actor.id();
                if is_creator || actor.is_admin_tier() {
                    Decision::Allow
                } else {
                    Decision::deny("sólo el creador o un administrador puede modificar la definición")
                }
            }
            GateAction::DeleteDefinition { permanent } => {
                if !actor.is_admin_tier() {
                    return Decision::deny("sólo un administrador puede eliminar definiciones");
                }
                if *permanent && !actor.has_capability(Capability::HardDelete) {
                    return Decision::deny("la eliminación permanente requiere el permiso de borrado definitivo");
                }
                Decision::Allow
            }
            GateAction::RestoreDefinition => {
                if actor.is_admin_tier() {
                    Decision::Allow
                } else {
                    Decision::deny("sólo un administrador puede restaurar definiciones")
                }
            }
            GateAction::StartInstance { definition } => {
                if definition.active {
                    Decision::Allow
                } else {
                    Decision::deny("la definición está inactiva: no admite nuevas instancias")
                }
            }
            GateAction::AdvanceInstance { definition, step } => {
                let is_creator = definition.created_by == actor.id();
                if !is_creator && !actor.is_admin_tier() {
                    return Decision::deny("sólo el creador o un administrador puede avanzar la instancia");
                }
                if let Some(role) = step.required_role {
                    if !actor.is_admin_tier() && !actor.has_role(role) {
                        return Decision::deny(format!("el paso '{}' requiere el rol {}", step.name, role));
                    }
                }
                Decision::Allow
            }
            GateAction::CancelInstance { definition } => {
                let is_creator = definition.created_by == actor.id();
                if is_creator || actor.is_admin_tier() {
                    Decision::Allow
                } else {
                    Decision::deny("sólo el creador o un administrador puede cancelar la instancia")
                }
            }
        }
    }

    /// Igual que `evaluate`, pero mapea la denegación a
    /// `WorkflowError::Authorization` con el motivo de la regla.
    pub fn authorize(actor: &Actor, action: &GateAction<'_>) -> Result<()> {
        match Self::evaluate(actor, action) {
            Decision::Allow => Ok(()),
            Decision::Deny { reason } => Err(WorkflowError::Authorization(reason)),
        }
    }
}
