//! Crate `sgdea-workflow` — motor de flujos de aprobación del SGDEA
//!
//! Este crate define los tipos de dominio del workflow (`WorkflowDefinition`,
//! `WorkflowInstance`), el contrato de persistencia `WorkflowRepository` con
//! una implementación en memoria útil para pruebas, la puerta de autorización
//! `AuthorizationGate` (reglas ordenadas con motivo de denegación) y la capa
//! orquestadora `WorkflowService` que ejecuta los efectos post-commit
//! (auditoría, indexación, notificaciones).
//!
//! Diseño resumido:
//! - Cada mutación devuelve sus efectos pendientes (`SideEffect`) en lugar de
//!   dispararlos dentro de la operación: el servicio los ejecuta sólo después
//!   de confirmar la escritura, y un fallo de hook jamás revierte la mutación.
//! - Locking optimista: las mutaciones de instancia usan `expected_version`
//!   para detectar conflictos (`PersistResult::Conflict`).
//! - La lectura del flag `active` y la creación de la instancia ocurren como
//!   una sola unidad atómica en el repositorio (`create_instance_if_active`).
//!
//! Ejemplo rápido:
//! ```rust
//! use sgdea_workflow::stubs::InMemoryWorkflowRepository;
//! use std::sync::Arc;
//! let repo = Arc::new(InMemoryWorkflowRepository::new());
//! ```
pub mod definitions;
pub mod domain;
pub mod errors;
pub mod gate;
pub mod hooks;
pub mod instances;
pub mod repository;
pub mod service;
pub mod stubs;

pub use definitions::*;
pub use domain::*;
pub use errors::*;
pub use gate::*;
pub use hooks::*;
pub use instances::*;
pub use repository::*;
pub use service::*;
pub use stubs::*;
