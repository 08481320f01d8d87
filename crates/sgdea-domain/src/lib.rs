mod actor;
mod entity;
mod errors;
mod verification;

pub use actor::{Actor, Capability, Role};
pub use entity::{EntityDirectory, EntityKind, EntityRecord, EntityRef, InMemoryEntityDirectory};
pub use errors::DomainError;
pub use verification::{SessionVerifier, VerificationToken};
