//! `repokit-core`: domain foundation building blocks.
//!
//! Identity, audit and domain-event capabilities plus the shared domain error.
//! No storage or query concerns live here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::{Auditable, AuditInfo, Entity, HasDomainEvents};
pub use error::{DomainError, DomainResult};
pub use id::{EntityId, UserId};
pub use value_object::ValueObject;
