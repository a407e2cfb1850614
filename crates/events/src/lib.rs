//! `repokit-events`: domain events and CQRS messaging.
//!
//! - Domain events recorded by entities ([`DomainEvent`], [`EventRecorder`])
//! - Publication after a successful write ([`DomainEventDispatcher`], [`EventBus`])
//! - CQRS markers and routing ([`Command`], [`Query`], [`Mediator`])

pub mod bus;
pub mod cqrs;
pub mod dispatcher;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod mediator;
pub mod recorder;

pub use bus::{EventBus, Subscription};
pub use cqrs::{Command, CommandHandler, HandlerFn, Query, QueryHandler, handler_fn};
pub use dispatcher::{DomainEventDispatcher, PublishError};
pub use envelope::EventEnvelope;
pub use event::DomainEvent;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use mediator::{DispatchError, Mediator};
pub use recorder::EventRecorder;
