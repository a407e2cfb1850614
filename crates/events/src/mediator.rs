//! Explicit command/query routing.
//!
//! Handlers are registered up front (typically in one composition function at
//! startup) instead of being resolved from a container at runtime. Each
//! message type has at most one handler; registering again replaces it.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::cqrs::{Command, CommandHandler, Query, QueryHandler};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for {0}")]
    NoHandler(&'static str),

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

type Erased = Box<dyn Any + Send + Sync>;

/// Routes commands and queries to their registered handler.
#[derive(Default)]
pub struct Mediator {
    commands: HashMap<TypeId, Erased>,
    queries: HashMap<TypeId, Erased>,
}

impl core::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mediator")
            .field("commands", &self.commands.len())
            .field("queries", &self.queries.len())
            .finish()
    }
}

impl Mediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command<C, H>(&mut self, handler: H) -> &mut Self
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let handler: Arc<dyn CommandHandler<C>> = Arc::new(handler);
        if self.commands.insert(TypeId::of::<C>(), Box::new(handler)).is_some() {
            tracing::debug!(command = type_name::<C>(), "replaced command handler");
        }
        self
    }

    pub fn register_query<Q, H>(&mut self, handler: H) -> &mut Self
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let handler: Arc<dyn QueryHandler<Q>> = Arc::new(handler);
        if self.queries.insert(TypeId::of::<Q>(), Box::new(handler)).is_some() {
            tracing::debug!(query = type_name::<Q>(), "replaced query handler");
        }
        self
    }

    pub fn handles_command<C: Command>(&self) -> bool {
        self.commands.contains_key(&TypeId::of::<C>())
    }

    pub fn handles_query<Q: Query>(&self) -> bool {
        self.queries.contains_key(&TypeId::of::<Q>())
    }

    /// Dispatch a command to its handler.
    pub fn send<C: Command>(&self, command: C) -> Result<C::Output, DispatchError> {
        let handler = self
            .commands
            .get(&TypeId::of::<C>())
            .and_then(|h| h.downcast_ref::<Arc<dyn CommandHandler<C>>>())
            .ok_or(DispatchError::NoHandler(type_name::<C>()))?;

        tracing::debug!(command = type_name::<C>(), "dispatching command");
        handler.handle(command).map_err(|err| {
            tracing::warn!(command = type_name::<C>(), error = %err, "command failed");
            DispatchError::Handler(err)
        })
    }

    /// Dispatch a query to its handler.
    pub fn ask<Q: Query>(&self, query: Q) -> Result<Q::Output, DispatchError> {
        let handler = self
            .queries
            .get(&TypeId::of::<Q>())
            .and_then(|h| h.downcast_ref::<Arc<dyn QueryHandler<Q>>>())
            .ok_or(DispatchError::NoHandler(type_name::<Q>()))?;

        tracing::debug!(query = type_name::<Q>(), "dispatching query");
        handler.handle(query).map_err(DispatchError::Handler)
    }
}
