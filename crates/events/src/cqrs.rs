//! CQRS markers and handler contracts.
//!
//! - **Command**: intent to change state. May be rejected; produces at most a
//!   small acknowledgement (`Output`), usually an id or `()`.
//! - **Query**: request for data. Never changes state.
//!
//! Handlers are plain objects registered on a [`Mediator`](crate::Mediator);
//! application code depends on the message types, not on the handlers or the
//! stores behind them.

/// Marker for state-changing requests.
pub trait Command: core::fmt::Debug + Send + 'static {
    type Output: Send + 'static;
}

/// Marker for read-only requests.
pub trait Query: core::fmt::Debug + Send + 'static {
    type Output: Send + 'static;
}

/// Handles one command type.
///
/// Errors are `anyhow::Error` so handlers can surface whatever their
/// collaborators (repositories, validators, ...) return.
pub trait CommandHandler<C: Command>: Send + Sync {
    fn handle(&self, command: C) -> anyhow::Result<C::Output>;
}

/// Handles one query type.
pub trait QueryHandler<Q: Query>: Send + Sync {
    fn handle(&self, query: Q) -> anyhow::Result<Q::Output>;
}

/// Adapts a closure into a [`CommandHandler`] or [`QueryHandler`].
pub struct HandlerFn<F>(F);

pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn(f)
}

impl<C, F> CommandHandler<C> for HandlerFn<F>
where
    C: Command,
    F: Fn(C) -> anyhow::Result<C::Output> + Send + Sync,
{
    fn handle(&self, command: C) -> anyhow::Result<C::Output> {
        (self.0)(command)
    }
}

impl<Q, F> QueryHandler<Q> for HandlerFn<F>
where
    Q: Query,
    F: Fn(Q) -> anyhow::Result<Q::Output> + Send + Sync,
{
    fn handle(&self, query: Q) -> anyhow::Result<Q::Output> {
        (self.0)(query)
    }
}
