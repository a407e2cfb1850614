//! Unit of work: stage aggregate writes, apply them together, then publish.
//!
//! ```text
//! register_* → commit: apply every staged write in order → dispatch events of written aggregates
//! ```
//!
//! Writes are applied in registration order and stop at the first failure.
//! The failing change and everything after it stay staged; writes already
//! applied are not undone (the in-memory and document stores have no
//! transactions to roll back).
//!
//! Events are published only after all staged writes succeeded. An aggregate
//! leaves the unit of work once its events are published, so a publish failure
//! keeps the unpublished aggregates (and their pending events) around and the
//! next `commit` retries them.

use serde::Serialize;
use serde_json::Value as JsonValue;

use repokit_core::{AggregateRoot, ExpectedVersion};
use repokit_events::{DomainEvent, DomainEventDispatcher, EventBus, EventEnvelope};

use crate::error::{RepositoryError, UnitOfWorkError};
use crate::repository::Repository;

pub trait UnitOfWork {
    /// True while staged writes or unpublished events remain.
    fn has_changes(&self) -> bool;

    /// Apply staged writes, then publish their events. Returns the published envelopes.
    fn commit(&mut self) -> Result<Vec<EventEnvelope<JsonValue>>, UnitOfWorkError>;

    /// Discard staged writes that have not been applied yet.
    fn rollback(&mut self);
}

#[derive(Debug)]
enum Change<T> {
    Add(T),
    Update(T),
    Remove(T),
}

/// [`UnitOfWork`] over one [`Repository`] and one event bus.
pub struct RepositoryUnitOfWork<T, R, B> {
    repository: R,
    dispatcher: DomainEventDispatcher<B>,
    staged: Vec<Change<T>>,
    written: Vec<T>,
}

impl<T, R, B> core::fmt::Debug for RepositoryUnitOfWork<T, R, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RepositoryUnitOfWork")
            .field("staged", &self.staged.len())
            .field("unpublished", &self.written.len())
            .finish_non_exhaustive()
    }
}

impl<T, R, B> RepositoryUnitOfWork<T, R, B> {
    pub fn new(repository: R, dispatcher: DomainEventDispatcher<B>) -> Self {
        Self {
            repository,
            dispatcher,
            staged: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn register_new(&mut self, aggregate: T) {
        self.staged.push(Change::Add(aggregate));
    }

    pub fn register_dirty(&mut self, aggregate: T) {
        self.staged.push(Change::Update(aggregate));
    }

    /// Stage a removal guarded by the aggregate's current version. Events it
    /// recorded (e.g. a deletion event) are published once it is gone.
    pub fn register_removed(&mut self, aggregate: T) {
        self.staged.push(Change::Remove(aggregate));
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Written aggregates whose events have not been published yet.
    pub fn unpublished_len(&self) -> usize {
        self.written.len()
    }
}

impl<T, R, B> RepositoryUnitOfWork<T, R, B>
where
    T: AggregateRoot,
    R: Repository<T>,
{
    fn apply(&self, change: &mut Change<T>) -> Result<(), RepositoryError> {
        match change {
            Change::Add(aggregate) => self.repository.add(aggregate),
            Change::Update(aggregate) => self.repository.update(aggregate),
            Change::Remove(aggregate) => self
                .repository
                .remove(aggregate.id(), ExpectedVersion::Exact(aggregate.version())),
        }
    }

    fn apply_staged(&mut self) -> Result<(), UnitOfWorkError> {
        let mut pending = std::mem::take(&mut self.staged).into_iter();

        while let Some(mut change) = pending.next() {
            if let Err(err) = self.apply(&mut change) {
                tracing::warn!(
                    aggregate_type = T::aggregate_type(),
                    error = %err,
                    "staged write failed; remaining changes kept"
                );
                self.staged.push(change);
                self.staged.extend(pending);
                return Err(err.into());
            }

            let (Change::Add(aggregate) | Change::Update(aggregate) | Change::Remove(aggregate)) = change;
            self.written.push(aggregate);
        }

        Ok(())
    }
}

impl<T, R, B> UnitOfWork for RepositoryUnitOfWork<T, R, B>
where
    T: AggregateRoot,
    T::Event: DomainEvent + Serialize,
    R: Repository<T>,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn has_changes(&self) -> bool {
        !self.staged.is_empty() || !self.written.is_empty()
    }

    fn commit(&mut self) -> Result<Vec<EventEnvelope<JsonValue>>, UnitOfWorkError> {
        let writes = self.staged.len();
        self.apply_staged()?;

        let mut published = Vec::new();
        let mut done = 0;
        let mut failure = None;
        for aggregate in self.written.iter_mut() {
            match self.dispatcher.dispatch(aggregate) {
                Ok(envelopes) => {
                    published.extend(envelopes);
                    done += 1;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.written.drain(..done);

        if let Some(err) = failure {
            return Err(err.into());
        }

        tracing::debug!(
            aggregate_type = T::aggregate_type(),
            writes,
            events = published.len(),
            "unit of work committed"
        );
        Ok(published)
    }

    fn rollback(&mut self) {
        if !self.staged.is_empty() {
            tracing::debug!(
                aggregate_type = T::aggregate_type(),
                discarded = self.staged.len(),
                "unit of work rolled back"
            );
        }
        self.staged.clear();
    }
}
