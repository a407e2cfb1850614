//! Repository boundary: execute specifications against a backing store.
//!
//! Two contracts:
//!
//! - [`Repository`]: synchronous write + read access to whole aggregates
//!   (in-memory and document adapters).
//! - [`QueryRepository`]: async, read-only specification execution. This is
//!   the read side of CQRS and the only surface the Postgres adapter offers.
//!
//! The contracts say nothing about execution strategy. An adapter may filter
//! in memory or translate the specification into its native query language;
//! callers only see matching aggregates in a deterministic order.

pub mod document;
pub mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;

use repokit_core::{AggregateRoot, ExpectedVersion};
use repokit_specification::{PagedSpecification, Specification};

use crate::error::RepositoryError;

pub use document::{DocumentRepository, DocumentStore};
pub use in_memory::InMemoryRepository;

/// Aggregate repository.
///
/// Writes take the aggregate by `&mut` so the repository can stamp the new
/// version on the caller's instance; pending domain events stay on that
/// instance for the dispatcher and are never stored.
pub trait Repository<T: AggregateRoot>: Send + Sync {
    fn get(&self, id: &T::Id) -> Result<Option<T>, RepositoryError>;

    /// Insert a new aggregate. Fails with `Duplicate` if the id is taken.
    fn add(&self, aggregate: &mut T) -> Result<(), RepositoryError>;

    /// Replace a stored aggregate. The caller's `version()` must equal the
    /// stored version, otherwise `Concurrency`.
    fn update(&self, aggregate: &mut T) -> Result<(), RepositoryError>;

    fn remove(&self, id: &T::Id, expected: ExpectedVersion) -> Result<(), RepositoryError>;

    fn find(&self, specification: &Specification<T>) -> Result<Vec<T>, RepositoryError>;

    fn find_paged(&self, specification: &PagedSpecification<T>) -> Result<Vec<T>, RepositoryError>;

    fn count(&self, specification: &Specification<T>) -> Result<u64, RepositoryError>;

    fn exists(&self, specification: &Specification<T>) -> Result<bool, RepositoryError> {
        Ok(self.count(specification)? > 0)
    }

    /// `get` that treats a missing aggregate as an error.
    fn load(&self, id: &T::Id) -> Result<T, RepositoryError>
    where
        T: Sized,
    {
        self.get(id)?.ok_or_else(|| RepositoryError::NotFound {
            aggregate_type: T::aggregate_type(),
            id: id.to_string(),
        })
    }
}

impl<T, R> Repository<T> for Arc<R>
where
    T: AggregateRoot,
    R: Repository<T> + ?Sized,
{
    fn get(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        (**self).get(id)
    }

    fn add(&self, aggregate: &mut T) -> Result<(), RepositoryError> {
        (**self).add(aggregate)
    }

    fn update(&self, aggregate: &mut T) -> Result<(), RepositoryError> {
        (**self).update(aggregate)
    }

    fn remove(&self, id: &T::Id, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        (**self).remove(id, expected)
    }

    fn find(&self, specification: &Specification<T>) -> Result<Vec<T>, RepositoryError> {
        (**self).find(specification)
    }

    fn find_paged(&self, specification: &PagedSpecification<T>) -> Result<Vec<T>, RepositoryError> {
        (**self).find_paged(specification)
    }

    fn count(&self, specification: &Specification<T>) -> Result<u64, RepositoryError> {
        (**self).count(specification)
    }
}

/// Async, read-only specification execution.
#[async_trait]
pub trait QueryRepository<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn find(&self, specification: &Specification<T>) -> Result<Vec<T>, RepositoryError>;

    async fn find_paged(&self, specification: &PagedSpecification<T>) -> Result<Vec<T>, RepositoryError>;

    async fn count(&self, specification: &Specification<T>) -> Result<u64, RepositoryError>;

    async fn exists(&self, specification: &Specification<T>) -> Result<bool, RepositoryError> {
        Ok(self.count(specification).await? > 0)
    }
}
