use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use repokit_core::{AggregateRoot, ExpectedVersion};
use repokit_specification::{PagedSpecification, Specification};

use super::{QueryRepository, Repository};
use crate::error::RepositoryError;

/// In-memory repository for tests/dev.
///
/// - Aggregates are keyed by id, so unordered queries return them in id order
/// - Stored copies never carry pending events
/// - Every query is evaluated in memory, opaque predicates included
#[derive(Debug)]
pub struct InMemoryRepository<T: AggregateRoot> {
    inner: RwLock<BTreeMap<T::Id, T>>,
}

impl<T: AggregateRoot> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored aggregates.
    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<T::Id, T>>, RepositoryError> {
        self.inner
            .read()
            .map_err(|_| RepositoryError::backend("in-memory repository lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<T::Id, T>>, RepositoryError> {
        self.inner
            .write()
            .map_err(|_| RepositoryError::backend("in-memory repository lock poisoned"))
    }
}

impl<T: AggregateRoot> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn stored_copy<T: AggregateRoot + Clone>(aggregate: &T) -> T {
    let mut copy = aggregate.clone();
    copy.clear_events();
    copy
}

impl<T> Repository<T> for InMemoryRepository<T>
where
    T: AggregateRoot + Clone + Send + Sync,
    T::Id: Send + Sync,
{
    fn get(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        Ok(self.read()?.get(id).cloned())
    }

    fn add(&self, aggregate: &mut T) -> Result<(), RepositoryError> {
        let mut map = self.write()?;
        if map.contains_key(aggregate.id()) {
            return Err(RepositoryError::Duplicate {
                aggregate_type: T::aggregate_type(),
                id: aggregate.id().to_string(),
            });
        }

        aggregate.set_version(1);
        map.insert(aggregate.id().clone(), stored_copy(aggregate));
        tracing::debug!(aggregate_type = T::aggregate_type(), id = %aggregate.id(), "aggregate added");
        Ok(())
    }

    fn update(&self, aggregate: &mut T) -> Result<(), RepositoryError> {
        let mut map = self.write()?;
        let stored = map.get(aggregate.id()).ok_or_else(|| RepositoryError::NotFound {
            aggregate_type: T::aggregate_type(),
            id: aggregate.id().to_string(),
        })?;

        ExpectedVersion::Exact(aggregate.version()).check(stored.version())?;

        aggregate.set_version(stored.version() + 1);
        map.insert(aggregate.id().clone(), stored_copy(aggregate));
        tracing::debug!(
            aggregate_type = T::aggregate_type(),
            id = %aggregate.id(),
            version = aggregate.version(),
            "aggregate updated"
        );
        Ok(())
    }

    fn remove(&self, id: &T::Id, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut map = self.write()?;
        let stored = map.get(id).ok_or_else(|| RepositoryError::NotFound {
            aggregate_type: T::aggregate_type(),
            id: id.to_string(),
        })?;

        expected.check(stored.version())?;
        map.remove(id);
        tracing::debug!(aggregate_type = T::aggregate_type(), id = %id, "aggregate removed");
        Ok(())
    }

    fn find(&self, specification: &Specification<T>) -> Result<Vec<T>, RepositoryError> {
        let map = self.read()?;
        let found = specification.select_refs(map.values())?;
        tracing::debug!(
            aggregate_type = T::aggregate_type(),
            specification = %specification,
            matched = found.len(),
            "in-memory query"
        );
        Ok(found.into_iter().cloned().collect())
    }

    fn find_paged(&self, specification: &PagedSpecification<T>) -> Result<Vec<T>, RepositoryError> {
        let matching = Repository::find(self, specification.specification())?;
        Ok(specification.window(matching)?)
    }

    fn count(&self, specification: &Specification<T>) -> Result<u64, RepositoryError> {
        let map = self.read()?;
        let mut n = 0u64;
        for aggregate in map.values() {
            if specification.is_satisfied_by(aggregate)? {
                n += 1;
            }
        }
        Ok(n)
    }
}

#[async_trait]
impl<T> QueryRepository<T> for InMemoryRepository<T>
where
    T: AggregateRoot + Clone + Send + Sync + 'static,
    T::Id: Send + Sync,
{
    async fn find(&self, specification: &Specification<T>) -> Result<Vec<T>, RepositoryError> {
        Repository::find(self, specification)
    }

    async fn find_paged(&self, specification: &PagedSpecification<T>) -> Result<Vec<T>, RepositoryError> {
        Repository::find_paged(self, specification)
    }

    async fn count(&self, specification: &Specification<T>) -> Result<u64, RepositoryError> {
        Repository::count(self, specification)
    }
}
