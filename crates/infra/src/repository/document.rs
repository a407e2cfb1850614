//! JSON document repository.
//!
//! Aggregates are serialized into named collections of JSON documents. A
//! specification whose leaves are all structural is executed against the
//! stored documents as a [`Filter`], so only matching documents are
//! deserialized. Anything with an opaque predicate falls back to decoding every
//! document in the collection and evaluating the closure on the typed value.
//!
//! Filter field names are document paths: they must match the aggregate's
//! serde field names (dotted for nested objects).

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use repokit_core::{AggregateRoot, ExpectedVersion};
use repokit_specification::{Filter, PagedSpecification, Specification};

use super::Repository;
use crate::error::RepositoryError;

/// One stored document plus the aggregate version it was written at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub version: u64,
    pub body: JsonValue,
}

type Collection = BTreeMap<String, StoredDocument>;

/// Schemaless collection store shared by every [`DocumentRepository`].
#[derive(Debug, Default)]
pub struct DocumentStore {
    collections: RwLock<BTreeMap<String, Collection>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Bodies of every document in `collection`, in id order.
    pub fn documents(&self, collection: &str) -> Vec<JsonValue> {
        self.read(collection, |docs| docs.values().map(|d| d.body.clone()).collect())
            .unwrap_or_default()
    }

    fn read<R>(&self, collection: &str, f: impl FnOnce(&Collection) -> R) -> Result<R, RepositoryError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| RepositoryError::backend("document store lock poisoned"))?;
        match collections.get(collection) {
            Some(docs) => Ok(f(docs)),
            None => Ok(f(&Collection::new())),
        }
    }

    fn write<R>(&self, collection: &str, f: impl FnOnce(&mut Collection) -> R) -> Result<R, RepositoryError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| RepositoryError::backend("document store lock poisoned"))?;
        Ok(f(collections.entry(collection.to_string()).or_default()))
    }
}

/// Repository that stores `T` as JSON in the collection named by
/// [`AggregateRoot::aggregate_type`].
pub struct DocumentRepository<T> {
    store: Arc<DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<T> core::fmt::Debug for DocumentRepository<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentRepository").field("store", &self.store).finish()
    }
}

impl<T> DocumentRepository<T> {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }
}

impl<T> DocumentRepository<T>
where
    T: AggregateRoot + Serialize + DeserializeOwned,
{
    fn decode(doc: &StoredDocument) -> Result<T, RepositoryError> {
        let mut aggregate: T = serde_json::from_value(doc.body.clone())?;
        aggregate.set_version(doc.version);
        Ok(aggregate)
    }

    /// Serialize `aggregate` at `version`, leaving its version untouched on failure.
    fn encode(aggregate: &mut T, version: u64) -> Result<JsonValue, RepositoryError> {
        let previous = aggregate.version();
        aggregate.set_version(version);
        serde_json::to_value(&*aggregate).map_err(|err| {
            aggregate.set_version(previous);
            RepositoryError::from(err)
        })
    }

    fn matching_documents(&self, filter: &Filter) -> Result<Vec<StoredDocument>, RepositoryError> {
        self.store.read(T::aggregate_type(), |docs| {
            let mut out = Vec::new();
            for doc in docs.values() {
                if filter.evaluate(&doc.body)? {
                    out.push(doc.clone());
                }
            }
            Ok::<_, RepositoryError>(out)
        })?
    }

    fn all_documents(&self) -> Result<Vec<StoredDocument>, RepositoryError> {
        self.store.read(T::aggregate_type(), |docs| docs.values().cloned().collect())
    }
}

impl<T> Repository<T> for DocumentRepository<T>
where
    T: AggregateRoot + Serialize + DeserializeOwned,
{
    fn get(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        let key = id.to_string();
        let doc = self.store.read(T::aggregate_type(), |docs| docs.get(&key).cloned())?;
        doc.as_ref().map(Self::decode).transpose()
    }

    fn add(&self, aggregate: &mut T) -> Result<(), RepositoryError> {
        let key = aggregate.id().to_string();
        let previous = aggregate.version();
        let body = Self::encode(aggregate, 1)?;

        let inserted = self.store.write(T::aggregate_type(), |docs| {
            if docs.contains_key(&key) {
                return false;
            }
            docs.insert(key.clone(), StoredDocument { version: 1, body });
            true
        })?;

        if !inserted {
            aggregate.set_version(previous);
            return Err(RepositoryError::Duplicate {
                aggregate_type: T::aggregate_type(),
                id: key,
            });
        }

        tracing::debug!(collection = T::aggregate_type(), id = %key, "document inserted");
        Ok(())
    }

    fn update(&self, aggregate: &mut T) -> Result<(), RepositoryError> {
        let key = aggregate.id().to_string();
        let expected = aggregate.version();
        let body = Self::encode(aggregate, expected + 1)?;

        let outcome = self.store.write(T::aggregate_type(), |docs| -> Result<(), RepositoryError> {
            let doc = docs.get_mut(&key).ok_or_else(|| RepositoryError::NotFound {
                aggregate_type: T::aggregate_type(),
                id: key.clone(),
            })?;
            ExpectedVersion::Exact(expected).check(doc.version)?;
            *doc = StoredDocument {
                version: expected + 1,
                body,
            };
            Ok(())
        })?;

        if let Err(err) = outcome {
            aggregate.set_version(expected);
            return Err(err);
        }

        tracing::debug!(
            collection = T::aggregate_type(),
            id = %key,
            version = expected + 1,
            "document replaced"
        );
        Ok(())
    }

    fn remove(&self, id: &T::Id, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let key = id.to_string();
        self.store.write(T::aggregate_type(), |docs| {
            let doc = docs.get(&key).ok_or_else(|| RepositoryError::NotFound {
                aggregate_type: T::aggregate_type(),
                id: key.clone(),
            })?;
            expected.check(doc.version)?;
            docs.remove(&key);
            Ok::<_, RepositoryError>(())
        })??;

        tracing::debug!(collection = T::aggregate_type(), id = %key, "document removed");
        Ok(())
    }

    fn find(&self, specification: &Specification<T>) -> Result<Vec<T>, RepositoryError> {
        let found = match specification.to_filter() {
            Some(filter) => {
                let docs = self.matching_documents(&filter)?;
                docs.iter().map(Self::decode).collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let all = self
                    .all_documents()?
                    .iter()
                    .map(Self::decode)
                    .collect::<Result<Vec<_>, _>>()?;
                specification.select(all)?
            }
        };

        tracing::debug!(
            collection = T::aggregate_type(),
            specification = %specification,
            translated = specification.is_translatable(),
            matched = found.len(),
            "document query"
        );
        Ok(found)
    }

    fn find_paged(&self, specification: &PagedSpecification<T>) -> Result<Vec<T>, RepositoryError> {
        let matching = self.find(specification.specification())?;
        Ok(specification.window(matching)?)
    }

    fn count(&self, specification: &Specification<T>) -> Result<u64, RepositoryError> {
        match specification.to_filter() {
            Some(filter) => Ok(self.matching_documents(&filter)?.len() as u64),
            None => Ok(self.find(specification)?.len() as u64),
        }
    }
}
