//! Infrastructure layer: repositories, unit of work, SQL translation, config.
//!
//! Three repository backends share the [`Repository`] / [`QueryRepository`]
//! contracts:
//!
//! - [`InMemoryRepository`]: typed aggregates behind a lock, any specification
//! - [`DocumentRepository`]: JSON documents, structural filters run on the document
//! - [`PostgresRepository`]: read side, structural filters translated to SQL

pub mod config;
pub mod error;
pub mod postgres;
pub mod repository;
pub mod unit_of_work;


#[cfg(test)]
mod test_support;

pub use config::{Backend, ConfigError, RepositoryConfig};
pub use error::{RepositoryError, UnitOfWorkError};
pub use postgres::{PostgresRepository, SqlOrder, SqlTranslator, TableMapping};
pub use repository::{DocumentRepository, DocumentStore, InMemoryRepository, QueryRepository, Repository};
pub use unit_of_work::{RepositoryUnitOfWork, UnitOfWork};
