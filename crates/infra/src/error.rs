//! Repository error model.

use thiserror::Error;

use repokit_core::DomainError;
use repokit_events::PublishError;
use repokit_specification::{EvaluationError, SpecificationError};

/// Error returned by repository adapters.
///
/// These are store-level failures, as opposed to the deterministic
/// [`DomainError`]s raised by domain code. [`From<RepositoryError>`] maps the
/// ones with a domain meaning (not found, stale version) back.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{aggregate_type} {id} not found")]
    NotFound { aggregate_type: &'static str, id: String },

    #[error("{aggregate_type} {id} already exists")]
    Duplicate { aggregate_type: &'static str, id: String },

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A predicate failed while being applied to a stored entity.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The specification cannot be expressed in the store's query language.
    #[error("untranslatable specification: {0}")]
    Translation(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation(msg.into())
    }
}

impl From<SpecificationError> for RepositoryError {
    fn from(value: SpecificationError) -> Self {
        match value {
            SpecificationError::InvalidArgument(msg) => RepositoryError::InvalidQuery(msg),
            SpecificationError::Evaluation(e) => RepositoryError::Evaluation(e),
        }
    }
}

impl From<DomainError> for RepositoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => RepositoryError::Concurrency(msg),
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                RepositoryError::Concurrency(db_err.message().to_string())
            }
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

impl From<RepositoryError> for DomainError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { .. } => DomainError::NotFound,
            RepositoryError::Duplicate { .. } => DomainError::conflict(value.to_string()),
            RepositoryError::Concurrency(msg) => DomainError::Conflict(msg),
            other => DomainError::invariant(other.to_string()),
        }
    }
}

/// Error returned by a unit-of-work commit.
#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Writes succeeded but publishing their events did not; the events stay
    /// pending and the next commit retries them.
    #[error(transparent)]
    Publish(#[from] PublishError),
}
