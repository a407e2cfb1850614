//! Specification error model.

use thiserror::Error;

/// Failure while applying a predicate to a concrete entity.
///
/// Raised by structural predicates (unknown field, incomparable operands) or by
/// caller-supplied predicate logic via [`EvaluationError::predicate`]. The
/// specification layer never catches these; they surface unchanged to whoever
/// called `is_satisfied_by`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("type mismatch on field {field}: {detail}")]
    TypeMismatch { field: String, detail: String },

    #[error("predicate failed: {0}")]
    Predicate(String),
}

impl EvaluationError {
    pub fn predicate(msg: impl Into<String>) -> Self {
        Self::Predicate(msg.into())
    }

    pub fn type_mismatch(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

/// Error returned by specification construction and evaluation helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecificationError {
    /// Absent predicate, malformed criterion, or out-of-range paging input.
    /// Detected at construction and never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl SpecificationError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
