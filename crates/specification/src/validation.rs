//! Specifications reused as validation rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use repokit_core::DomainError;

use crate::error::EvaluationError;
use crate::specification::Specification;

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every violation found for one entity, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub violations: Vec<Violation>,
}

impl core::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (idx, v) in self.violations.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for DomainError {
    fn from(value: ValidationErrors) -> Self {
        DomainError::validation(value.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    Invalid(ValidationErrors),

    /// A rule's predicate failed to evaluate; validation stops there.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// A specification that must hold, with the message reported when it does not.
pub struct Rule<T> {
    field: String,
    message: String,
    specification: Specification<T>,
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            message: self.message.clone(),
            specification: self.specification.clone(),
        }
    }
}

impl<T> Rule<T> {
    pub fn new(field: impl Into<String>, message: impl Into<String>, specification: Specification<T>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            specification,
        }
    }

    pub fn check(&self, entity: &T) -> Result<Option<Violation>, EvaluationError> {
        if self.specification.is_satisfied_by(entity)? {
            Ok(None)
        } else {
            Ok(Some(Violation {
                field: self.field.clone(),
                message: self.message.clone(),
            }))
        }
    }
}

/// Ordered rule set.
pub struct Validator<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Default for Validator<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<T> Validator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(
        mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        specification: Specification<T>,
    ) -> Self {
        self.rules.push(Rule::new(field, message, specification));
        self
    }

    pub fn push(&mut self, rule: Rule<T>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule and collect the violations.
    pub fn violations(&self, entity: &T) -> Result<Vec<Violation>, EvaluationError> {
        let mut out = Vec::new();
        for rule in &self.rules {
            if let Some(v) = rule.check(entity)? {
                out.push(v);
            }
        }
        Ok(out)
    }

    pub fn validate(&self, entity: &T) -> Result<(), ValidationError> {
        let violations = self.violations(entity)?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Invalid(ValidationErrors { violations }))
        }
    }
}
