//! Structural (interpreted) predicate trees.
//!
//! A [`Filter`] is the serializable form of a specification: leaves are
//! field/operator/value criteria, inner nodes are AND / OR / NOT. Store
//! adapters translate it into their native query language; in memory it is
//! interpreted against any [`Record`].

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{EvaluationError, SpecificationError};
use crate::value::{FieldValue, Record};

/// Comparison operator of a single criterion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Substring for text fields, membership for list fields.
    Contains,
    StartsWith,
    /// Field equals any element of a list operand.
    In,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Unary operators take no operand.
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS WITH",
            Operator::In => "IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// One field/operator/value test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub op: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
}

impl Criterion {
    pub fn new(field: impl Into<String>, op: Operator, value: Option<FieldValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    fn binary(field: impl Into<String>, op: Operator, value: impl Into<FieldValue>) -> Self {
        Self::new(field, op, Some(value.into()))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::binary(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::binary(field, Operator::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::binary(field, Operator::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::binary(field, Operator::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::binary(field, Operator::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::binary(field, Operator::Ge, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::binary(field, Operator::Contains, value)
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::binary(field, Operator::StartsWith, FieldValue::Text(prefix.into()))
    }

    pub fn is_in<V: Into<FieldValue>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let list = values.into_iter().map(Into::into).collect();
        Self::binary(field, Operator::In, FieldValue::List(list))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, None)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, None)
    }

    /// Check the criterion is well formed.
    pub fn validate(&self) -> Result<(), SpecificationError> {
        if self.field.trim().is_empty() {
            return Err(SpecificationError::invalid_argument("criterion field cannot be empty"));
        }

        match (&self.value, self.op) {
            (Some(_), op) if op.is_unary() => Err(SpecificationError::invalid_argument(format!(
                "{} on `{}` takes no operand",
                op.symbol(),
                self.field
            ))),
            (None, op) if !op.is_unary() => Err(SpecificationError::invalid_argument(format!(
                "{} on `{}` requires an operand",
                op.symbol(),
                self.field
            ))),
            (Some(value), Operator::In) if !matches!(value, FieldValue::List(_)) => {
                Err(SpecificationError::invalid_argument(format!(
                    "IN on `{}` requires a list operand, got {}",
                    self.field,
                    value.type_name()
                )))
            }
            (Some(FieldValue::Null), op) if op != Operator::Eq && op != Operator::Ne => {
                Err(SpecificationError::invalid_argument(format!(
                    "{} on `{}` cannot take a null operand",
                    op.symbol(),
                    self.field
                )))
            }
            _ => Ok(()),
        }
    }

    /// Evaluate against a record.
    ///
    /// `== null` and `!= null` behave as IS NULL / IS NOT NULL; every other
    /// comparison involving a null field is false.
    pub fn evaluate<R: Record + ?Sized>(&self, record: &R) -> Result<bool, EvaluationError> {
        let actual = record
            .field(&self.field)
            .ok_or_else(|| EvaluationError::UnknownField(self.field.clone()))?;

        let operand = match (self.op, &self.value) {
            (Operator::IsNull, _) => return Ok(actual.is_null()),
            (Operator::IsNotNull, _) => return Ok(!actual.is_null()),
            (Operator::Eq, Some(FieldValue::Null)) => return Ok(actual.is_null()),
            (Operator::Ne, Some(FieldValue::Null)) => return Ok(!actual.is_null()),
            (_, Some(value)) => value,
            (op, None) => {
                return Err(EvaluationError::type_mismatch(
                    &self.field,
                    format!("{} requires an operand", op.symbol()),
                ));
            }
        };

        let field = self.field.as_str();
        match self.op {
            Operator::Eq => Ok(actual.compare(operand, field)? == Some(Ordering::Equal)),
            Operator::Ne => Ok(matches!(actual.compare(operand, field)?, Some(o) if o != Ordering::Equal)),
            Operator::Lt => Ok(actual.compare(operand, field)? == Some(Ordering::Less)),
            Operator::Le => Ok(matches!(
                actual.compare(operand, field)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            Operator::Gt => Ok(actual.compare(operand, field)? == Some(Ordering::Greater)),
            Operator::Ge => Ok(matches!(
                actual.compare(operand, field)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Operator::Contains => contains(&actual, operand, field),
            Operator::StartsWith => match (&actual, operand) {
                (FieldValue::Null, _) => Ok(false),
                (FieldValue::Text(s), FieldValue::Text(prefix)) => Ok(s.starts_with(prefix.as_str())),
                (a, b) => Err(EvaluationError::type_mismatch(
                    field,
                    format!("STARTS WITH needs text operands, got {} and {}", a.type_name(), b.type_name()),
                )),
            },
            Operator::In => match operand {
                FieldValue::List(candidates) => {
                    for candidate in candidates {
                        if actual.compare(candidate, field)? == Some(Ordering::Equal) {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                other => Err(EvaluationError::type_mismatch(
                    field,
                    format!("IN needs a list operand, got {}", other.type_name()),
                )),
            },
            Operator::IsNull => Ok(actual.is_null()),
            Operator::IsNotNull => Ok(!actual.is_null()),
        }
    }
}

fn contains(actual: &FieldValue, operand: &FieldValue, field: &str) -> Result<bool, EvaluationError> {
    match (actual, operand) {
        (FieldValue::Null, _) => Ok(false),
        (FieldValue::Text(s), FieldValue::Text(needle)) => Ok(s.contains(needle.as_str())),
        (FieldValue::List(items), needle) => {
            for item in items {
                if item.compare(needle, field)? == Some(Ordering::Equal) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (a, b) => Err(EvaluationError::type_mismatch(
            field,
            format!("CONTAINS not defined for {} and {}", a.type_name(), b.type_name()),
        )),
    }
}

impl core::fmt::Display for Criterion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} {}", self.field, self.op.symbol(), value),
            None => write!(f, "{} {}", self.field, self.op.symbol()),
        }
    }
}

/// Serializable predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Constant truth value (`all()` / `none()`).
    Always(bool),
    Where(Criterion),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Filter {
        Filter::Not(Box::new(self))
    }

    /// Validate every criterion in the tree.
    pub fn validate(&self) -> Result<(), SpecificationError> {
        match self {
            Filter::Always(_) => Ok(()),
            Filter::Where(c) => c.validate(),
            Filter::And(a, b) | Filter::Or(a, b) => {
                a.validate()?;
                b.validate()
            }
            Filter::Not(inner) => inner.validate(),
        }
    }

    /// Interpret the tree against a record, short-circuiting like `&&` / `||`.
    pub fn evaluate<R: Record + ?Sized>(&self, record: &R) -> Result<bool, EvaluationError> {
        match self {
            Filter::Always(b) => Ok(*b),
            Filter::Where(c) => c.evaluate(record),
            Filter::And(a, b) => Ok(a.evaluate(record)? && b.evaluate(record)?),
            Filter::Or(a, b) => Ok(a.evaluate(record)? || b.evaluate(record)?),
            Filter::Not(inner) => Ok(!inner.evaluate(record)?),
        }
    }

    /// Field names referenced anywhere in the tree, in first-seen order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Always(_) => {}
            Filter::Where(c) => {
                if !out.contains(&c.field.as_str()) {
                    out.push(c.field.as_str());
                }
            }
            Filter::And(a, b) | Filter::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Filter::Not(inner) => inner.collect_fields(out),
        }
    }
}

impl From<Criterion> for Filter {
    fn from(value: Criterion) -> Self {
        Filter::Where(value)
    }
}

impl core::fmt::Display for Filter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Filter::Always(true) => f.write_str("TRUE"),
            Filter::Always(false) => f.write_str("FALSE"),
            Filter::Where(c) => write!(f, "{c}"),
            Filter::And(a, b) => write!(f, "({a} AND {b})"),
            Filter::Or(a, b) => write!(f, "({a} OR {b})"),
            Filter::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}
