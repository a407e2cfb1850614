//! `repokit-specification`: reusable, composable query predicates.
//!
//! - [`Specification`]: immutable predicate over an entity, composed with AND / OR / NOT
//! - [`Filter`] / [`Criterion`]: the structural, serializable form store adapters translate
//! - [`PagedSpecification`]: a specification plus ordering and a page window
//! - [`Validator`]: specifications reused as validation rules
//!
//! Nothing here performs IO; execution against a store belongs to repository adapters.

pub mod error;
pub mod filter;
pub mod paging;
pub mod specification;
pub mod validation;
pub mod value;

pub use error::{EvaluationError, SpecificationError};
pub use filter::{Criterion, Filter, Operator};
pub use paging::{OrderBy, Page, PagedSpecification, RowRange, SortDirection};
pub use specification::Specification;
pub use validation::{Rule, ValidationError, ValidationErrors, Validator, Violation};
pub use value::{FieldValue, Record};
