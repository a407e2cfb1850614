//! Paged and ordered specifications.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use repokit_core::ValueObject;

use crate::error::{EvaluationError, SpecificationError};
use crate::specification::Specification;
use crate::value::{FieldValue, Record};

/// Ordering direction. There are exactly two.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl core::str::FromStr for SortDirection {
    type Err = SpecificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(SpecificationError::invalid_argument(format!(
                "unknown sort direction: {other}"
            ))),
        }
    }
}

/// Concrete row window: skip `skip` rows, return at most `take`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRange {
    pub skip: u64,
    pub take: u64,
}

/// Zero-based page index plus a positive page size.
///
/// A page never knows the total row count; callers that need it ask the
/// repository for a count separately.
///
/// Deserialization runs the same checks as [`Page::new`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPage")]
pub struct Page {
    index: u64,
    size: u64,
}

#[derive(Deserialize)]
struct RawPage {
    index: u64,
    size: u64,
}

impl TryFrom<RawPage> for Page {
    type Error = SpecificationError;

    fn try_from(raw: RawPage) -> Result<Self, Self::Error> {
        Page::checked(raw.index, raw.size)
    }
}

impl ValueObject for Page {}

impl Page {
    /// Validate raw (possibly user-supplied) paging input.
    ///
    /// Negative index, size ≤ 0, or a row offset that does not fit in `u64`
    /// fail with `InvalidArgument`.
    pub fn new(index: i64, size: i64) -> Result<Self, SpecificationError> {
        if index < 0 {
            return Err(SpecificationError::invalid_argument(format!(
                "page index must be >= 0 (got {index})"
            )));
        }
        if size <= 0 {
            return Err(SpecificationError::invalid_argument(format!(
                "page size must be > 0 (got {size})"
            )));
        }

        Self::checked(index as u64, size as u64)
    }

    fn checked(index: u64, size: u64) -> Result<Self, SpecificationError> {
        if size == 0 {
            return Err(SpecificationError::invalid_argument("page size must be > 0 (got 0)"));
        }
        index
            .checked_mul(size)
            .ok_or_else(|| SpecificationError::invalid_argument("page offset overflows"))?;

        Ok(Self { index, size })
    }

    pub fn first(size: i64) -> Result<Self, SpecificationError> {
        Self::new(0, size)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn range(&self) -> RowRange {
        RowRange {
            skip: self.index * self.size,
            take: self.size,
        }
    }

    /// The following page, or `None` once the offset would overflow.
    pub fn next(&self) -> Option<Page> {
        let index = self.index.checked_add(1)?;
        index.checked_mul(self.size)?;
        Some(Page {
            index,
            size: self.size,
        })
    }
}

type KeyFn<T> = Arc<dyn Fn(&T) -> Result<FieldValue, EvaluationError> + Send + Sync>;

/// Ordering key selector plus direction.
///
/// `field` names the key for stores that translate the query; `key` extracts
/// it for in-memory execution.
pub struct OrderBy<T> {
    field: String,
    direction: SortDirection,
    key: KeyFn<T>,
}

impl<T> Clone for OrderBy<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            direction: self.direction,
            key: Arc::clone(&self.key),
        }
    }
}

impl<T> core::fmt::Debug for OrderBy<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderBy")
            .field("field", &self.field)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl<T> OrderBy<T> {
    /// Order by a key computed from the entity.
    pub fn by_key<F, V>(field: impl Into<String>, direction: SortDirection, key: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<FieldValue>,
    {
        Self {
            field: field.into(),
            direction,
            key: Arc::new(move |entity| Ok(key(entity).into())),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn key_of(&self, entity: &T) -> Result<FieldValue, EvaluationError> {
        (self.key)(entity)
    }

    /// Stable in-memory sort; ties keep their incoming order.
    pub fn sort(&self, items: Vec<T>) -> Result<Vec<T>, EvaluationError> {
        let mut keyed = items
            .into_iter()
            .map(|item| Ok((self.key_of(&item)?, item)))
            .collect::<Result<Vec<_>, EvaluationError>>()?;

        match self.direction {
            SortDirection::Ascending => keyed.sort_by(|(a, _), (b, _)| a.sort_cmp(b)),
            SortDirection::Descending => keyed.sort_by(|(a, _), (b, _)| b.sort_cmp(a)),
        }

        Ok(keyed.into_iter().map(|(_, item)| item).collect())
    }
}

impl<T: Record + 'static> OrderBy<T> {
    /// Order by a named field read through [`Record`].
    pub fn field(field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        let name = field.clone();
        Self {
            field,
            direction,
            key: Arc::new(move |entity: &T| {
                entity
                    .field(&name)
                    .ok_or_else(|| EvaluationError::UnknownField(name.clone()))
            }),
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::field(field, SortDirection::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::field(field, SortDirection::Descending)
    }
}

/// A specification plus ordering and a page window.
pub struct PagedSpecification<T> {
    specification: Specification<T>,
    order: OrderBy<T>,
    page: Page,
}

impl<T> Clone for PagedSpecification<T> {
    fn clone(&self) -> Self {
        Self {
            specification: self.specification.clone(),
            order: self.order.clone(),
            page: self.page,
        }
    }
}

impl<T> core::fmt::Debug for PagedSpecification<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PagedSpecification")
            .field("specification", &self.specification)
            .field("order", &self.order)
            .field("page", &self.page)
            .finish()
    }
}

impl<T> PagedSpecification<T> {
    /// Build from raw paging input; see [`Page::new`] for the validation rules.
    pub fn new(
        specification: Specification<T>,
        order: OrderBy<T>,
        page_index: i64,
        page_size: i64,
    ) -> Result<Self, SpecificationError> {
        Ok(Self::with_page(specification, order, Page::new(page_index, page_size)?))
    }

    pub fn with_page(specification: Specification<T>, order: OrderBy<T>, page: Page) -> Self {
        Self {
            specification,
            order,
            page,
        }
    }

    pub fn specification(&self) -> &Specification<T> {
        &self.specification
    }

    pub fn order(&self) -> &OrderBy<T> {
        &self.order
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn range(&self) -> RowRange {
        self.page.range()
    }

    pub fn is_satisfied_by(&self, entity: &T) -> Result<bool, EvaluationError> {
        self.specification.is_satisfied_by(entity)
    }

    /// Same specification and ordering, next page.
    pub fn next_page(&self) -> Option<Self> {
        Some(Self::with_page(
            self.specification.clone(),
            self.order.clone(),
            self.page.next()?,
        ))
    }

    /// In-memory execution: filter, stable sort, then skip/take.
    pub fn apply_to(&self, items: Vec<T>) -> Result<Vec<T>, EvaluationError> {
        let matching = self.specification.select(items)?;
        self.window(matching)
    }

    /// Sort already-matching items and cut out this page.
    pub fn window(&self, matching: Vec<T>) -> Result<Vec<T>, EvaluationError> {
        let sorted = self.order.sort(matching)?;

        let RowRange { skip, take } = self.range();
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let take = usize::try_from(take).unwrap_or(usize::MAX);
        Ok(sorted.into_iter().skip(skip).take(take).collect())
    }
}
