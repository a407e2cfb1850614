use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use repokit_specification::{Filter, PagedSpecification, Specification};

use super::sql::{SqlOrder, SqlTranslator, TableMapping};
use crate::error::RepositoryError;
use crate::repository::QueryRepository;

/// Read-only Postgres repository for row type `T`.
///
/// Only fully structural specifications can run here: the whole tree is
/// translated to one `WHERE` clause. A specification with an opaque predicate
/// fails with [`RepositoryError::Translation`] instead of silently loading the
/// table into memory.
///
/// `PostgresRepository` is `Send + Sync`; clones share the pool.
pub struct PostgresRepository<T> {
    pool: PgPool,
    translator: SqlTranslator,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PostgresRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            translator: self.translator.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> core::fmt::Debug for PostgresRepository<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PostgresRepository")
            .field("table", &self.translator.mapping().table())
            .finish_non_exhaustive()
    }
}

impl<T> PostgresRepository<T> {
    pub fn new(pool: PgPool, mapping: TableMapping) -> Self {
        Self {
            pool,
            translator: SqlTranslator::new(mapping),
            _marker: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn translator(&self) -> &SqlTranslator {
        &self.translator
    }

    fn filter_of(&self, specification: &Specification<T>) -> Result<Filter, RepositoryError> {
        specification.to_filter().ok_or_else(|| {
            RepositoryError::translation(format!(
                "{specification} contains an opaque predicate and cannot run against {}",
                self.translator.mapping().table()
            ))
        })
    }
}

#[async_trait]
impl<T> QueryRepository<T> for PostgresRepository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
{
    #[instrument(skip_all, err)]
    async fn find(&self, specification: &Specification<T>) -> Result<Vec<T>, RepositoryError> {
        let filter = self.filter_of(specification)?;
        let mut qb = self.translator.select(&filter, None, None)?;
        tracing::debug!(table = self.translator.mapping().table(), sql = qb.sql(), "postgres query");

        let rows = qb.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    #[instrument(skip_all, err)]
    async fn find_paged(&self, specification: &PagedSpecification<T>) -> Result<Vec<T>, RepositoryError> {
        let filter = self.filter_of(specification.specification())?;
        let order = SqlOrder {
            field: specification.order().field_name().to_string(),
            direction: specification.order().direction(),
        };
        let mut qb = self
            .translator
            .select(&filter, Some(&order), Some(specification.range()))?;
        tracing::debug!(
            table = self.translator.mapping().table(),
            sql = qb.sql(),
            page = specification.page().index(),
            "postgres paged query"
        );

        let rows = qb.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    #[instrument(skip_all, err)]
    async fn count(&self, specification: &Specification<T>) -> Result<u64, RepositoryError> {
        let filter = self.filter_of(specification)?;
        let mut qb = self.translator.count(&filter)?;

        let n: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}
