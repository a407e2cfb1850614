//! Filter → parameterised Postgres SQL.
//!
//! Every operand is bound (`$n`); only identifiers from the [`TableMapping`]
//! allow-list are spliced into the statement, and always double-quoted.
//!
//! ## Null semantics
//!
//! In memory a comparison against a null field is false, and `NOT false` is
//! true. SQL's three-valued logic would make `NOT (col = $1)` unknown for a
//! null `col`, so every comparison is wrapped in `COALESCE(..., FALSE)` to get
//! the same two-valued results.
//!
//! | Criterion                 | SQL                                        |
//! |---------------------------|--------------------------------------------|
//! | `f == null` / `f != null` | `"f" IS NULL` / `"f" IS NOT NULL`          |
//! | `f < v` (etc.)            | `COALESCE("f" < $1, FALSE)`                |
//! | `f CONTAINS v` (text)     | `COALESCE(strpos("f", $1) > 0, FALSE)`     |
//! | `f CONTAINS v` (array)    | `COALESCE($1 = ANY("f"), FALSE)`           |
//! | `f STARTS WITH v`         | `COALESCE(starts_with("f", $1), FALSE)`    |
//! | `f IN [a, b]`             | `COALESCE("f" IN ($1, $2), FALSE)`         |
//!
//! Operand types must match the column types: a text operand is not cast to
//! `uuid` or `timestamptz` the way in-memory comparisons coerce it.

use std::collections::BTreeMap;

use sqlx::{Postgres, QueryBuilder};

use repokit_specification::{Criterion, FieldValue, Filter, Operator, RowRange, SortDirection};

use crate::error::RepositoryError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ColumnKind {
    Scalar,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    name: String,
    kind: ColumnKind,
}

/// Table name plus the allow-list of queryable fields.
///
/// Field names are the names used in filters (the aggregate's field names);
/// columns are what they map to in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    table: String,
    key_column: String,
    columns: BTreeMap<String, Column>,
}

impl TableMapping {
    /// `table` may be schema-qualified (`sales.customers`). The key column
    /// defaults to `id` and breaks ordering ties.
    pub fn new(table: impl Into<String>) -> Result<Self, RepositoryError> {
        let table = table.into();
        for segment in table.split('.') {
            check_identifier(segment)?;
        }
        Ok(Self {
            table,
            key_column: "id".to_string(),
            columns: BTreeMap::new(),
        })
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Result<Self, RepositoryError> {
        let column = column.into();
        check_identifier(&column)?;
        self.key_column = column;
        Ok(self)
    }

    /// Map a scalar field to a column.
    pub fn column(self, field: impl Into<String>, column: impl Into<String>) -> Result<Self, RepositoryError> {
        self.with_column(field.into(), column.into(), ColumnKind::Scalar)
    }

    /// Map a list field to a Postgres array column (`CONTAINS` tests membership).
    pub fn array_column(self, field: impl Into<String>, column: impl Into<String>) -> Result<Self, RepositoryError> {
        self.with_column(field.into(), column.into(), ColumnKind::Array)
    }

    fn with_column(mut self, field: String, name: String, kind: ColumnKind) -> Result<Self, RepositoryError> {
        check_identifier(&name)?;
        self.columns.insert(field, Column { name, kind });
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    fn quoted_table(&self) -> String {
        self.table.split('.').map(quote).collect::<Vec<_>>().join(".")
    }

    fn resolve(&self, field: &str) -> Result<&Column, RepositoryError> {
        self.columns
            .get(field)
            .ok_or_else(|| RepositoryError::translation(format!("field `{field}` is not mapped to a column of {}", self.table)))
    }
}

fn check_identifier(ident: &str) -> Result<(), RepositoryError> {
    let mut chars = ident.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidQuery(format!("invalid SQL identifier: {ident:?}")))
    }
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

/// Ordering translated to a mapped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// Builds SELECT / COUNT statements for one table.
#[derive(Debug, Clone)]
pub struct SqlTranslator {
    mapping: TableMapping,
}

impl SqlTranslator {
    pub fn new(mapping: TableMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    /// `SELECT * FROM table WHERE ... [ORDER BY ...] [LIMIT .. OFFSET ..]`.
    pub fn select(
        &self,
        filter: &Filter,
        order: Option<&SqlOrder>,
        range: Option<RowRange>,
    ) -> Result<QueryBuilder<'static, Postgres>, RepositoryError> {
        let mut qb = QueryBuilder::new(format!("SELECT * FROM {} WHERE ", self.mapping.quoted_table()));
        self.push_filter(&mut qb, filter)?;

        let key = quote(&self.mapping.key_column);
        match order {
            Some(order) => {
                let column = quote(&self.mapping.resolve(&order.field)?.name);
                let direction = match order.direction {
                    SortDirection::Ascending => "ASC NULLS FIRST",
                    SortDirection::Descending => "DESC NULLS LAST",
                };
                qb.push(format!(" ORDER BY {column} {direction}, {key} ASC"));
            }
            None => {
                qb.push(format!(" ORDER BY {key} ASC"));
            }
        }

        if let Some(RowRange { skip, take }) = range {
            let limit = i64::try_from(take).map_err(|_| RepositoryError::InvalidQuery("page size too large".into()))?;
            let offset = i64::try_from(skip).map_err(|_| RepositoryError::InvalidQuery("page offset too large".into()))?;
            qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        }

        Ok(qb)
    }

    /// `SELECT COUNT(*) FROM table WHERE ...`.
    pub fn count(&self, filter: &Filter) -> Result<QueryBuilder<'static, Postgres>, RepositoryError> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE ", self.mapping.quoted_table()));
        self.push_filter(&mut qb, filter)?;
        Ok(qb)
    }

    fn push_filter(&self, qb: &mut QueryBuilder<'static, Postgres>, filter: &Filter) -> Result<(), RepositoryError> {
        match filter {
            Filter::Always(true) => {
                qb.push("TRUE");
            }
            Filter::Always(false) => {
                qb.push("FALSE");
            }
            Filter::Where(criterion) => self.push_criterion(qb, criterion)?,
            Filter::And(a, b) | Filter::Or(a, b) => {
                let joiner = if matches!(filter, Filter::And(..)) { " AND " } else { " OR " };
                qb.push("(");
                self.push_filter(qb, a)?;
                qb.push(joiner);
                self.push_filter(qb, b)?;
                qb.push(")");
            }
            Filter::Not(inner) => {
                qb.push("NOT (");
                self.push_filter(qb, inner)?;
                qb.push(")");
            }
        }
        Ok(())
    }

    fn push_criterion(&self, qb: &mut QueryBuilder<'static, Postgres>, criterion: &Criterion) -> Result<(), RepositoryError> {
        criterion.validate()?;
        let column = self.mapping.resolve(&criterion.field)?;
        let col = quote(&column.name);

        let operand = match (criterion.op, &criterion.value) {
            (Operator::IsNull, _) | (Operator::Eq, Some(FieldValue::Null)) => {
                qb.push(format!("{col} IS NULL"));
                return Ok(());
            }
            (Operator::IsNotNull, _) | (Operator::Ne, Some(FieldValue::Null)) => {
                qb.push(format!("{col} IS NOT NULL"));
                return Ok(());
            }
            (_, Some(value)) => value,
            (op, None) => {
                return Err(RepositoryError::InvalidQuery(format!(
                    "{} on `{}` requires an operand",
                    op.symbol(),
                    criterion.field
                )));
            }
        };

        let comparison = match criterion.op {
            Operator::Eq => Some("="),
            Operator::Ne => Some("<>"),
            Operator::Lt => Some("<"),
            Operator::Le => Some("<="),
            Operator::Gt => Some(">"),
            Operator::Ge => Some(">="),
            _ => None,
        };

        if let Some(symbol) = comparison {
            qb.push(format!("COALESCE({col} {symbol} "));
            push_scalar(qb, operand, &criterion.field)?;
            qb.push(", FALSE)");
            return Ok(());
        }

        match (criterion.op, column.kind) {
            (Operator::Contains, ColumnKind::Array) => {
                qb.push("COALESCE(");
                push_scalar(qb, operand, &criterion.field)?;
                qb.push(format!(" = ANY({col}), FALSE)"));
            }
            (Operator::Contains, ColumnKind::Scalar) => {
                qb.push(format!("COALESCE(strpos({col}, "));
                push_text(qb, operand, &criterion.field, "CONTAINS")?;
                qb.push(") > 0, FALSE)");
            }
            (Operator::StartsWith, _) => {
                qb.push(format!("COALESCE(starts_with({col}, "));
                push_text(qb, operand, &criterion.field, "STARTS WITH")?;
                qb.push("), FALSE)");
            }
            (Operator::In, _) => push_in(qb, &col, operand, &criterion.field)?,
            (op, _) => {
                return Err(RepositoryError::translation(format!(
                    "operator {} is not supported on `{}`",
                    op.symbol(),
                    criterion.field
                )));
            }
        }
        Ok(())
    }
}

fn push_in(
    qb: &mut QueryBuilder<'static, Postgres>,
    col: &str,
    operand: &FieldValue,
    field: &str,
) -> Result<(), RepositoryError> {
    let FieldValue::List(candidates) = operand else {
        return Err(RepositoryError::InvalidQuery(format!("IN on `{field}` requires a list operand")));
    };

    let includes_null = candidates.iter().any(FieldValue::is_null);
    let values: Vec<&FieldValue> = candidates.iter().filter(|v| !v.is_null()).collect();

    match (values.is_empty(), includes_null) {
        (true, false) => {
            qb.push("FALSE");
        }
        (true, true) => {
            qb.push(format!("{col} IS NULL"));
        }
        (false, includes_null) => {
            if includes_null {
                qb.push(format!("({col} IS NULL OR "));
            }
            qb.push(format!("COALESCE({col} IN ("));
            for (idx, value) in values.into_iter().enumerate() {
                if idx > 0 {
                    qb.push(", ");
                }
                push_scalar(qb, value, field)?;
            }
            qb.push("), FALSE)");
            if includes_null {
                qb.push(")");
            }
        }
    }
    Ok(())
}

fn push_text(
    qb: &mut QueryBuilder<'static, Postgres>,
    operand: &FieldValue,
    field: &str,
    op: &str,
) -> Result<(), RepositoryError> {
    match operand {
        FieldValue::Text(s) => {
            qb.push_bind(s.clone());
            Ok(())
        }
        other => Err(RepositoryError::translation(format!(
            "{op} on `{field}` needs a text operand, got {}",
            other.type_name()
        ))),
    }
}

fn push_scalar(
    qb: &mut QueryBuilder<'static, Postgres>,
    value: &FieldValue,
    field: &str,
) -> Result<(), RepositoryError> {
    match value {
        FieldValue::Bool(b) => {
            qb.push_bind(*b);
        }
        FieldValue::Int(i) => {
            qb.push_bind(*i);
        }
        FieldValue::Float(x) => {
            qb.push_bind(*x);
        }
        FieldValue::Uuid(u) => {
            qb.push_bind(*u);
        }
        FieldValue::Timestamp(t) => {
            qb.push_bind(*t);
        }
        FieldValue::Text(s) => {
            qb.push_bind(s.clone());
        }
        FieldValue::Null | FieldValue::List(_) => {
            return Err(RepositoryError::translation(format!(
                "`{field}` cannot be compared with a {} operand in SQL",
                value.type_name()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> SqlTranslator {
        let mapping = TableMapping::new("sales.customers")
            .and_then(|m| m.column("first_name", "first_name"))
            .and_then(|m| m.column("zip_code", "zip"))
            .and_then(|m| m.column("period", "period"))
            .and_then(|m| m.array_column("tags", "tags"))
            .unwrap();
        SqlTranslator::new(mapping)
    }

    fn where_sql(filter: Filter) -> String {
        translator().count(&filter).unwrap().sql().to_string()
    }

    const COUNT: &str = r#"SELECT COUNT(*) FROM "sales"."customers" WHERE "#;

    #[test]
    fn comparisons_are_null_safe_and_parameterised() {
        assert_eq!(
            where_sql(Criterion::ne("zip_code", "30062").into()),
            format!(r#"{COUNT}COALESCE("zip" <> $1, FALSE)"#)
        );
    }

    #[test]
    fn null_operands_become_is_null() {
        assert_eq!(
            where_sql(Criterion::eq("zip_code", FieldValue::Null).into()),
            format!(r#"{COUNT}"zip" IS NULL"#)
        );
        assert_eq!(
            where_sql(Criterion::is_not_null("zip_code").into()),
            format!(r#"{COUNT}"zip" IS NOT NULL"#)
        );
    }

    #[test]
    fn boolean_structure_is_parenthesised() {
        let filter = Filter::from(Criterion::eq("period", 2024))
            .and(Criterion::eq("first_name", "Ada").into())
            .or(Filter::from(Criterion::ge("period", 2030)).negate());
        assert_eq!(
            where_sql(filter),
            format!(
                r#"{COUNT}((COALESCE("period" = $1, FALSE) AND COALESCE("first_name" = $2, FALSE)) OR NOT (COALESCE("period" >= $3, FALSE)))"#
            )
        );
    }

    #[test]
    fn contains_depends_on_the_column_kind() {
        assert_eq!(
            where_sql(Criterion::contains("first_name", "d").into()),
            format!(r#"{COUNT}COALESCE(strpos("first_name", $1) > 0, FALSE)"#)
        );
        assert_eq!(
            where_sql(Criterion::contains("tags", "vip").into()),
            format!(r#"{COUNT}COALESCE($1 = ANY("tags"), FALSE)"#)
        );
        assert_eq!(
            where_sql(Criterion::starts_with("first_name", "A").into()),
            format!(r#"{COUNT}COALESCE(starts_with("first_name", $1), FALSE)"#)
        );
    }

    #[test]
    fn in_lists_expand_and_handle_edge_cases() {
        assert_eq!(
            where_sql(Criterion::is_in("period", [2023, 2024]).into()),
            format!(r#"{COUNT}COALESCE("period" IN ($1, $2), FALSE)"#)
        );
        assert_eq!(
            where_sql(Criterion::is_in("period", Vec::<i64>::new()).into()),
            format!("{COUNT}FALSE")
        );
        assert_eq!(
            where_sql(Criterion::is_in("zip_code", [FieldValue::Null, "30062".into()]).into()),
            format!(r#"{COUNT}("zip" IS NULL OR COALESCE("zip" IN ($1), FALSE))"#)
        );
    }

    #[test]
    fn constants_translate_to_literals() {
        assert_eq!(where_sql(Filter::Always(true)), format!("{COUNT}TRUE"));
        assert_eq!(where_sql(Filter::Always(false).negate()), format!("{COUNT}NOT (FALSE)"));
    }

    #[test]
    fn select_orders_with_null_placement_and_pages() {
        let order = SqlOrder {
            field: "first_name".into(),
            direction: SortDirection::Descending,
        };
        let qb = translator()
            .select(&Filter::Always(true), Some(&order), Some(RowRange { skip: 20, take: 10 }))
            .unwrap();
        assert_eq!(
            qb.sql(),
            r#"SELECT * FROM "sales"."customers" WHERE TRUE ORDER BY "first_name" DESC NULLS LAST, "id" ASC LIMIT $1 OFFSET $2"#
        );

        let qb = translator().select(&Filter::Always(true), None, None).unwrap();
        assert_eq!(qb.sql(), r#"SELECT * FROM "sales"."customers" WHERE TRUE ORDER BY "id" ASC"#);
    }

    #[test]
    fn unmapped_fields_are_rejected() {
        let err = translator().count(&Criterion::eq("password", "x").into()).err().unwrap();
        assert!(matches!(err, RepositoryError::Translation(_)));

        let order = SqlOrder {
            field: "age".into(),
            direction: SortDirection::Ascending,
        };
        let err = translator().select(&Filter::Always(true), Some(&order), None).err().unwrap();
        assert!(matches!(err, RepositoryError::Translation(_)));
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(matches!(
            TableMapping::new("customers; DROP TABLE x"),
            Err(RepositoryError::InvalidQuery(_))
        ));
        assert!(TableMapping::new("customers").and_then(|m| m.column("zip", "zip\"code")).is_err());
    }

    #[test]
    fn malformed_criteria_are_invalid_queries() {
        let malformed = Criterion::new("zip_code", Operator::Lt, None);
        let err = translator().count(&malformed.into()).err().unwrap();
        assert!(matches!(err, RepositoryError::InvalidQuery(_)));
    }
}
