//! Postgres adapter: specifications translated to SQL and run through sqlx.

pub mod repository;
pub mod sql;

pub use repository::PostgresRepository;
pub use sql::{SqlOrder, SqlTranslator, TableMapping};
