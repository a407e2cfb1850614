//! Repository configuration.
//!
//! Loaded from the environment once at startup and validated up front, so a
//! misconfiguration fails at boot instead of on the first query.
//!
//! | Variable                    | Default  |
//! |-----------------------------|----------|
//! | `REPOKIT_BACKEND`           | `memory` |
//! | `DATABASE_URL`              | required for `postgres` |
//! | `REPOKIT_MAX_CONNECTIONS`   | `5`      |
//! | `REPOKIT_DEFAULT_PAGE_SIZE` | `50`     |
//! | `REPOKIT_MAX_PAGE_SIZE`     | `1000`   |

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use repokit_specification::{Page, SpecificationError};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Storage backend behind the repositories.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Memory,
    Document,
    Postgres,
}

impl core::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Backend::Memory),
            "document" | "json" => Ok(Backend::Document),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            other => Err(ConfigError::invalid("REPOKIT_BACKEND", format!("unknown backend `{other}`"))),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is required when REPOKIT_BACKEND=postgres")]
    Missing { field: &'static str },

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub backend: Backend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Page size used when a caller does not ask for one.
    pub default_page_size: u32,
    /// Upper bound applied to caller-supplied page sizes.
    pub max_page_size: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl RepositoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests, layered config sources).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("REPOKIT_BACKEND") {
            Some(raw) => raw.parse()?,
            None => Backend::default(),
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if backend == Backend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing { field: "DATABASE_URL" });
        }

        let config = Self {
            backend,
            database_url,
            max_connections: parse_positive(&lookup, "REPOKIT_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            default_page_size: parse_positive(&lookup, "REPOKIT_DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            max_page_size: parse_positive(&lookup, "REPOKIT_MAX_PAGE_SIZE", MAX_PAGE_SIZE)?,
        };

        if config.default_page_size > config.max_page_size {
            return Err(ConfigError::invalid(
                "REPOKIT_DEFAULT_PAGE_SIZE",
                format!(
                    "{} exceeds REPOKIT_MAX_PAGE_SIZE ({})",
                    config.default_page_size, config.max_page_size
                ),
            ));
        }

        tracing::debug!(backend = ?config.backend, max_page_size = config.max_page_size, "repository config loaded");
        Ok(config)
    }

    /// Page from optional caller input: the size defaults to
    /// `default_page_size` and is capped at `max_page_size`. Negative or zero
    /// input is still rejected.
    pub fn page(&self, index: Option<i64>, size: Option<i64>) -> Result<Page, SpecificationError> {
        let size = size
            .unwrap_or(i64::from(self.default_page_size))
            .min(i64::from(self.max_page_size));
        Page::new(index.unwrap_or(0), size)
    }

    /// Lazily connecting pool for the Postgres backend.
    pub fn connect_lazy(&self) -> Result<PgPool, ConfigError> {
        let url = self
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing { field: "DATABASE_URL" })?;

        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(url)
            .map_err(|e| ConfigError::invalid("DATABASE_URL", e.to_string()))
    }
}

fn parse_positive<F>(lookup: &F, key: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(0) => Err(ConfigError::invalid(key, "must be greater than zero")),
            Ok(v) => Ok(v),
            Err(e) => Err(ConfigError::invalid(key, format!("`{raw}`: {e}"))),
        },
    }
}
