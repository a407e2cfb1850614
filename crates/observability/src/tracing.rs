//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Output format of the process-wide subscriber.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable, for local runs and tests.
    Text,
}

impl LogFormat {
    /// Read `REPOKIT_LOG_FORMAT` (`json` or `text`); anything else means JSON.
    pub fn from_env() -> Self {
        match std::env::var("REPOKIT_LOG_FORMAT").as_deref().map(str::trim) {
            Ok("text") | Ok("pretty") => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// The filter comes from `RUST_LOG` and falls back to `info`.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(LogFormat::from_env(), "info");
}

/// Initialize with an explicit format and fallback filter directive.
///
/// `RUST_LOG` still wins when set. Returns `false` when a global subscriber
/// was already installed.
pub fn init_with(format: LogFormat, default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Text => builder.try_init().is_ok(),
    }
}

/// Text output captured by the test harness (`cargo test` shows it only for
/// failing tests). Returns `false` when a subscriber was already installed.
pub fn init_for_tests(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_for_tests("debug");
        assert!(!init_with(LogFormat::Text, "info"));
        assert!(!init_for_tests("info"));
        ::tracing::info!(table = "customers", "subscriber installed");
    }
}
