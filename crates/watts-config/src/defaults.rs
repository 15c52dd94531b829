//! Built-in configuration defaults.

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Environment variable carrying the request in environment transport mode.
pub const DEFAULT_ENV_VAR: &str = "WATTS_PARAMETER";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Owned transport variable name used by serde.
#[must_use]
pub fn default_env_var_string() -> String {
    DEFAULT_ENV_VAR.to_owned()
}
