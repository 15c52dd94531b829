//! Layered runtime configuration for the WaTTS plugin tester.
//!
//! [`Config`] is loaded with `ortho_config`: built-in defaults are overridden
//! by a configuration file (`--config-path` or `WATTS_TESTER_CONFIG_PATH`),
//! then by `WATTS_TESTER_*` environment variables, then by command-line
//! flags.

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_ENV_VAR, DEFAULT_LOG_FILTER, default_env_var_string, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use self::logging::{LogFormat, LogFormatParseError};

/// Runtime configuration shared by every tester command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "WATTS_TESTER")]
pub struct Config {
    /// `tracing_subscriber::EnvFilter` expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Variable used when the request is passed through the environment.
    #[serde(default = "default_env_var_string")]
    pub env_var: String,
    /// Upper bound on a plugin's run time in seconds; `0` waits indefinitely.
    #[serde(default)]
    pub plugin_timeout_secs: u64,
}

impl Config {
    /// The log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// The log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The environment transport variable.
    #[must_use]
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// The plugin deadline, or `None` to wait indefinitely.
    #[must_use]
    pub const fn plugin_timeout(&self) -> Option<Duration> {
        match self.plugin_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            env_var: default_env_var_string(),
            plugin_timeout_secs: 0,
        }
    }
}
