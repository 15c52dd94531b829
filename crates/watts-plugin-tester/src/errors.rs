//! Error types and exit-code classification for the CLI runtime.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use watts_plugins::{InputError, PluginError, SuiteError};

use crate::telemetry::TelemetryError;

/// Broad classification of a run's outcome, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitCategory {
    Success,
    /// The plugin ran but its output broke the protocol or the expectations.
    PluginContract,
    /// The plugin could not be run to a clean exit.
    PluginExecution,
    Internal,
    /// The operator supplied unusable flags, files or JSON.
    User,
}

impl ExitCategory {
    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::PluginContract => 1,
            Self::PluginExecution => 2,
            Self::Internal => 3,
            Self::User => 4,
        }
    }
}

impl From<ExitCategory> for ExitCode {
    fn from(category: ExitCategory) -> Self {
        Self::from(category.code())
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Suite(#[from] SuiteError),
    #[error("the plugin must be named with --plugin-name")]
    MissingPlugin,
    #[error("test requires --expected-output-file or --expected-output-string")]
    MissingExpectedOutput,
    #[error("failed to render report: {0}")]
    Render(serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(io::Error),
}

impl AppError {
    pub(crate) const fn category(&self) -> ExitCategory {
        match self {
            Self::Telemetry(error) => error.category(),
            Self::Input(error) | Self::Suite(SuiteError::Input { source: error, .. }) => {
                input_category(error)
            }
            Self::Plugin(error) | Self::Suite(SuiteError::Plugin(error)) => plugin_category(error),
            Self::LoadConfiguration(_)
            | Self::CliUsage(_)
            | Self::MissingPlugin
            | Self::MissingExpectedOutput
            | Self::Suite(_) => ExitCategory::User,
            Self::Render(_) | Self::Write(_) => ExitCategory::Internal,
        }
    }
}

/// An assembled document the input schema rejects counts against the plugin
/// contract, like a generated document would.
const fn input_category(error: &InputError) -> ExitCategory {
    if error.is_internal() {
        ExitCategory::Internal
    } else if matches!(error, InputError::SchemaViolation { .. }) {
        ExitCategory::PluginContract
    } else {
        ExitCategory::User
    }
}

const fn plugin_category(error: &PluginError) -> ExitCategory {
    if error.is_internal() {
        ExitCategory::Internal
    } else {
        ExitCategory::User
    }
}
