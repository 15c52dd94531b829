//! Domain errors raised while preparing, running, and judging plugins.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint and keep the errors `Clone`.
//!
//! Failures of the plugin itself (it could not be launched, exited
//! abnormally, or timed out) are not errors at this layer: they are recorded
//! in the [`ExecutionResult`](crate::ExecutionResult) as an
//! [`ExecutionFailure`] so the caller decides what to do with them.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use watts_schemes::{SchemaViolation, UnknownAction};

/// Errors raised while assembling a plugin input document.
#[derive(Debug, Clone, Error)]
pub enum InputError {
    /// A user-supplied override is not valid JSON.
    #[error("invalid JSON in {origin}: {message}")]
    InvalidUserInput {
        /// Where the override came from (a file path or `--json`).
        origin: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A user-supplied override is valid JSON but not an object.
    #[error("override from {origin} must be a JSON object")]
    NotAnObject {
        /// Where the override came from.
        origin: String,
    },

    /// A referenced file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A WaTTS config file was supplied without a service identifier.
    #[error("need a config identifier for config override of {path}")]
    MissingConfigIdentifier {
        /// The config file path.
        path: PathBuf,
    },

    /// The service identifier matched no plugin settings in the config file.
    #[error("could not find configuration parameters for '{identifier}' in {path}")]
    ConfigNotFound {
        /// The requested service identifier.
        identifier: String,
        /// The config file path.
        path: PathBuf,
    },

    /// The document names no action and none was requested.
    #[error("the plugin input does not name an action")]
    MissingAction,

    /// The requested or embedded action is not part of the protocol.
    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),

    /// `user_info` is missing or not an object, so no user id can be derived.
    #[error("user_info must be an object carrying iss and sub")]
    InvalidUserInfo,

    /// The assembled document does not satisfy the input schema.
    #[error("unable to validate plugin input: {violation}")]
    SchemaViolation {
        /// Where and why validation failed.
        violation: SchemaViolation,
    },

    /// An internal document could not be serialised.
    #[error("failed to serialise {what}: {message}")]
    Serialize {
        /// What was being serialised.
        what: &'static str,
        /// Serializer diagnostic.
        message: String,
    },
}

impl InputError {
    /// Whether the error is a defect in the harness rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Serialize { .. })
    }
}

/// Errors raised by the execution harness before a plugin is launched.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The plugin executable does not exist.
    #[error("plugin executable not found: {path}")]
    ExecutableNotFound {
        /// Path that was checked.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The plugin input could not be serialised to JSON.
    #[error("failed to serialise plugin input: {message}")]
    SerializeInput {
        /// Serializer diagnostic.
        message: String,
    },
}

impl PluginError {
    /// Whether the error is a defect in the harness rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::SerializeInput { .. })
    }
}

/// Why a launched plugin did not complete normally.
#[derive(Debug, Clone, Error)]
pub enum ExecutionFailure {
    /// The process could not be started.
    #[error("failed to launch plugin: {source}")]
    Launch {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The process exited with a non-zero status code.
    #[error("plugin exited with non-zero status {status}")]
    NonZeroExit {
        /// Process exit status.
        status: i32,
    },

    /// The process was terminated without an exit code (e.g. by a signal).
    #[error("plugin terminated abnormally: {description}")]
    Terminated {
        /// Platform description of the exit status.
        description: String,
    },

    /// The process exceeded the configured deadline and was killed.
    #[error("plugin timed out after {}s", .timeout.as_secs())]
    TimedOut {
        /// The configured deadline.
        timeout: Duration,
    },

    /// Waiting for the process or collecting its output failed.
    #[error("I/O error communicating with plugin: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Errors that abort a whole test suite.
#[derive(Debug, Clone, Error)]
pub enum SuiteError {
    /// The batch test configuration could not be read.
    #[error("failed to read test configuration {path}: {source}")]
    ReadConfig {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The batch test configuration is malformed.
    #[error("invalid test configuration: {message}")]
    InvalidConfig {
        /// Parser diagnostic.
        message: String,
    },

    /// A test case's input could not be specified.
    #[error("test case {index}: {source}")]
    Input {
        /// Zero-based case index.
        index: usize,
        /// Underlying input error.
        #[source]
        source: InputError,
    },

    /// The plugin could not be run at all.
    #[error(transparent)]
    Plugin(#[from] PluginError),
}
