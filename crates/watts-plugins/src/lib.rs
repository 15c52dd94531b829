//! Conformance testing of WaTTS plugins.
//!
//! A WaTTS plugin is an external executable that receives a base64-encoded
//! JSON request and answers with a JSON document on its standard output. This
//! crate drives such plugins and judges their answers:
//!
//! - [`input`] assembles a complete, schema-valid request [`Document`] from a
//!   baseline and the user's overrides,
//! - [`process`] runs the plugin and captures its output and run time,
//! - [`check`] validates the output against the protocol schemas in a
//!   [`watts_schemes::SchemaRegistry`] and compares it with expectations,
//! - [`suite`] runs a batch of cases and aggregates the verdicts.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use watts_plugins::{
//!     Document, ExecutionSettings, InputOverrides, PluginExecutor, ProcessExecutor,
//!     check_output, specify,
//! };
//! use watts_schemes::SchemaRegistry;
//!
//! let registry = SchemaRegistry::builtin();
//! let input = specify(&registry, Document::default_input(), &InputOverrides::default())
//!     .expect("default input is valid");
//! let executor = ProcessExecutor::new(ExecutionSettings::default());
//! let result = executor
//!     .execute(Path::new("/opt/watts/plugins/info.py"), input.document())
//!     .expect("plugin exists");
//! let check = check_output(&registry, "1.0.0", input.action(), result.output());
//! println!("{}", check.description());
//! ```

pub mod check;
pub mod document;
pub mod error;
pub mod input;
pub mod process;
pub mod suite;

#[cfg(test)]
mod tests;

pub use self::check::{
    CheckOutcome, ExpectationMismatch, OutputCheck, check_output, compare_to_expected,
    declared_conf_params,
};
pub use self::document::Document;
pub use self::error::{ExecutionFailure, InputError, PluginError, SuiteError};
pub use self::input::{ConfigSource, InlineJson, InputOverrides, SpecifiedInput, specify};
pub use self::process::{
    ExecutionResult, ExecutionSettings, PluginExecutor, ProcessExecutor, Transport,
};
pub use self::suite::{CaseFailure, CaseResult, SuiteConfig, SuiteResult, SuiteRunner, TestCase};
