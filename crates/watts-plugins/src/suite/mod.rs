//! Batch conformance runs.
//!
//! A [`SuiteConfig`] names a plugin executable and a list of [`TestCase`]s.
//! The [`SuiteRunner`] drives each case through input specification,
//! execution, output checking and expected-output comparison, strictly in
//! order and one at a time. A failing case never stops the run; the
//! [`SuiteResult`] always satisfies `total == passed + failed`.
//!
//! Only problems with the harness's own inputs abort a run: an unusable case
//! input or a plugin executable that does not exist.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, info};
use watts_schemes::SchemaRegistry;

use crate::check::{CheckOutcome, ExpectationMismatch, check_output, compare_to_expected};
use crate::document::Document;
use crate::error::SuiteError;
use crate::input::{InputOverrides, SpecifiedInput, specify};
use crate::process::{ExecutionResult, PluginExecutor};

/// Tracing target for suite runs.
const SUITE_TARGET: &str = "watts_plugins::suite";

/// A batch test configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuiteConfig {
    /// The plugin executable under test.
    pub exec_file: PathBuf,
    /// The cases, run in order.
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl SuiteConfig {
    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::InvalidConfig`] when the text is not a valid
    /// configuration object.
    pub fn from_json_str(text: &str) -> Result<Self, SuiteError> {
        serde_json::from_str(text).map_err(|error| SuiteError::InvalidConfig {
            message: error.to_string(),
        })
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::ReadConfig`] when the file cannot be read and
    /// [`SuiteError::InvalidConfig`] when it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, SuiteError> {
        let text = fs::read_to_string(path).map_err(|source| SuiteError::ReadConfig {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        Self::from_json_str(&text)
    }
}

/// One conformance case: an input fragment and the output members expected
/// in response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TestCase {
    /// Merged over the default input like inline JSON.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Members the plugin's output must contain.
    #[serde(default)]
    pub expected_output: Map<String, Value>,
}

/// Why a case failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseFailure {
    /// The plugin could not be launched or did not exit cleanly.
    Execution {
        /// Failure description.
        message: String,
    },
    /// The plugin's output is not JSON.
    NotJson {
        /// Decoder diagnostic.
        message: String,
    },
    /// The output violates the schema.
    SchemaViolation {
        /// Path of the offending member.
        path: String,
        /// What is wrong with it.
        message: String,
    },
    /// The output conforms but differs from the expected fragment.
    Mismatch(ExpectationMismatch),
}

/// The record of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    /// Zero-based position of the case in the suite.
    pub index: usize,
    /// The fully specified input handed to the plugin.
    pub plugin_input: Value,
    /// The plugin's decoded output, or its raw text when not JSON.
    pub plugin_output: Value,
    /// How long the plugin ran.
    #[serde(rename = "plugin_time", serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
    /// Why the case failed; absent for passing cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CaseFailure>,
}

impl CaseResult {
    /// Whether the case passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

fn serialize_elapsed<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{elapsed:?}"))
}

/// Aggregate outcome of a suite run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteResult {
    /// Number of cases run.
    pub total: usize,
    /// Number of passing cases.
    pub passed: usize,
    /// Number of failing cases.
    pub failed: usize,
    /// Records of the passing cases, in run order.
    pub passed_cases: Vec<CaseResult>,
    /// Records of the failing cases, in run order.
    pub failed_cases: Vec<CaseResult>,
}

impl SuiteResult {
    fn record(&mut self, case: CaseResult) {
        self.total += 1;
        if case.passed() {
            self.passed += 1;
            self.passed_cases.push(case);
        } else {
            self.failed += 1;
            self.failed_cases.push(case);
        }
    }

    /// Whether every case passed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs test cases against a plugin.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use std::time::Duration;
///
/// use watts_plugins::{
///     Document, ExecutionResult, PluginError, PluginExecutor, SuiteRunner, TestCase,
/// };
/// use watts_schemes::SchemaRegistry;
///
/// struct Conforming;
///
/// impl PluginExecutor for Conforming {
///     fn execute(&self, _: &Path, _: &Document) -> Result<ExecutionResult, PluginError> {
///         let output =
///             br#"{"result":"ok","version":"1.0.0","conf_params":[],"request_params":[]}"#;
///         Ok(ExecutionResult::new(output.to_vec(), None, Duration::ZERO))
///     }
/// }
///
/// let registry = SchemaRegistry::builtin();
/// let runner = SuiteRunner::new(&registry, Conforming);
/// let result = runner
///     .run(Path::new("plugin"), &[TestCase::default(), TestCase::default()])
///     .expect("suite runs");
/// assert_eq!((result.total, result.passed, result.failed), (2, 2, 0));
/// ```
#[derive(Debug)]
pub struct SuiteRunner<'a, E> {
    registry: &'a SchemaRegistry,
    executor: E,
    overrides: InputOverrides,
}

impl<'a, E> SuiteRunner<'a, E> {
    /// Creates a runner with no extra input overrides.
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, executor: E) -> Self {
        Self {
            registry,
            executor,
            overrides: InputOverrides::default(),
        }
    }

    /// Applies `overrides` to every case. Each case's own input takes the
    /// place of the inline JSON.
    #[must_use]
    pub fn with_overrides(mut self, overrides: InputOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

impl<E: PluginExecutor> SuiteRunner<'_, E> {
    /// Runs `cases` against `plugin` in order.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::Input`] when a case's input cannot be specified
    /// and [`SuiteError::Plugin`] when the plugin cannot be attempted. Plugin
    /// misbehaviour only fails the case concerned.
    pub fn run(&self, plugin: &Path, cases: &[TestCase]) -> Result<SuiteResult, SuiteError> {
        let mut result = SuiteResult::default();
        for (index, case) in cases.iter().enumerate() {
            let outcome = self.run_case(index, plugin, case)?;
            debug!(
                target: SUITE_TARGET,
                index,
                passed = outcome.passed(),
                "test case finished"
            );
            result.record(outcome);
        }
        info!(
            target: SUITE_TARGET,
            plugin = %plugin.display(),
            total = result.total,
            passed = result.passed,
            failed = result.failed,
            "test suite finished"
        );
        Ok(result)
    }

    fn run_case(
        &self,
        index: usize,
        plugin: &Path,
        case: &TestCase,
    ) -> Result<CaseResult, SuiteError> {
        let overrides = self
            .overrides
            .with_fragment(Document::from_map(case.input.clone()));
        let input = specify(self.registry, Document::default_input(), &overrides)
            .map_err(|source| SuiteError::Input { index, source })?;
        let execution = self.executor.execute(plugin, input.document())?;

        let version = input
            .watts_version()
            .unwrap_or_else(|| self.registry.default_version());
        let (plugin_output, failure) = judge(self.registry, version, &input, &execution, case);

        Ok(CaseResult {
            index,
            plugin_input: input.into_document().into(),
            plugin_output,
            elapsed: execution.elapsed(),
            failure,
        })
    }
}

fn judge(
    registry: &SchemaRegistry,
    version: &str,
    input: &SpecifiedInput,
    execution: &ExecutionResult,
    case: &TestCase,
) -> (Value, Option<CaseFailure>) {
    if let Some(failure) = execution.failure() {
        return (
            Value::String(execution.output_lossy()),
            Some(CaseFailure::Execution {
                message: failure.to_string(),
            }),
        );
    }
    let check = check_output(registry, version, input.action(), execution.output());
    let output = check
        .output()
        .cloned()
        .unwrap_or_else(|| Value::String(execution.output_lossy()));
    let failure = match check.outcome() {
        CheckOutcome::NotJson { message } => Some(CaseFailure::NotJson {
            message: message.clone(),
        }),
        CheckOutcome::SchemaViolation(violation) => Some(CaseFailure::SchemaViolation {
            path: violation.path.to_string(),
            message: violation.reason.to_string(),
        }),
        CheckOutcome::Passed => compare_to_expected(&output, &case.expected_output)
            .err()
            .map(CaseFailure::Mismatch),
    };
    (output, failure)
}
