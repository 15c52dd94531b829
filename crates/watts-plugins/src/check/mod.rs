//! Judging plugin output.
//!
//! [`check_output`] decodes the bytes a plugin produced and validates them
//! against the schema registered for the `(version, action)` pair. Unknown
//! versions are validated against the default version; the returned
//! [`OutputCheck`] records which version was actually used.
//!
//! [`compare_to_expected`] then checks the decoded output against an
//! expected-output fragment.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use watts_schemes::{Action, SchemaRegistry, SchemaViolation};

/// What the output check concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The output is JSON and satisfies the schema.
    Passed,
    /// The output could not be decoded as JSON.
    NotJson {
        /// Decoder diagnostic.
        message: String,
    },
    /// The output is JSON but violates the schema.
    SchemaViolation(SchemaViolation),
}

/// Result of checking one plugin output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputCheck {
    version: String,
    fell_back: bool,
    output: Option<Value>,
    outcome: CheckOutcome,
}

impl OutputCheck {
    /// The protocol version whose schema was applied.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the requested version was unknown and the default was used.
    #[must_use]
    pub const fn fell_back(&self) -> bool {
        self.fell_back
    }

    /// The decoded output, if it was JSON.
    #[must_use]
    pub const fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// The verdict.
    #[must_use]
    pub const fn outcome(&self) -> &CheckOutcome {
        &self.outcome
    }

    /// Whether the output passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Passed)
    }

    /// The violated path, when the outcome is a schema violation.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        match &self.outcome {
            CheckOutcome::SchemaViolation(violation) => Some(violation.path.to_string()),
            CheckOutcome::Passed | CheckOutcome::NotJson { .. } => None,
        }
    }

    /// A one-line human description of the verdict.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.outcome {
            CheckOutcome::Passed => "validation passed".to_owned(),
            CheckOutcome::NotJson { .. } => "error processing the output of the plugin".to_owned(),
            CheckOutcome::SchemaViolation(violation) => {
                format!("validation error {}", violation.reason)
            }
        }
    }
}

/// Decodes `raw` and validates it for `(version, action)`.
///
/// # Example
///
/// ```
/// use watts_plugins::check_output;
/// use watts_schemes::{Action, SchemaRegistry};
///
/// let registry = SchemaRegistry::builtin();
/// let raw = br#"{"result":"ok","version":"1.0.0","conf_params":[],"request_params":[]}"#;
/// let check = check_output(&registry, "1.0.0", Action::Parameter, raw);
/// assert!(check.passed());
/// assert_eq!(check.path(), None);
/// ```
#[must_use]
pub fn check_output(
    registry: &SchemaRegistry,
    version: &str,
    action: Action,
    raw: &[u8],
) -> OutputCheck {
    let resolved = registry.resolve(version);
    let mut check = OutputCheck {
        version: resolved.version.to_owned(),
        fell_back: resolved.fell_back,
        output: None,
        outcome: CheckOutcome::Passed,
    };
    let value: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(error) => {
            check.outcome = CheckOutcome::NotJson {
                message: error.to_string(),
            };
            return check;
        }
    };
    if let Err(violation) = registry.validate(resolved.version, action, &value) {
        check.outcome = CheckOutcome::SchemaViolation(violation);
    }
    check.output = Some(value);
    check
}

/// A member of the output that differs from the expected fragment.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(
    "unexpected output for key {key}: {} instead of {expected}",
    display_actual(.actual.as_ref())
)]
pub struct ExpectationMismatch {
    /// The offending member.
    pub key: String,
    /// What the fragment asked for.
    pub expected: Value,
    /// What the plugin produced; `None` when the member is absent.
    pub actual: Option<Value>,
}

fn display_actual(actual: Option<&Value>) -> String {
    actual.map_or_else(|| "nothing".to_owned(), ToString::to_string)
}

/// Checks that every member of `expected` appears in `actual` with an equal
/// value.
///
/// Scalars and objects must be equal, with numbers compared by value so that
/// `2` matches `2.0`. An expected array only requires the
/// actual member to be an array too; its elements are not compared. Members
/// of `actual` that `expected` does not mention are ignored.
///
/// # Errors
///
/// Returns the first [`ExpectationMismatch`] in `expected`'s key order.
pub fn compare_to_expected(
    actual: &Value,
    expected: &Map<String, Value>,
) -> Result<(), ExpectationMismatch> {
    for (key, wanted) in expected {
        let found = actual.get(key);
        let matches = match (wanted, found) {
            (Value::Array(_), Some(Value::Array(_))) => true,
            (_, Some(found)) => same_value(found, wanted),
            (_, None) => false,
        };
        if !matches {
            return Err(ExpectationMismatch {
                key: key.clone(),
                expected: wanted.clone(),
                actual: found.cloned(),
            });
        }
    }
    Ok(())
}

/// Deep equality in which numbers compare by their `f64` value, so `1` and
/// `1.0` are the same number.
fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            let member_matches = |(key, x): (&String, &Value)| {
                b.get(key).is_some_and(|y| same_value(x, y))
            };
            a.len() == b.len() && a.iter().all(member_matches)
        }
        _ => left == right,
    }
}

/// Collects the configuration parameters a `parameter` answer declares,
/// mapping each parameter's `name` to its `default`.
///
/// Entries without a string `name` are skipped; a missing `default` maps to
/// `null`.
#[must_use]
pub fn declared_conf_params(output: &Value) -> Map<String, Value> {
    output
        .get("conf_params")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|param| {
            let name = param.get("name")?.as_str()?;
            let default = param.get("default").cloned().unwrap_or(Value::Null);
            Some((name.to_owned(), default))
        })
        .collect()
}
