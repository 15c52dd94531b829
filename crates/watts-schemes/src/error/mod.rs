//! Validation failures reported by the schema registry.
//!
//! A [`SchemaViolation`] pairs the structural [`FieldPath`] at which
//! validation failed with a [`ViolationReason`]. The path is diagnostic data
//! only; nothing in the harness branches on it.

use std::fmt;

use serde_json::Value;
use strum::Display;
use thiserror::Error;

/// The JSON type of a value, used in type-mismatch diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum JsonType {
    /// `null`.
    Null,
    /// `true` or `false`.
    Boolean,
    /// Any JSON number.
    Number,
    /// A JSON string.
    String,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl JsonType {
    /// Classifies a JSON value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// An object member.
    Key(String),
    /// An array element.
    Index(usize),
}

/// Location of a value inside a JSON document, rendered as `$.a[0].b`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Returns the path of the document root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Returns a new path extended by an object key.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    /// Returns a new path extended by an array index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    /// Number of segments below the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The individual segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the last key in the path, if the path ends in a key.
    #[must_use]
    pub fn last_key(&self) -> Option<&str> {
        match self.segments.last() {
            Some(PathSegment::Key(key)) => Some(key.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Why a value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationReason {
    /// A mandatory object member is absent.
    #[error("required field is missing")]
    MissingField,

    /// The value has the wrong JSON type.
    #[error("expected {expected}, found {found}")]
    WrongType {
        /// Type demanded by the schema.
        expected: JsonType,
        /// Type actually present.
        found: JsonType,
    },

    /// A string did not equal any of the permitted literals.
    #[error("expected one of [{}], found {found:?}", .expected.join(", "))]
    UnexpectedLiteral {
        /// Permitted literal values.
        expected: Vec<String>,
        /// The offending value.
        found: String,
    },

    /// An object key does not match the required pattern.
    #[error("key {key:?} does not match {pattern}")]
    KeyPattern {
        /// The offending key.
        key: String,
        /// The pattern every key must match.
        pattern: String,
    },
}

/// A document failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    /// Deepest path at which validation failed.
    pub path: FieldPath,
    /// What was wrong at that path.
    pub reason: ViolationReason,
}

impl SchemaViolation {
    /// Creates a violation at `path`.
    #[must_use]
    pub const fn new(path: FieldPath, reason: ViolationReason) -> Self {
        Self { path, reason }
    }
}

/// An action name outside `parameter`, `request`, and `revoke`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid plugin action {action:?}: expected one of parameter, request, revoke")]
pub struct UnknownAction {
    /// The rejected action name.
    pub action: String,
}
