//! Declarative structural validators for JSON values.
//!
//! A [`Schema`] describes the shape of a value: field presence, primitive
//! types, literal constraints, homogeneous arrays, and object key patterns.
//! Validation walks the value alongside the schema and reports the deepest
//! path at which the two disagree.

use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{FieldPath, JsonType, SchemaViolation, ViolationReason};

/// Anything that can structurally validate a JSON value.
///
/// Implemented by [`Schema`] and by the tagged-union
/// [`RequestSchema`](crate::RequestSchema).
pub trait Validator: fmt::Debug + Send + Sync {
    /// Validates `value`, returning the deepest violation on failure.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] describing where and why the value does
    /// not conform.
    fn validate(&self, value: &Value) -> Result<(), SchemaViolation>;
}

/// A structural description of a JSON value.
///
/// ```
/// use serde_json::json;
/// use watts_schemes::{Schema, Validator};
///
/// let schema = Schema::object([
///     ("name", Schema::string()),
///     ("rows", Schema::optional(Schema::number())),
/// ]);
/// assert!(schema.validate(&json!({"name": "x"})).is_ok());
///
/// let violation = schema.validate(&json!({"name": 3})).unwrap_err();
/// assert_eq!(violation.path.to_string(), "$.name");
/// ```
#[derive(Debug, Clone)]
pub enum Schema {
    /// Any string.
    String,
    /// A string equal to one of the listed literals.
    Literal(Vec<&'static str>),
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// The inner schema, or an absent/`null` value.
    Optional(Box<Self>),
    /// An array whose every element matches the inner schema.
    Array(Box<Self>),
    /// An object with declared members.
    Object(ObjectSchema),
    /// The first alternative that matches.
    OneOf(Vec<Self>),
}

impl Schema {
    /// Any string.
    #[must_use]
    pub const fn string() -> Self {
        Self::String
    }

    /// A string that must equal `literal`.
    #[must_use]
    pub fn literal(literal: &'static str) -> Self {
        Self::Literal(vec![literal])
    }

    /// A string that must equal one of `literals`.
    #[must_use]
    pub fn enumeration(literals: &[&'static str]) -> Self {
        Self::Literal(literals.to_vec())
    }

    /// Any JSON number.
    #[must_use]
    pub const fn number() -> Self {
        Self::Number
    }

    /// A boolean.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::Boolean
    }

    /// Makes `inner` optional.
    #[must_use]
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// An array of `element` values.
    #[must_use]
    pub fn array_of(element: Self) -> Self {
        Self::Array(Box::new(element))
    }

    /// An object with the listed members. Undeclared members are permitted.
    #[must_use]
    pub fn object<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Self)>,
    {
        Self::Object(ObjectSchema::new(fields))
    }

    /// An object whose keys must all match `pattern`.
    #[must_use]
    pub fn keys_matching(pattern: Regex) -> Self {
        Self::Object(ObjectSchema {
            fields: Vec::new(),
            key_pattern: Some(pattern),
        })
    }

    /// The first of `alternatives` that accepts the value.
    #[must_use]
    pub const fn one_of(alternatives: Vec<Self>) -> Self {
        Self::OneOf(alternatives)
    }

    fn check(&self, value: &Value, path: &FieldPath) -> Result<(), SchemaViolation> {
        match self {
            Self::String => expect_string(value, path).map(drop),
            Self::Literal(literals) => {
                let found = expect_string(value, path)?;
                if literals.iter().any(|literal| *literal == found) {
                    Ok(())
                } else {
                    Err(SchemaViolation::new(
                        path.clone(),
                        ViolationReason::UnexpectedLiteral {
                            expected: literals
                                .iter()
                                .map(|literal| (*literal).to_owned())
                                .collect(),
                            found: found.to_owned(),
                        },
                    ))
                }
            }
            Self::Number => expect_type(value, JsonType::Number, path),
            Self::Boolean => expect_type(value, JsonType::Boolean, path),
            Self::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.check(value, path)
                }
            }
            Self::Array(element) => {
                let Value::Array(items) = value else {
                    return Err(wrong_type(JsonType::Array, value, path));
                };
                items
                    .iter()
                    .enumerate()
                    .try_for_each(|(index, item)| element.check(item, &path.index(index)))
            }
            Self::Object(object) => object.check(value, path),
            Self::OneOf(alternatives) => check_alternatives(alternatives, value, path),
        }
    }

    const fn accepts_absent(&self) -> bool {
        matches!(self, Self::Optional(_))
    }
}

impl Validator for Schema {
    fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.check(value, &FieldPath::root())
    }
}

/// Member declarations and key constraints for an object.
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    fields: Vec<(&'static str, Schema)>,
    key_pattern: Option<Regex>,
}

impl ObjectSchema {
    /// Declares an object with the given members.
    #[must_use]
    pub fn new<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Schema)>,
    {
        Self {
            fields: fields.into_iter().collect(),
            key_pattern: None,
        }
    }

    /// Requires every key of the object to match `pattern`.
    #[must_use]
    pub fn with_key_pattern(mut self, pattern: Regex) -> Self {
        self.key_pattern = Some(pattern);
        self
    }

    fn check(&self, value: &Value, path: &FieldPath) -> Result<(), SchemaViolation> {
        let Value::Object(members) = value else {
            return Err(wrong_type(JsonType::Object, value, path));
        };
        self.check_keys(members, path)?;
        for (name, schema) in &self.fields {
            let field_path = path.key(*name);
            match members.get(*name) {
                Some(member) => schema.check(member, &field_path)?,
                None if schema.accepts_absent() => {}
                None => {
                    return Err(SchemaViolation::new(
                        field_path,
                        ViolationReason::MissingField,
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_keys(
        &self,
        members: &Map<String, Value>,
        path: &FieldPath,
    ) -> Result<(), SchemaViolation> {
        let Some(pattern) = &self.key_pattern else {
            return Ok(());
        };
        members
            .keys()
            .find(|key| !pattern.is_match(key))
            .map_or(Ok(()), |key| {
                Err(SchemaViolation::new(
                    path.key(key.as_str()),
                    ViolationReason::KeyPattern {
                        key: key.clone(),
                        pattern: pattern.as_str().to_owned(),
                    },
                ))
            })
    }
}

fn check_alternatives(
    alternatives: &[Schema],
    value: &Value,
    path: &FieldPath,
) -> Result<(), SchemaViolation> {
    let mut deepest: Option<SchemaViolation> = None;
    for alternative in alternatives {
        match alternative.check(value, path) {
            Ok(()) => return Ok(()),
            Err(violation) => {
                let replace = deepest
                    .as_ref()
                    .is_none_or(|current| violation.path.depth() > current.path.depth());
                if replace {
                    deepest = Some(violation);
                }
            }
        }
    }
    deepest.map_or(Ok(()), Err)
}

fn expect_string<'a>(value: &'a Value, path: &FieldPath) -> Result<&'a str, SchemaViolation> {
    value
        .as_str()
        .ok_or_else(|| wrong_type(JsonType::String, value, path))
}

fn expect_type(value: &Value, expected: JsonType, path: &FieldPath) -> Result<(), SchemaViolation> {
    if JsonType::of(value) == expected {
        Ok(())
    } else {
        Err(wrong_type(expected, value, path))
    }
}

fn wrong_type(expected: JsonType, value: &Value, path: &FieldPath) -> SchemaViolation {
    SchemaViolation::new(
        path.clone(),
        ViolationReason::WrongType {
            expected,
            found: JsonType::of(value),
        },
    )
}
