//! Tagged-union validation for `request` action output.
//!
//! Plugin answers to a `request` are discriminated by their `result` member.
//! Validation is two-phase: the shared envelope is checked first, then the
//! discriminant selects exactly one variant schema. The variants are not
//! folded into a single flat schema.

use std::str::FromStr;

use serde_json::Value;
use strum::{Display, EnumString, VariantNames};

use crate::error::{FieldPath, JsonType, SchemaViolation, ViolationReason};
use crate::schema::{Schema, Validator};

/// Discriminant of a `request` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum RequestResult {
    /// The plugin failed and explains why.
    Error,
    /// The plugin needs the user to log in with another provider first.
    OidcLogin,
    /// The plugin issued credentials.
    Ok,
}

/// Validator for `request` answers: an envelope plus one schema per
/// [`RequestResult`].
///
/// ```
/// use serde_json::json;
/// use watts_schemes::{RequestSchema, Validator};
///
/// let schema = RequestSchema::v1();
/// let answer = json!({"result": "oidc_login", "provider": "egi", "msg": "log in"});
/// assert!(schema.validate(&answer).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RequestSchema {
    envelope: Schema,
    error: Schema,
    oidc_login: Schema,
    ok: Schema,
}

impl RequestSchema {
    /// Builds a request schema from one schema per variant.
    #[must_use]
    pub fn new(error: Schema, oidc_login: Schema, ok: Schema) -> Self {
        Self {
            envelope: Schema::object([("result", Schema::enumeration(RequestResult::VARIANTS))]),
            error,
            oidc_login,
            ok,
        }
    }

    /// The protocol 1.0.0 shapes.
    #[must_use]
    pub fn v1() -> Self {
        let credential = Schema::object([
            ("name", Schema::string()),
            ("type", Schema::string()),
            ("value", Schema::string()),
            ("save_as", Schema::optional(Schema::string())),
            ("rows", Schema::optional(Schema::number())),
            ("cols", Schema::optional(Schema::number())),
        ]);
        Self::new(
            Schema::object([
                ("result", Schema::literal("error")),
                ("user_msg", Schema::string()),
                ("log_msg", Schema::string()),
            ]),
            Schema::object([
                ("result", Schema::literal("oidc_login")),
                ("provider", Schema::string()),
                ("msg", Schema::string()),
            ]),
            Schema::object([
                ("result", Schema::literal("ok")),
                ("credential", Schema::array_of(credential)),
                ("state", Schema::string()),
            ]),
        )
    }

    /// Returns the schema selected by `result`.
    #[must_use]
    pub const fn variant(&self, result: RequestResult) -> &Schema {
        match result {
            RequestResult::Error => &self.error,
            RequestResult::OidcLogin => &self.oidc_login,
            RequestResult::Ok => &self.ok,
        }
    }

    /// Validates only the envelope and decodes the discriminant.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] at `$.result` when the member is missing
    /// or not one of the known discriminants.
    pub fn discriminant(&self, value: &Value) -> Result<RequestResult, SchemaViolation> {
        self.envelope.validate(value)?;
        let path = FieldPath::root().key("result");
        let tag = value
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SchemaViolation::new(
                    path.clone(),
                    ViolationReason::WrongType {
                        expected: JsonType::String,
                        found: value.get("result").map_or(JsonType::Null, JsonType::of),
                    },
                )
            })?;
        RequestResult::from_str(tag).map_err(|_| {
            SchemaViolation::new(
                path,
                ViolationReason::UnexpectedLiteral {
                    expected: RequestResult::VARIANTS
                        .iter()
                        .map(|name| (*name).to_owned())
                        .collect(),
                    found: tag.to_owned(),
                },
            )
        })
    }
}

impl Validator for RequestSchema {
    fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        let result = self.discriminant(value)?;
        self.variant(result).validate(value)
    }
}
