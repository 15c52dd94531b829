//! Immutable registry of protocol schemas keyed by version and action.
//!
//! The [`SchemaRegistry`] is built once at start-up and passed explicitly to
//! every component that validates documents. Lookups for an unknown protocol
//! version fall back to [`DEFAULT_VERSION`]; callers that care which version
//! was actually used should inspect the [`ResolvedVersion`].

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use crate::action::Action;
use crate::error::SchemaViolation;
use crate::request::RequestSchema;
use crate::schema::{Schema, Validator};

/// Protocol version used when a document names an unknown version.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Keys of `conf_params` and `params` must match this pattern.
const PARAMETER_KEY_PATTERN: &str = "^[a-z0-9_]+$";

/// Output schemas for one protocol version.
#[derive(Debug, Clone)]
pub struct VersionSchemas {
    parameter: Schema,
    request: RequestSchema,
    revoke: Schema,
}

impl VersionSchemas {
    /// Bundles the output schema of each action.
    #[must_use]
    pub const fn new(parameter: Schema, request: RequestSchema, revoke: Schema) -> Self {
        Self {
            parameter,
            request,
            revoke,
        }
    }

    /// The protocol 1.0.0 output schemas.
    #[must_use]
    pub fn v1() -> Self {
        let request_param = Schema::object([
            ("key", Schema::string()),
            ("name", Schema::string()),
            ("description", Schema::string()),
            ("type", Schema::string()),
            ("mandatory", Schema::boolean()),
        ]);
        let conf_param = Schema::object([
            ("name", Schema::string()),
            ("type", Schema::string()),
            ("default", Schema::string()),
        ]);
        let parameter = Schema::object([
            ("result", Schema::literal("ok")),
            ("version", Schema::string()),
            ("conf_params", Schema::array_of(conf_param)),
            (
                "request_params",
                Schema::array_of(Schema::array_of(request_param)),
            ),
        ]);
        let revoke = Schema::one_of(vec![
            Schema::object([
                ("result", Schema::literal("error")),
                ("user_msg", Schema::string()),
                ("log_msg", Schema::string()),
            ]),
            Schema::object([("result", Schema::literal("ok"))]),
        ]);
        Self::new(parameter, RequestSchema::v1(), revoke)
    }

    /// Returns the output validator for `action`.
    #[must_use]
    pub fn for_action(&self, action: Action) -> &dyn Validator {
        match action {
            Action::Parameter => &self.parameter,
            Action::Request => &self.request,
            Action::Revoke => &self.revoke,
        }
    }
}

/// Schema of the document handed *to* a plugin.
///
/// The `parameter` action only needs `action` and `watts_version`; every
/// other action requires the full document.
#[derive(Debug, Clone)]
pub struct InputSchema {
    loose: Schema,
    strict: Schema,
}

impl InputSchema {
    /// The built-in input schema.
    #[must_use]
    pub fn builtin() -> Self {
        let user_info = || Schema::object([("iss", Schema::string()), ("sub", Schema::string())]);
        let access_token = || Schema::optional(Schema::string());
        let params = || Schema::keys_matching(parameter_key_pattern());

        let loose = Schema::object([
            ("action", Schema::literal(Action::Parameter.as_str())),
            ("watts_version", Schema::string()),
        ]);
        let strict = Schema::object([
            ("action", Schema::string()),
            ("watts_version", Schema::string()),
            ("watts_userid", Schema::string()),
            ("cred_state", Schema::string()),
            ("access_token", access_token()),
            (
                "additional_logins",
                Schema::array_of(Schema::object([
                    ("user_info", user_info()),
                    ("access_token", access_token()),
                ])),
            ),
            ("conf_params", params()),
            ("params", params()),
            ("user_info", user_info()),
        ]);
        Self { loose, strict }
    }

    /// Returns the schema that applies to documents for `action`.
    #[must_use]
    pub const fn for_action(&self, action: Action) -> &Schema {
        match action {
            Action::Parameter => &self.loose,
            Action::Request | Action::Revoke => &self.strict,
        }
    }
}

#[expect(
    clippy::expect_used,
    reason = "the pattern is a compile-time constant covered by unit tests"
)]
fn parameter_key_pattern() -> Regex {
    Regex::new(PARAMETER_KEY_PATTERN).expect("parameter key pattern is valid")
}

/// A version lookup after fallback.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedVersion<'a> {
    /// The version whose schemas were selected.
    pub version: &'a str,
    /// Whether the requested version was unknown and the default was used.
    pub fell_back: bool,
    /// The selected schemas.
    pub schemas: &'a VersionSchemas,
}

/// Immutable map from protocol version to [`VersionSchemas`].
///
/// # Example
///
/// ```
/// use watts_schemes::{Action, SchemaRegistry};
///
/// let registry = SchemaRegistry::builtin();
/// let resolved = registry.resolve("2.0.0");
/// assert_eq!(resolved.version, "1.0.0");
/// assert!(resolved.fell_back);
/// ```
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    default_version: String,
    default_schemas: VersionSchemas,
    versions: BTreeMap<String, VersionSchemas>,
    input: InputSchema,
}

impl SchemaRegistry {
    /// The registry with every protocol version this tool knows.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(DEFAULT_VERSION, VersionSchemas::v1(), InputSchema::builtin())
    }

    /// Creates a registry whose only version is `default_version`.
    #[must_use]
    pub fn new(
        default_version: impl Into<String>,
        schemas: VersionSchemas,
        input: InputSchema,
    ) -> Self {
        Self {
            default_version: default_version.into(),
            default_schemas: schemas,
            versions: BTreeMap::new(),
            input,
        }
    }

    /// Adds another protocol version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>, schemas: VersionSchemas) -> Self {
        let version = version.into();
        if version == self.default_version {
            self.default_schemas = schemas;
        } else {
            self.versions.insert(version, schemas);
        }
        self
    }

    /// The fallback protocol version.
    #[must_use]
    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// All known protocol versions, default first.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default_version.as_str())
            .chain(self.versions.keys().map(String::as_str))
    }

    /// Resolves `requested` to a known version, falling back to the default.
    ///
    /// A leading `v` is ignored, so `v1.0.0` resolves like `1.0.0`.
    #[must_use]
    pub fn resolve(&self, requested: &str) -> ResolvedVersion<'_> {
        let normalised = requested.trim().trim_start_matches('v');
        if normalised == self.default_version {
            return self.default_resolution(false);
        }
        self.versions.get_key_value(normalised).map_or_else(
            || self.default_resolution(true),
            |(version, schemas)| ResolvedVersion {
                version,
                fell_back: false,
                schemas,
            },
        )
    }

    fn default_resolution(&self, fell_back: bool) -> ResolvedVersion<'_> {
        ResolvedVersion {
            version: &self.default_version,
            fell_back,
            schemas: &self.default_schemas,
        }
    }

    /// Validates plugin `output` for `(version, action)`.
    ///
    /// # Errors
    ///
    /// Returns the deepest [`SchemaViolation`] when `output` does not conform.
    pub fn validate(
        &self,
        version: &str,
        action: Action,
        output: &Value,
    ) -> Result<(), SchemaViolation> {
        self.resolve(version).schemas.for_action(action).validate(output)
    }

    /// Validates a plugin input document for `action`.
    ///
    /// # Errors
    ///
    /// Returns the deepest [`SchemaViolation`] when `document` does not
    /// conform.
    pub fn validate_input(&self, action: Action, document: &Value) -> Result<(), SchemaViolation> {
        self.input.for_action(action).validate(document)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
