//! The input specification pipeline.
//!
//! [`specify`] turns a baseline [`Document`] and the user's
//! [`InputOverrides`] into a complete, schema-valid plugin request. The steps
//! run in a fixed order and later steps win on key conflicts:
//!
//! 1. config extraction replaces `conf_params` wholesale,
//! 2. a JSON file is shallow-merged over the document,
//! 3. inline JSON is shallow-merged over that,
//! 4. `watts_userid` is derived from `user_info`,
//! 5. the action is resolved and checked,
//! 6. the document is validated against the input schema.
//!
//! The pipeline never returns a document that failed validation.

mod conf;
mod user_id;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use watts_schemes::{Action, SchemaRegistry, UnknownAction};

use crate::document::Document;
use crate::error::InputError;

pub use self::conf::extract_conf_params;
pub use self::user_id::derive_user_id;

/// Tracing target for input specification.
const INPUT_TARGET: &str = "watts_plugins::input";

/// A WaTTS service configuration to take `conf_params` from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    /// Path of the WaTTS configuration file.
    pub path: PathBuf,
    /// Service identifier whose plugin settings are extracted.
    pub identifier: Option<String>,
}

/// Inline JSON merged after the JSON file.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineJson {
    /// Raw text supplied by the user; parsed during specification.
    Text(String),
    /// An already-decoded fragment, such as a test case input.
    Fragment(Document),
}

/// Everything a user can contribute on top of the baseline document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputOverrides {
    /// WaTTS configuration to extract `conf_params` from.
    pub config: Option<ConfigSource>,
    /// JSON file merged over the document.
    pub json_file: Option<PathBuf>,
    /// Inline JSON merged after the file.
    pub inline: Option<InlineJson>,
    /// Explicitly requested action; wins over the document's own `action`.
    pub action: Option<String>,
}

impl InputOverrides {
    /// Returns a copy whose inline JSON is replaced by `fragment`.
    #[must_use]
    pub fn with_fragment(&self, fragment: Document) -> Self {
        Self {
            inline: Some(InlineJson::Fragment(fragment)),
            ..self.clone()
        }
    }
}

/// A specified, schema-valid plugin request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecifiedInput {
    document: Document,
    action: Action,
}

impl SpecifiedInput {
    /// The validated document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// The resolved action.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.action
    }

    /// The protocol version the document asks for, if it names one.
    #[must_use]
    pub fn watts_version(&self) -> Option<&str> {
        self.document.watts_version()
    }

    /// Consumes the input, returning the document.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Assembles a complete plugin request from `baseline` and `overrides`.
///
/// # Errors
///
/// Returns [`InputError::InvalidUserInput`] when an override is not JSON,
/// [`InputError::ConfigNotFound`] when the service identifier matches no
/// config lines, [`InputError::UnknownAction`] for actions outside the
/// protocol, and [`InputError::SchemaViolation`] when the assembled document
/// does not satisfy the input schema.
pub fn specify(
    registry: &SchemaRegistry,
    baseline: Document,
    overrides: &InputOverrides,
) -> Result<SpecifiedInput, InputError> {
    let mut document = baseline;

    if let Some(config) = &overrides.config {
        let conf_params = read_conf_params(config)?;
        document.insert("conf_params", Value::Object(conf_params));
    }

    if let Some(path) = &overrides.json_file {
        document.merge(read_json_file(path)?);
    }

    match &overrides.inline {
        Some(InlineJson::Text(text)) => document.merge(parse_object(text, "--json")?),
        Some(InlineJson::Fragment(fragment)) => document.merge(fragment.clone()),
        None => {}
    }

    let user_info = document.get("user_info").ok_or(InputError::InvalidUserInfo)?;
    let user_id = derive_user_id(user_info)?;
    document.insert("watts_userid", Value::String(user_id));

    let action = resolve_action(&mut document, overrides.action.as_deref())?;

    registry
        .validate_input(action, &document.to_value())
        .map_err(|violation| InputError::SchemaViolation { violation })?;

    debug!(
        target: INPUT_TARGET,
        %action,
        members = document.as_map().len(),
        "plugin input specified"
    );
    Ok(SpecifiedInput { document, action })
}

fn read_conf_params(config: &ConfigSource) -> Result<serde_json::Map<String, Value>, InputError> {
    let text = read_file(&config.path)?;
    let identifier = config
        .identifier
        .as_deref()
        .ok_or_else(|| InputError::MissingConfigIdentifier {
            path: config.path.clone(),
        })?;
    let conf_params = extract_conf_params(&text, identifier);
    debug!(
        target: INPUT_TARGET,
        identifier,
        matches = conf_params.len(),
        "extracted plugin settings from config"
    );
    if conf_params.is_empty() {
        return Err(InputError::ConfigNotFound {
            identifier: identifier.to_owned(),
            path: config.path.clone(),
        });
    }
    Ok(conf_params)
}

fn read_json_file(path: &Path) -> Result<Document, InputError> {
    let text = read_file(path)?;
    parse_object(&text, &path.display().to_string())
}

fn read_file(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::ReadFile {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}

/// Parses user-supplied JSON text that must be an object.
///
/// # Errors
///
/// Returns [`InputError::InvalidUserInput`] for malformed JSON and
/// [`InputError::NotAnObject`] for any other JSON value.
pub fn parse_object(text: &str, origin: &str) -> Result<Document, InputError> {
    let value: Value = serde_json::from_str(text).map_err(|error| InputError::InvalidUserInput {
        origin: origin.to_owned(),
        message: error.to_string(),
    })?;
    Document::from_value(value).ok_or_else(|| InputError::NotAnObject {
        origin: origin.to_owned(),
    })
}

fn resolve_action(document: &mut Document, requested: Option<&str>) -> Result<Action, InputError> {
    if let Some(name) = requested {
        let action = Action::parse(name)?;
        document.insert("action", Value::String(action.as_str().to_owned()));
        return Ok(action);
    }
    match document.get("action") {
        Some(Value::String(name)) => Ok(Action::parse(name)?),
        Some(other) => Err(InputError::UnknownAction(UnknownAction {
            action: other.to_string(),
        })),
        None => Err(InputError::MissingAction),
    }
}

#[cfg(test)]
mod tests;
