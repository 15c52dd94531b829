//! The JSON request document handed to a plugin.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use watts_schemes::DEFAULT_VERSION;

/// A plugin request: a JSON object keyed by field name.
///
/// Documents are plain data; nothing here validates them. The
/// [`input`](crate::input) pipeline is the only producer of documents that
/// are considered usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// The baseline input every specification starts from.
    ///
    /// ```
    /// use watts_plugins::Document;
    ///
    /// let document = Document::default_input();
    /// assert_eq!(document.action(), Some("parameter"));
    /// assert_eq!(document.watts_version(), Some("1.0.0"));
    /// ```
    #[must_use]
    pub fn default_input() -> Self {
        let value = json!({
            "action": "parameter",
            "watts_version": DEFAULT_VERSION,
            "cred_state": "undefined",
            "conf_params": {},
            "params": {},
            "user_info": {
                "iss": "https://issuer.example.com",
                "sub": "123456789",
            },
            "additional_logins": [],
        });
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Wraps an existing JSON object.
    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Converts a JSON value into a document if it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Shallow-merges `overrides` into the document.
    ///
    /// Top-level keys of `overrides` replace existing keys wholesale; nested
    /// objects are not merged recursively.
    pub fn merge(&mut self, overrides: Self) {
        self.0.extend(overrides.0);
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stores `value` under `key`, returning any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// The `action` member, when it is a string.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.get("action").and_then(Value::as_str)
    }

    /// The `watts_version` member, when it is a string.
    #[must_use]
    pub fn watts_version(&self) -> Option<&str> {
        self.get("watts_version").and_then(Value::as_str)
    }

    /// Borrows the underlying object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns the document as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Consumes the document, returning the underlying object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Self::Object(document.0)
    }
}
