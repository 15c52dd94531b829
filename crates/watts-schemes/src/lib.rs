//! Versioned schema registry for the WaTTS plugin protocol.
//!
//! A WaTTS plugin is an external executable that receives a JSON request and
//! answers with a single JSON document. The shape of that answer depends on
//! the protocol version and on the requested [`Action`]. This crate declares
//! those shapes as structural [`Schema`] trees and bundles them into an
//! immutable [`SchemaRegistry`] keyed by version, then by action.
//!
//! The registry also carries the schema for the *input* document handed to a
//! plugin, which is deliberately looser for the `parameter` action.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use watts_schemes::{Action, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builtin();
//! let output = json!({
//!     "result": "ok",
//!     "version": "1.0.0",
//!     "conf_params": [],
//!     "request_params": [],
//! });
//! assert!(registry.validate("1.0.0", Action::Parameter, &output).is_ok());
//!
//! // Unknown versions fall back to the default version.
//! assert!(registry.validate("9.9.9", Action::Parameter, &output).is_ok());
//! ```

pub mod action;
pub mod error;
pub mod registry;
pub mod request;
pub mod schema;

pub use self::action::Action;
pub use self::error::{
    FieldPath, JsonType, PathSegment, SchemaViolation, UnknownAction, ViolationReason,
};
pub use self::registry::{
    DEFAULT_VERSION, InputSchema, ResolvedVersion, SchemaRegistry, VersionSchemas,
};
pub use self::request::{RequestResult, RequestSchema};
pub use self::schema::{ObjectSchema, Schema, Validator};
