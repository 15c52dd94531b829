//! Protocol actions a plugin can be asked to perform.

use std::str::FromStr;

use strum::{Display, EnumString, VariantNames};

use crate::error::UnknownAction;

/// The protocol exchange a plugin is asked to take part in.
///
/// Parsing is strict: only the three lowercase action names are accepted.
///
/// ```
/// use watts_schemes::Action;
///
/// assert_eq!(Action::parse("revoke"), Ok(Action::Revoke));
/// assert!(Action::parse("delete").is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, VariantNames,
)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// Ask the plugin to describe its configuration and request parameters.
    Parameter,
    /// Ask the plugin to issue a credential.
    Request,
    /// Ask the plugin to revoke a previously issued credential.
    Revoke,
}

impl Action {
    /// Parses an action name, rejecting anything outside the protocol.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownAction`] when `name` is not `parameter`, `request`,
    /// or `revoke`.
    pub fn parse(name: &str) -> Result<Self, UnknownAction> {
        Self::from_str(name).map_err(|_| UnknownAction {
            action: name.to_owned(),
        })
    }

    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::Request => "request",
            Self::Revoke => "revoke",
        }
    }
}
