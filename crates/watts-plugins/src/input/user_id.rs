//! Derivation of `watts_userid` from the user's issuer and subject.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use crate::error::InputError;

/// Derives the WaTTS user id from a `user_info` object.
///
/// The `iss` and `sub` claims are packed into `{"issuer", "subject"}`,
/// serialised compactly, every `/` is escaped as `\/`, and the result is
/// base64url-encoded without padding. `<`, `>`, `&`, U+2028 and U+2029 are
/// written as `\uXXXX` escapes so that claims containing them yield the same
/// id as the WaTTS service computes.
///
/// # Errors
///
/// Returns [`InputError::InvalidUserInfo`] when `user_info` is not an object.
pub fn derive_user_id(user_info: &Value) -> Result<String, InputError> {
    let Value::Object(claims) = user_info else {
        return Err(InputError::InvalidUserInfo);
    };
    let reduced = json!({
        "issuer": claims.get("iss").cloned().unwrap_or(Value::Null),
        "subject": claims.get("sub").cloned().unwrap_or(Value::Null),
    });
    let serialised = serde_json::to_string(&reduced).map_err(|error| InputError::Serialize {
        what: "user id",
        message: error.to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(escape_claims(&serialised)))
}

fn escape_claims(serialised: &str) -> String {
    let mut escaped = String::with_capacity(serialised.len());
    for character in serialised.chars() {
        match character {
            '/' => escaped.push_str("\\/"),
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }
    escaped
}
