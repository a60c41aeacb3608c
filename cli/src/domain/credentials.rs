//! Registry credential decoding
//!
//! Registry providers hand out short-lived authorization tokens as a base64
//! envelope around `username:password`. A malformed or expired response tends
//! to decode into an empty half rather than fail at the transport level, so
//! both halves are checked explicitly.

use base64::Engine;
use std::fmt;

use crate::error::CredentialsError;

/// Resolved login for a registry
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login endpoint (e.g., "https://123456789012.dkr.ecr.us-east-1.amazonaws.com")
    pub server: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decode a base64 `username:password` authorization token
///
/// Splits on the first colon, so passwords may themselves contain colons.
///
/// # Errors
///
/// * `CredentialsError::MissingServer` if `server` is empty
/// * `CredentialsError::Decode` if the token is not base64 or not UTF-8
/// * `CredentialsError::Invalid` if there is no colon, or either half is empty
pub fn decode_authorization_token(
    token: &str,
    server: &str,
) -> Result<Credentials, CredentialsError> {
    if server.trim().is_empty() {
        return Err(CredentialsError::MissingServer);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(token.trim())
        .map_err(|e| CredentialsError::Decode {
            message: e.to_string(),
        })?;

    let decoded = String::from_utf8(bytes).map_err(|e| CredentialsError::Decode {
        message: e.to_string(),
    })?;

    let (username, password) = decoded.split_once(':').ok_or(CredentialsError::Invalid)?;

    if username.is_empty() || password.is_empty() {
        return Err(CredentialsError::Invalid);
    }

    Ok(Credentials {
        server: server.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    })
}
