//! Client error types

use serde_json::Value;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
///
/// Callers can always tell client misuse ([`ClientError::InvalidArgument`])
/// apart from an unreachable server ([`ClientError::Transport`]), a server
/// rejection ([`ClientError::Api`]) and a missing session
/// ([`ClientError::Authentication`]).
#[derive(Error, Debug)]
pub enum ClientError {
    /// A required argument was empty or malformed. Raised before any I/O.
    #[error("invalid argument `{name}` (position {position}): {reason}")]
    InvalidArgument {
        name: &'static str,
        position: usize,
        reason: String,
    },

    /// No usable HTTP response was obtained
    #[error("transport failure (status {status}): {message}")]
    Transport { status: u16, message: String },

    /// The server returned a well-formed error envelope
    #[error("API error {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Authentication did not complete or no session is held
    #[error("authentication failed: {reason}")]
    Authentication {
        reason: String,
        #[source]
        source: Option<Box<ClientError>>,
    },

    /// The response did not have the shape the operation expects
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request signing failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The adapter backing an item or share has been dropped
    #[error("the adapter for this item is no longer alive")]
    Detached,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

impl ClientError {
    pub(crate) fn invalid_argument(
        name: &'static str,
        position: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            name,
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_authenticated() -> Self {
        Self::Authentication {
            reason: "no access token held; call authenticate first".to_string(),
            source: None,
        }
    }

    /// Build an API error from an error envelope.
    ///
    /// Accepts both `{"error": code, "error_description": msg}` and
    /// `{"error": {"code": code, "message": msg}}`.
    pub fn from_envelope(envelope: &Value, status: u16) -> Option<Self> {
        let error = envelope.get("error").filter(|e| !e.is_null())?;

        let (code, message) = match error {
            Value::Object(obj) => (
                obj.get("code").map(value_to_string),
                obj.get("message").map(value_to_string),
            ),
            other => (
                Some(value_to_string(other)),
                envelope.get("error_description").map(value_to_string),
            ),
        };

        Some(Self::Api {
            status,
            code: code.unwrap_or_else(|| format!("HTTP{}", status)),
            message: message.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    /// Check if this is a client misuse error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Check if no usable response was obtained
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if the server rejected the request
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Check if this is an authentication error
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
            || matches!(
                self,
                Self::Api { code, .. } if code == "404" || code.eq_ignore_ascii_case("not_found")
            )
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
