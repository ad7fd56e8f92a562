//! Command and response envelopes carried over the command socket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A client request: a flat command name plus handler-specific parameters.
///
/// `params` is intentionally untyped at this level; validating individual
/// fields (and applying their documented defaults) is the receiving
/// handler's responsibility.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Command {
    /// Command name selecting the handler.
    #[serde(rename = "type")]
    pub name: String,
    /// Handler-specific parameters, defaulting to an empty mapping.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Command {
    /// Builds a command with parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Builds a parameterless command.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Map::new())
    }
}

/// The server's reply to a single command.
///
/// Exactly one response is produced per command, in order, on the same
/// connection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// The command completed; `result` carries the handler's value.
    Success {
        /// Handler-specific result payload.
        result: Value,
    },
    /// The command failed; `message` describes why.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub const fn success(result: Value) -> Self {
        Self::Success { result }
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this response reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
