//! Error type shared by every command handler.

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::host::HostError;

/// Failures raised while executing a single command.
///
/// These are caught at the dispatch boundary and serialised into a
/// `status = "error"` response; the connection stays open.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The song model rejected the request.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A parameter was present but unusable.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParam { name: String, message: String },

    /// The scheduler bridge gave up waiting for the operation.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Something unexpected happened inside a handler.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CommandError {
    /// Builds an invalid-parameter error.
    pub fn invalid_param(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Builds an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
