//! Error taxonomy for client-side command calls.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by [`crate::Client`] calls.
///
/// Transport failures (`Connect`, `Send`, `Receive`, `ResponseTimeout`,
/// `ConnectionClosed`, `IncompleteResponse`, `ResponseTooLarge`) invalidate
/// the persistent connection so the next call reconnects. A [`Self::Host`]
/// error is the server's own structured reply and leaves the connection
/// intact.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured host name did not resolve.
    #[error("failed to resolve host bridge address {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// One connection attempt failed outright.
    #[error("failed to connect to the host bridge at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Every connection attempt failed or failed validation.
    #[error(
        "could not establish a validated connection to {endpoint} after {attempts} attempts; \
         is the host bridge running?"
    )]
    Exhausted { endpoint: String, attempts: u32 },
    /// The command could not be serialised.
    #[error("failed to serialise command: {0}")]
    Serialise(#[source] serde_json::Error),
    /// Writing the command failed.
    #[error("failed to send command: {source}")]
    Send {
        #[source]
        source: io::Error,
    },
    /// Reading the response failed.
    #[error("failed to read response: {source}")]
    Receive {
        #[source]
        source: io::Error,
    },
    /// No response bytes arrived within the bound.
    #[error("timed out after {waited:?} waiting for a response")]
    ResponseTimeout { waited: Duration },
    /// The stream ended or timed out with a partial response accumulated.
    #[error("incomplete response received from the host bridge")]
    IncompleteResponse,
    /// The server closed the connection before sending anything.
    #[error("connection closed before receiving any data")]
    ConnectionClosed,
    /// The response outgrew the configured receive buffer.
    #[error("response exceeded the receive buffer limit: {0}")]
    ResponseTooLarge(#[source] stagelink_protocol::FrameError),
    /// The response parsed as JSON but not as a response envelope.
    #[error("malformed response from the host bridge: {0}")]
    MalformedResponse(#[source] serde_json::Error),
    /// The host reported a structured command failure.
    #[error("{message}")]
    Host { message: String },
}
