//! Wire types and framing for the Stagelink command protocol.
//!
//! The protocol carries one JSON document per message in both directions,
//! UTF-8 encoded, with no length prefix: a message boundary is "the buffer
//! parses as one complete document". This crate owns the message envelopes
//! exchanged between client and server, the incremental framing logic, and
//! the read-only versus mutating classification both sides agree on.

mod classify;
mod framing;
mod message;

pub use classify::{CommandClass, DEFERRED_COMMANDS, classify};
pub use framing::{DEFAULT_MAX_MESSAGE_BYTES, FrameBuffer, FrameError, FrameProgress, write_message};
pub use message::{Command, Response};
