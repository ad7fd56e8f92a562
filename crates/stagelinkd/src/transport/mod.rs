//! Socket listener and connection accounting for the command server.
//!
//! The transport module binds the command socket, accepts connections in a
//! background thread, and enforces the live-connection ceiling through a
//! mutex-guarded registry injected into the accept loop.

mod errors;
mod listener;
mod registry;

pub(crate) use self::listener::{CommandListener, ConnectionHandler, ListenerHandle};

pub use self::errors::ListenerError;
pub use self::registry::ConnectionRegistry;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
