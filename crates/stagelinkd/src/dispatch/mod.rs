//! Command routing and per-connection dispatch.
//!
//! Incoming messages are parsed into [`stagelink_protocol::Command`] values
//! and routed through a registry built once at startup. Read-only commands
//! execute directly on the connection's worker thread; mutating commands go
//! through the scheduler bridge. Unknown names, bad parameters, and host
//! errors all produce structured error responses; a protocol-level failure
//! never tears down the transport.

mod errors;
mod handler;
mod handlers;
mod params;
mod registry;

pub(crate) use self::handler::DispatchConnectionHandler;

pub use self::errors::CommandError;
pub use self::params::Params;
pub use self::registry::CommandRegistry;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
