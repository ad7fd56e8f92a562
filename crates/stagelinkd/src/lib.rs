//! Host-embedded command server for the Stagelink bridge.
//!
//! The crate runs inside the host application's process and exposes its live
//! object model to external automation clients over a persistent JSON socket
//! protocol. Accepted connections are served on dedicated worker threads,
//! while every state-mutating command is marshalled onto the host's single
//! cooperative scheduler thread before it touches the object model.
//!
//! ## Architecture
//!
//! - [`transport`]: socket listener, accept loop, and the mutex-guarded
//!   registry enforcing the live-connection ceiling.
//! - [`dispatch`]: the command registry mapping flat command names to typed
//!   handlers, split into an immediate (read-only) and a deferred (mutating)
//!   class, plus the per-connection receive loop.
//! - [`bridge`]: the synchronisation point between worker threads and the
//!   host scheduler thread.
//! - [`host`]: the object-model and scheduler abstractions the handlers run
//!   against, plus an in-memory stub used by the dev binary and tests.
//!
//! The host object model is an external collaborator: its query accessors
//! are documented thread-safe for reads, and nothing here re-checks that
//! assumption at runtime.

mod bridge;
mod dispatch;
mod host;
mod reporter;
mod server;
pub mod telemetry;
mod transport;

pub use bridge::{BridgeError, MainThreadBridge};
pub use dispatch::{CommandError, CommandRegistry, Params};
pub use host::{
    ClipDetails, ClipOverview, ClipSlotOverview, DeviceOverview, DeviceParameters, HostError,
    HostScheduler, MasterOverview, MixerSummary, Note, ParameterInfo, PlaybackPosition,
    ScheduledTask, SceneOverview, SessionOverview, SongModel, StubSong, TickScheduler,
    TrackOverview,
};
pub use reporter::{BridgeReporter, StructuredReporter};
pub use server::{CommandServer, ServerError, ServerState};
pub use transport::{ConnectionRegistry, ListenerError};
