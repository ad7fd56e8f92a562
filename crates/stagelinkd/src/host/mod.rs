//! Host application abstractions consumed by the command handlers.
//!
//! The live object model and the scheduler are external collaborators; this
//! module defines the capability traits the rest of the crate programs
//! against, together with the snapshot types crossing that boundary and an
//! in-memory stub implementation for development and tests.

mod model;
mod scheduler;
mod stub;

pub use model::{
    ClipDetails, ClipOverview, ClipSlotOverview, DeviceOverview, DeviceParameters, HostError,
    MasterOverview, MixerSummary, Note, ParameterInfo, PlaybackPosition, SceneOverview,
    SessionOverview, SongModel, TrackOverview,
};
pub use scheduler::{HostScheduler, ScheduledTask};
pub use stub::{StubSong, TickScheduler};
