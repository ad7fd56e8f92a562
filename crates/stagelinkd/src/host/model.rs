//! The song-model accessor surface and its snapshot types.
//!
//! [`SongModel`] is the documented getter/setter layer the handlers call
//! into. Query methods are safe from any thread; mutation methods must only
//! run on the host scheduler thread, which the dispatch layer guarantees by
//! routing every mutating command through the bridge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the song model for requests it cannot satisfy.
///
/// These are recoverable, per-command failures: the connection that issued
/// the command stays open and receives a structured error response.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// An index pointed outside the addressed collection.
    #[error("{kind} index {index} out of range (0-{})", .len.saturating_sub(1))]
    IndexOutOfRange {
        /// Collection kind, e.g. `track` or `scene`.
        kind: &'static str,
        /// The offending index.
        index: usize,
        /// Current collection length.
        len: usize,
    },
    /// The addressed clip slot holds no clip.
    #[error("no clip in slot {clip_index} on track {track_index}")]
    EmptySlot {
        track_index: usize,
        clip_index: usize,
    },
    /// The addressed clip slot already holds a clip.
    #[error("clip slot {clip_index} on track {track_index} already has a clip")]
    SlotOccupied {
        track_index: usize,
        clip_index: usize,
    },
    /// A note operation addressed an audio clip.
    #[error("clip in slot {clip_index} on track {track_index} is not a MIDI clip")]
    NotMidiClip {
        track_index: usize,
        clip_index: usize,
    },
    /// The addressed device parameter refuses remote control.
    #[error("parameter '{name}' is not enabled")]
    ParameterDisabled { name: String },
}

impl HostError {
    /// Builds an out-of-range error for the given collection.
    #[must_use]
    pub const fn out_of_range(kind: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { kind, index, len }
    }
}

/// Master-channel summary embedded in the session overview.
#[derive(Debug, Clone, Serialize)]
pub struct MixerSummary {
    pub name: String,
    pub volume: f64,
    pub panning: f64,
}

/// Session-wide summary returned by `get_session_info`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOverview {
    pub tempo: f64,
    pub signature_numerator: u32,
    pub signature_denominator: u32,
    pub track_count: usize,
    pub return_track_count: usize,
    pub master_track: MixerSummary,
}

/// Transport position returned by `get_playback_position`.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackPosition {
    pub current_song_time: f64,
    pub is_playing: bool,
    pub tempo: f64,
    pub signature_numerator: u32,
    pub signature_denominator: u32,
}

/// Clip summary embedded in a track overview's clip slots.
#[derive(Debug, Clone, Serialize)]
pub struct ClipOverview {
    pub name: String,
    pub length: f64,
    pub is_playing: bool,
    pub is_recording: bool,
}

/// One slot in a track's clip grid.
#[derive(Debug, Clone, Serialize)]
pub struct ClipSlotOverview {
    pub index: usize,
    pub has_clip: bool,
    pub clip: Option<ClipOverview>,
}

/// Device summary embedded in track and master overviews.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceOverview {
    pub index: usize,
    pub name: String,
    pub class_name: String,
    pub is_active: bool,
}

/// Full track snapshot returned by `get_track_info`.
#[derive(Debug, Clone, Serialize)]
pub struct TrackOverview {
    pub index: usize,
    pub name: String,
    pub is_audio_track: bool,
    pub is_midi_track: bool,
    pub mute: bool,
    pub solo: bool,
    pub arm: bool,
    pub volume: f64,
    pub panning: f64,
    pub clip_slots: Vec<ClipSlotOverview>,
    pub devices: Vec<DeviceOverview>,
}

/// Scene summary returned by `get_all_scenes`.
#[derive(Debug, Clone, Serialize)]
pub struct SceneOverview {
    pub index: usize,
    pub name: String,
    pub color: Option<i64>,
    pub is_triggered: bool,
}

/// Clip metadata returned by `get_clip_info`.
///
/// When the slot is empty only the addressing fields are serialised.
#[derive(Debug, Clone, Serialize)]
pub struct ClipDetails {
    pub track_index: usize,
    pub clip_index: usize,
    pub has_clip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_midi_clip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_recording: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_end: Option<f64>,
}

impl ClipDetails {
    /// Details for an empty slot.
    #[must_use]
    pub const fn empty(track_index: usize, clip_index: usize) -> Self {
        Self {
            track_index,
            clip_index,
            has_clip: false,
            name: None,
            length: None,
            is_midi_clip: None,
            is_playing: None,
            is_recording: None,
            looping: None,
            loop_start: None,
            loop_end: None,
        }
    }
}

/// One MIDI note within a clip.
///
/// Field defaults mirror the documented parameter defaults for
/// `add_notes_to_clip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default = "default_pitch")]
    pub pitch: u8,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    #[serde(default)]
    pub mute: bool,
}

const fn default_pitch() -> u8 {
    60
}

const fn default_duration() -> f64 {
    0.25
}

const fn default_velocity() -> u8 {
    100
}

/// One controllable parameter on a device.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterInfo {
    pub index: usize,
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub is_enabled: bool,
}

/// Device parameter listing returned by `get_device_parameters`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceParameters {
    pub track_index: usize,
    pub device_index: usize,
    pub device_name: String,
    pub device_class: String,
    pub parameter_count: usize,
    pub parameters: Vec<ParameterInfo>,
}

/// Master channel snapshot returned by `get_master_info`.
#[derive(Debug, Clone, Serialize)]
pub struct MasterOverview {
    pub name: String,
    pub volume: f64,
    pub panning: f64,
    pub device_count: usize,
    pub devices: Vec<DeviceOverview>,
}

/// The live object model's accessor surface.
///
/// Query methods are documented thread-safe on the host and run directly on
/// worker threads. Mutation methods must only run on the scheduler thread;
/// the dispatch layer routes them through [`crate::MainThreadBridge`].
pub trait SongModel: Send + Sync {
    // --- queries -----------------------------------------------------------

    fn tempo(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn metronome(&self) -> bool;
    fn track_count(&self) -> usize;
    fn session_overview(&self) -> SessionOverview;
    fn playback_position(&self) -> PlaybackPosition;
    fn master_overview(&self) -> MasterOverview;
    fn scenes(&self) -> Vec<SceneOverview>;

    /// Full snapshot of one track.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for a bad track index.
    fn track_overview(&self, track_index: usize) -> Result<TrackOverview, HostError>;

    /// Clip metadata for one slot, present or not.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for bad indices.
    fn clip_details(&self, track_index: usize, clip_index: usize)
    -> Result<ClipDetails, HostError>;

    /// All notes of a MIDI clip.
    ///
    /// # Errors
    ///
    /// Fails for bad indices, an empty slot, or an audio clip.
    fn clip_notes(&self, track_index: usize, clip_index: usize) -> Result<Vec<Note>, HostError>;

    /// Parameter listing for one device.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for bad indices.
    fn device_parameters(
        &self,
        track_index: usize,
        device_index: usize,
    ) -> Result<DeviceParameters, HostError>;

    // --- mutations (scheduler thread only) ---------------------------------

    fn set_tempo(&self, tempo: f64) -> f64;
    fn set_metronome(&self, enabled: bool) -> bool;
    fn start_playback(&self) -> bool;
    fn stop_playback(&self) -> bool;
    fn undo(&self) -> bool;
    fn redo(&self) -> bool;

    fn set_track_name(&self, track_index: usize, name: &str) -> Result<String, HostError>;
    fn set_track_mute(&self, track_index: usize, mute: bool) -> Result<bool, HostError>;
    fn set_track_solo(&self, track_index: usize, solo: bool) -> Result<bool, HostError>;
    fn set_track_arm(&self, track_index: usize, arm: bool) -> Result<bool, HostError>;

    /// Sets a track's volume, clamped to `0.0..=1.0`; returns the applied
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for a bad track index.
    fn set_track_volume(&self, track_index: usize, volume: f64) -> Result<f64, HostError>;

    /// Sets a track's panning, clamped to `-1.0..=1.0`; returns the applied
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for a bad track index.
    fn set_track_pan(&self, track_index: usize, pan: f64) -> Result<f64, HostError>;

    /// Creates a MIDI track; `None` appends. Returns index and name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for an insertion point past the
    /// end.
    fn create_midi_track(&self, index: Option<usize>) -> Result<(usize, String), HostError>;

    /// Creates an audio track; `None` appends. Returns index and name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for an insertion point past the
    /// end.
    fn create_audio_track(&self, index: Option<usize>) -> Result<(usize, String), HostError>;

    /// Deletes a track, returning its name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for a bad track index.
    fn delete_track(&self, track_index: usize) -> Result<String, HostError>;

    /// Creates an empty MIDI clip in a free slot.
    ///
    /// # Errors
    ///
    /// Fails for bad indices or an occupied slot.
    fn create_clip(
        &self,
        track_index: usize,
        clip_index: usize,
        length: f64,
    ) -> Result<ClipOverview, HostError>;

    /// Deletes a clip, returning its name.
    ///
    /// # Errors
    ///
    /// Fails for bad indices or an empty slot.
    fn delete_clip(&self, track_index: usize, clip_index: usize) -> Result<String, HostError>;

    /// Renames a clip, returning the applied name.
    ///
    /// # Errors
    ///
    /// Fails for bad indices or an empty slot.
    fn set_clip_name(
        &self,
        track_index: usize,
        clip_index: usize,
        name: &str,
    ) -> Result<String, HostError>;

    /// Adds notes to a MIDI clip, returning how many were added.
    ///
    /// # Errors
    ///
    /// Fails for bad indices, an empty slot, or an audio clip.
    fn add_notes_to_clip(
        &self,
        track_index: usize,
        clip_index: usize,
        notes: &[Note],
    ) -> Result<usize, HostError>;

    /// Launches the clip in a slot.
    ///
    /// # Errors
    ///
    /// Fails for bad indices or an empty slot.
    fn fire_clip(&self, track_index: usize, clip_index: usize) -> Result<(), HostError>;

    /// Stops the slot; stopping an empty slot is a no-op on the host.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for bad indices.
    fn stop_clip(&self, track_index: usize, clip_index: usize) -> Result<(), HostError>;

    /// Creates a scene; `None` appends. Returns index and name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for an insertion point past the
    /// end.
    fn create_scene(&self, index: Option<usize>) -> Result<(usize, String), HostError>;

    /// Deletes a scene, returning its name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for a bad scene index.
    fn delete_scene(&self, scene_index: usize) -> Result<String, HostError>;

    /// Launches every clip in a scene, returning the scene name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for a bad scene index.
    fn fire_scene(&self, scene_index: usize) -> Result<String, HostError>;

    /// Sets a device parameter, clamped to the parameter's range.
    ///
    /// # Errors
    ///
    /// Fails for bad indices or a disabled parameter.
    fn set_device_parameter(
        &self,
        track_index: usize,
        device_index: usize,
        parameter_index: usize,
        value: f64,
    ) -> Result<ParameterInfo, HostError>;

    /// Toggles a device's activity, returning its updated summary.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::IndexOutOfRange`] for bad indices.
    fn toggle_device(
        &self,
        track_index: usize,
        device_index: usize,
    ) -> Result<DeviceOverview, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_the_collection() {
        let error = HostError::out_of_range("track", 5, 4);
        assert_eq!(error.to_string(), "track index 5 out of range (0-3)");
    }

    #[test]
    fn empty_clip_details_serialise_without_optional_fields() {
        let details = ClipDetails::empty(1, 2);
        let wire = serde_json::to_string(&details).expect("serialise");
        assert!(wire.contains(r#""has_clip":false"#));
        assert!(!wire.contains("name"));
        assert!(!wire.contains("length"));
    }

    #[test]
    fn note_defaults_follow_documented_values() {
        let note: Note = serde_json::from_str("{}").expect("parse empty note");
        assert_eq!(note.pitch, 60);
        assert_eq!(note.start_time, 0.0);
        assert_eq!(note.duration, 0.25);
        assert_eq!(note.velocity, 100);
        assert!(!note.mute);
    }
}
