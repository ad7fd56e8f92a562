//! Read-only versus mutating command classification.
//!
//! The server routes deferred (mutating) commands through its scheduler
//! bridge; the client wraps the same commands in settle delays. Both sides
//! consult this table so the two views cannot drift.

/// Commands that mutate host state and must run on the scheduler thread.
///
/// Everything not listed here is treated as read-only by the client; the
/// server's dispatch registry is the authority on which names exist at all.
pub const DEFERRED_COMMANDS: &[&str] = &[
    "set_tempo",
    "set_metronome",
    "set_track_name",
    "set_track_mute",
    "set_track_solo",
    "set_track_arm",
    "set_track_volume",
    "set_track_pan",
    "create_midi_track",
    "create_audio_track",
    "delete_track",
    "create_clip",
    "delete_clip",
    "set_clip_name",
    "add_notes_to_clip",
    "fire_clip",
    "stop_clip",
    "create_scene",
    "delete_scene",
    "fire_scene",
    "start_playback",
    "stop_playback",
    "set_device_parameter",
    "toggle_device",
    "undo",
    "redo",
];

/// Execution class of a command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// Read-only; runs directly on the receiving worker thread.
    Immediate,
    /// Mutating; marshalled onto the host scheduler thread.
    Deferred,
}

impl CommandClass {
    /// Whether the class requires scheduler-thread execution.
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::Deferred)
    }
}

/// Classifies a command name.
///
/// Unknown names classify as [`CommandClass::Immediate`]; rejecting them is
/// the server registry's job.
#[must_use]
pub fn classify(name: &str) -> CommandClass {
    if DEFERRED_COMMANDS.contains(&name) {
        CommandClass::Deferred
    } else {
        CommandClass::Immediate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_classify_as_immediate() {
        assert_eq!(classify("health_check"), CommandClass::Immediate);
        assert_eq!(classify("get_session_info"), CommandClass::Immediate);
        assert_eq!(classify("get_track_info"), CommandClass::Immediate);
    }

    #[test]
    fn mutations_classify_as_deferred() {
        assert_eq!(classify("set_track_volume"), CommandClass::Deferred);
        assert_eq!(classify("fire_clip"), CommandClass::Deferred);
        assert_eq!(classify("undo"), CommandClass::Deferred);
    }

    #[test]
    fn unknown_names_default_to_immediate() {
        assert_eq!(classify("totally_bogus"), CommandClass::Immediate);
    }
}
