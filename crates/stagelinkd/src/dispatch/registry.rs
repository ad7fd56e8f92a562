//! The command registry: one flat table from name to handler.
//!
//! The table is built once at startup. Each entry carries its execution
//! class: immediate handlers run on the connection's worker thread, deferred
//! handlers run exclusively through the scheduler bridge, even when the
//! operation looks cheap, since cheapness does not make it thread-safe.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use stagelink_protocol::{Command, CommandClass, Response};

use crate::bridge::MainThreadBridge;
use crate::host::SongModel;

use super::DISPATCH_TARGET;
use super::errors::CommandError;
use super::handlers::{clips, devices, playback, scenes, session, tracks};
use super::params::Params;

/// Handler signature shared by every command.
pub(crate) type HandlerFn = fn(&dyn SongModel, &Params<'_>) -> Result<Value, CommandError>;

/// A registered command: its execution class plus its handler.
pub(crate) struct CommandSpec {
    pub(crate) class: CommandClass,
    run: HandlerFn,
}

/// Example names quoted in unknown-command errors.
const EXAMPLE_COMMANDS: &str =
    "get_session_info, get_track_info, set_track_volume, create_clip, add_notes_to_clip, fire_scene";

/// Maps flat command names to typed handlers.
pub struct CommandRegistry {
    table: HashMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    /// Builds the standard command table.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self {
            table: HashMap::new(),
        };

        // Read-only queries; safe on any thread.
        registry.immediate("health_check", session::health_check);
        registry.immediate("get_session_info", session::get_session_info);
        registry.immediate("get_playback_position", session::get_playback_position);
        registry.immediate("get_master_info", session::get_master_info);
        registry.immediate("get_track_info", tracks::get_track_info);
        registry.immediate("get_all_scenes", scenes::get_all_scenes);
        registry.immediate("get_clip_info", clips::get_clip_info);
        registry.immediate("get_clip_notes", clips::get_clip_notes);
        registry.immediate("get_device_parameters", devices::get_device_parameters);
        registry.immediate("get_metronome_state", playback::get_metronome_state);

        // Mutations; scheduler thread only, even the cheap-looking ones.
        registry.deferred("set_tempo", playback::set_tempo);
        registry.deferred("set_metronome", playback::set_metronome);
        registry.deferred("start_playback", playback::start_playback);
        registry.deferred("stop_playback", playback::stop_playback);
        registry.deferred("undo", playback::undo);
        registry.deferred("redo", playback::redo);
        registry.deferred("set_track_name", tracks::set_track_name);
        registry.deferred("set_track_mute", tracks::set_track_mute);
        registry.deferred("set_track_solo", tracks::set_track_solo);
        registry.deferred("set_track_arm", tracks::set_track_arm);
        registry.deferred("set_track_volume", tracks::set_track_volume);
        registry.deferred("set_track_pan", tracks::set_track_pan);
        registry.deferred("create_midi_track", tracks::create_midi_track);
        registry.deferred("create_audio_track", tracks::create_audio_track);
        registry.deferred("delete_track", tracks::delete_track);
        registry.deferred("create_clip", clips::create_clip);
        registry.deferred("delete_clip", clips::delete_clip);
        registry.deferred("set_clip_name", clips::set_clip_name);
        registry.deferred("add_notes_to_clip", clips::add_notes_to_clip);
        registry.deferred("fire_clip", clips::fire_clip);
        registry.deferred("stop_clip", clips::stop_clip);
        registry.deferred("create_scene", scenes::create_scene);
        registry.deferred("delete_scene", scenes::delete_scene);
        registry.deferred("fire_scene", scenes::fire_scene);
        registry.deferred("set_device_parameter", devices::set_device_parameter);
        registry.deferred("toggle_device", devices::toggle_device);

        registry
    }

    fn immediate(&mut self, name: &'static str, run: HandlerFn) {
        self.table.insert(
            name,
            CommandSpec {
                class: CommandClass::Immediate,
                run,
            },
        );
    }

    fn deferred(&mut self, name: &'static str, run: HandlerFn) {
        self.table.insert(
            name,
            CommandSpec {
                class: CommandClass::Deferred,
                run,
            },
        );
    }

    /// Execution class of a registered command.
    #[must_use]
    pub fn class_of(&self, name: &str) -> Option<CommandClass> {
        self.table.get(name).map(|spec| spec.class)
    }

    /// Every registered command name.
    pub fn command_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }

    /// Routes one command to its handler and shapes the response.
    ///
    /// Deferred commands run through the bridge; the calling worker blocks
    /// until the scheduler-thread result arrives or the bounded wait
    /// expires. Handler failures, including panics, become structured error
    /// responses.
    pub(crate) fn dispatch(
        &self,
        command: &Command,
        song: &Arc<dyn SongModel>,
        bridge: &MainThreadBridge,
    ) -> Response {
        let Some(spec) = self.table.get(command.name.as_str()) else {
            return Response::error(format!(
                "Unknown command: {}. Available commands include: {EXAMPLE_COMMANDS}, etc.",
                command.name
            ));
        };

        debug!(
            target: DISPATCH_TARGET,
            command = %command.name,
            class = ?spec.class,
            "dispatching command"
        );

        let outcome = match spec.class {
            CommandClass::Immediate => {
                run_guarded(spec.run, song.as_ref(), &Params::new(&command.params))
            }
            CommandClass::Deferred => {
                let song = Arc::clone(song);
                let params = command.params.clone();
                let run = spec.run;
                bridge
                    .run(move || run_guarded(run, song.as_ref(), &Params::new(&params)))
                    .unwrap_or_else(|bridge_error| Err(CommandError::from(bridge_error)))
            }
        };

        match outcome {
            Ok(result) => Response::success(result),
            Err(command_error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    command = %command.name,
                    error = %command_error,
                    "command failed"
                );
                Response::error(command_error.to_string())
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Runs a handler, converting a panic into a structured internal error.
///
/// Panic payloads are logged locally and never cross the wire.
fn run_guarded(
    run: HandlerFn,
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    panic::catch_unwind(AssertUnwindSafe(|| run(song, params))).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|message| String::from(*message))
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| String::from("<non-string panic payload>"));
        error!(
            target: DISPATCH_TARGET,
            %detail,
            "command handler panicked"
        );
        Err(CommandError::internal("command handler panicked"))
    })
}
