//! Transport, tempo, metronome, and edit-history commands.

use serde_json::{Value, json};

use crate::dispatch::errors::CommandError;
use crate::dispatch::params::Params;
use crate::host::SongModel;

/// Tempo bounds accepted by the host.
const TEMPO_RANGE: (f64, f64) = (20.0, 999.0);

pub(crate) fn start_playback(
    song: &dyn SongModel,
    _params: &Params<'_>,
) -> Result<Value, CommandError> {
    Ok(json!({ "playing": song.start_playback() }))
}

pub(crate) fn stop_playback(
    song: &dyn SongModel,
    _params: &Params<'_>,
) -> Result<Value, CommandError> {
    Ok(json!({ "playing": song.stop_playback() }))
}

pub(crate) fn set_tempo(song: &dyn SongModel, params: &Params<'_>) -> Result<Value, CommandError> {
    let tempo = params.f64_or("tempo", 120.0)?;
    let (min, max) = TEMPO_RANGE;
    if !(min..=max).contains(&tempo) {
        return Err(CommandError::invalid_param(
            "tempo",
            format!("{tempo} is outside the supported range {min}-{max}"),
        ));
    }
    Ok(json!({ "tempo": song.set_tempo(tempo) }))
}

pub(crate) fn set_metronome(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let enabled = params.bool_or("enabled", true)?;
    Ok(json!({ "enabled": song.set_metronome(enabled) }))
}

pub(crate) fn get_metronome_state(
    song: &dyn SongModel,
    _params: &Params<'_>,
) -> Result<Value, CommandError> {
    Ok(json!({ "enabled": song.metronome() }))
}

pub(crate) fn undo(song: &dyn SongModel, _params: &Params<'_>) -> Result<Value, CommandError> {
    if song.undo() {
        Ok(json!({ "undone": true }))
    } else {
        Ok(json!({ "undone": false, "error": "Nothing to undo" }))
    }
}

pub(crate) fn redo(song: &dyn SongModel, _params: &Params<'_>) -> Result<Value, CommandError> {
    if song.redo() {
        Ok(json!({ "redone": true }))
    } else {
        Ok(json!({ "redone": false, "error": "Nothing to redo" }))
    }
}
