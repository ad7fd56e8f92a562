//! Session-level queries.

use serde_json::{Value, json};

use crate::dispatch::errors::CommandError;
use crate::dispatch::params::Params;
use crate::host::SongModel;

use super::to_payload;

/// Cheap responsiveness probe; also used by clients to validate a fresh
/// connection.
pub(crate) fn health_check(song: &dyn SongModel, _params: &Params<'_>) -> Result<Value, CommandError> {
    Ok(json!({
        "status": "ok",
        "tempo": song.tempo(),
        "is_playing": song.is_playing(),
        "track_count": song.track_count(),
    }))
}

pub(crate) fn get_session_info(
    song: &dyn SongModel,
    _params: &Params<'_>,
) -> Result<Value, CommandError> {
    to_payload(&song.session_overview())
}

pub(crate) fn get_playback_position(
    song: &dyn SongModel,
    _params: &Params<'_>,
) -> Result<Value, CommandError> {
    to_payload(&song.playback_position())
}

pub(crate) fn get_master_info(
    song: &dyn SongModel,
    _params: &Params<'_>,
) -> Result<Value, CommandError> {
    to_payload(&song.master_overview())
}
