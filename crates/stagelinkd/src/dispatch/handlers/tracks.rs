//! Track queries and mutations.

use serde_json::{Value, json};

use crate::dispatch::errors::CommandError;
use crate::dispatch::params::Params;
use crate::host::SongModel;

use super::to_payload;

pub(crate) fn get_track_info(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    to_payload(&song.track_overview(track_index)?)
}

pub(crate) fn set_track_name(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let name = params.str_or("name", "")?;
    let applied = song.set_track_name(track_index, &name)?;
    Ok(json!({ "name": applied }))
}

pub(crate) fn set_track_mute(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let mute = params.bool_or("mute", false)?;
    let applied = song.set_track_mute(track_index, mute)?;
    Ok(json!({ "track_index": track_index, "mute": applied }))
}

pub(crate) fn set_track_solo(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let solo = params.bool_or("solo", false)?;
    let applied = song.set_track_solo(track_index, solo)?;
    Ok(json!({ "track_index": track_index, "solo": applied }))
}

pub(crate) fn set_track_arm(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let arm = params.bool_or("arm", false)?;
    let applied = song.set_track_arm(track_index, arm)?;
    Ok(json!({ "track_index": track_index, "arm": applied }))
}

pub(crate) fn set_track_volume(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let volume = params.f64_or("volume", 0.85)?;
    let applied = song.set_track_volume(track_index, volume)?;
    Ok(json!({ "track_index": track_index, "volume": applied }))
}

pub(crate) fn set_track_pan(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let pan = params.f64_or("pan", 0.0)?;
    let applied = song.set_track_pan(track_index, pan)?;
    Ok(json!({ "track_index": track_index, "panning": applied }))
}

pub(crate) fn create_midi_track(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let index = params.insertion_point("index")?;
    let (position, name) = song.create_midi_track(index)?;
    Ok(json!({ "index": position, "name": name }))
}

pub(crate) fn create_audio_track(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let index = params.insertion_point("index")?;
    let (position, name) = song.create_audio_track(index)?;
    Ok(json!({ "index": position, "name": name }))
}

pub(crate) fn delete_track(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let name = song.delete_track(track_index)?;
    Ok(json!({ "deleted": true, "track_index": track_index, "track_name": name }))
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use crate::host::StubSong;

    use super::*;

    fn params_from(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn volume_defaults_and_clamping_flow_through() {
        let song = StubSong::demo();

        let map = params_from(json!({"track_index": 0, "volume": 2.0}));
        let result = set_track_volume(&song, &Params::new(&map)).expect("set volume");
        assert_eq!(result["volume"], 1.0);

        let map = params_from(json!({"track_index": 0}));
        let result = set_track_volume(&song, &Params::new(&map)).expect("default volume");
        assert_eq!(result["volume"], 0.85);
    }

    #[test]
    fn track_info_reflects_prior_mutation() {
        let song = StubSong::demo();
        let map = params_from(json!({"track_index": 1, "volume": 0.5}));
        set_track_volume(&song, &Params::new(&map)).expect("set volume");

        let map = params_from(json!({"track_index": 1}));
        let info = get_track_info(&song, &Params::new(&map)).expect("track info");
        assert_eq!(info["volume"], 0.5);
        assert_eq!(info["name"], "Drums");
    }

    #[test]
    fn out_of_range_track_is_a_command_error() {
        let song = StubSong::demo();
        let map = params_from(json!({"track_index": 12}));
        let error = get_track_info(&song, &Params::new(&map)).expect_err("should fail");
        assert!(error.to_string().contains("out of range"));
    }

    #[test]
    fn created_track_appends_by_default() {
        let song = StubSong::demo();
        let map = params_from(json!({}));
        let result = create_midi_track(&song, &Params::new(&map)).expect("create track");
        assert_eq!(result["index"], 2);
    }
}
