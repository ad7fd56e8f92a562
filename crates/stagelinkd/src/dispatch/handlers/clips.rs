//! Clip queries and mutations.

use serde_json::{Value, json};

use crate::dispatch::errors::CommandError;
use crate::dispatch::params::Params;
use crate::host::{Note, SongModel};

use super::to_payload;

pub(crate) fn get_clip_info(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    to_payload(&song.clip_details(track_index, clip_index)?)
}

pub(crate) fn get_clip_notes(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    let notes = song.clip_notes(track_index, clip_index)?;
    let details = song.clip_details(track_index, clip_index)?;
    Ok(json!({
        "track_index": track_index,
        "clip_index": clip_index,
        "clip_name": details.name,
        "length": details.length,
        "note_count": notes.len(),
        "notes": notes,
    }))
}

pub(crate) fn create_clip(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    let length = params.f64_or("length", 4.0)?;
    let clip = song.create_clip(track_index, clip_index, length)?;
    Ok(json!({ "name": clip.name, "length": clip.length }))
}

pub(crate) fn delete_clip(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    let name = song.delete_clip(track_index, clip_index)?;
    Ok(json!({
        "deleted": true,
        "track_index": track_index,
        "clip_index": clip_index,
        "clip_name": name,
    }))
}

pub(crate) fn set_clip_name(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    let name = params.str_or("name", "")?;
    let applied = song.set_clip_name(track_index, clip_index, &name)?;
    Ok(json!({ "name": applied }))
}

pub(crate) fn add_notes_to_clip(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    let notes: Vec<Note> = match params.value("notes") {
        None => Vec::new(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|error| CommandError::invalid_param("notes", error.to_string()))?,
    };
    let count = song.add_notes_to_clip(track_index, clip_index, &notes)?;
    Ok(json!({ "note_count": count }))
}

pub(crate) fn fire_clip(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    song.fire_clip(track_index, clip_index)?;
    Ok(json!({ "fired": true }))
}

pub(crate) fn stop_clip(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let clip_index = params.index_or("clip_index", 0)?;
    song.stop_clip(track_index, clip_index)?;
    Ok(json!({ "stopped": true }))
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
    fn notes_round_trip_through_a_created_clip() {
        let song = StubSong::demo();
        let map = params_from(json!({"track_index": 0, "clip_index": 0, "length": 8.0}));
        create_clip(&song, &Params::new(&map)).expect("create clip");

        let map = params_from(json!({
            "track_index": 0,
            "clip_index": 0,
            "notes": [
                {"pitch": 36, "start_time": 0.0, "duration": 0.5, "velocity": 110},
                {"pitch": 43},
            ],
        }));
        let added = add_notes_to_clip(&song, &Params::new(&map)).expect("add notes");
        assert_eq!(added["note_count"], 2);

        let map = params_from(json!({"track_index": 0, "clip_index": 0}));
        let notes = get_clip_notes(&song, &Params::new(&map)).expect("get notes");
        assert_eq!(notes["note_count"], 2);
        assert_eq!(notes["notes"][0]["pitch"], 36);
        // Defaults applied to the sparsely specified note.
        assert_eq!(notes["notes"][1]["velocity"], 100);
        assert_eq!(notes["notes"][1]["duration"], 0.25);
    }

    #[test]
    fn clip_info_reports_empty_slots_without_clip_fields() {
        let song = StubSong::demo();
        let map = params_from(json!({"track_index": 0, "clip_index": 2}));
        let info = get_clip_info(&song, &Params::new(&map)).expect("clip info");
        assert_eq!(info["has_clip"], false);
        assert!(info.get("length").is_none());
    }

    #[test]
    fn firing_an_empty_slot_is_an_error() {
        let song = StubSong::demo();
        let map = params_from(json!({"track_index": 0, "clip_index": 0}));
        let error = fire_clip(&song, &Params::new(&map)).expect_err("should fail");
        assert!(error.to_string().contains("no clip in slot"));
    }

    #[test]
    fn malformed_note_list_names_the_parameter() {
        let song = StubSong::demo();
        let map = params_from(json!({"track_index": 0, "clip_index": 0, "notes": "not-a-list"}));
        let error = add_notes_to_clip(&song, &Params::new(&map)).expect_err("should fail");
        assert!(error.to_string().contains("notes"));
    }
}
