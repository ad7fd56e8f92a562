//! Scene queries and mutations.

use serde_json::{Value, json};

use crate::dispatch::errors::CommandError;
use crate::dispatch::params::Params;
use crate::host::SongModel;

pub(crate) fn get_all_scenes(
    song: &dyn SongModel,
    _params: &Params<'_>,
) -> Result<Value, CommandError> {
    let scenes = song.scenes();
    Ok(json!({ "scene_count": scenes.len(), "scenes": scenes }))
}

pub(crate) fn create_scene(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let index = params.insertion_point("index")?;
    let (position, name) = song.create_scene(index)?;
    Ok(json!({ "index": position, "name": name }))
}

pub(crate) fn delete_scene(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let scene_index = params.index_or("scene_index", 0)?;
    let name = song.delete_scene(scene_index)?;
    Ok(json!({ "deleted": true, "scene_index": scene_index, "scene_name": name }))
}

pub(crate) fn fire_scene(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let scene_index = params.index_or("scene_index", 0)?;
    let name = song.fire_scene(scene_index)?;
    Ok(json!({ "fired": true, "scene_index": scene_index, "scene_name": name }))
}
