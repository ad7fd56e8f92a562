//! Device queries and mutations.

use serde_json::{Value, json};

use crate::dispatch::errors::CommandError;
use crate::dispatch::params::Params;
use crate::host::SongModel;

use super::to_payload;

pub(crate) fn get_device_parameters(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let device_index = params.index_or("device_index", 0)?;
    to_payload(&song.device_parameters(track_index, device_index)?)
}

pub(crate) fn set_device_parameter(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let device_index = params.index_or("device_index", 0)?;
    let parameter_index = params.index_or("parameter_index", 0)?;
    let value = params.f64_or("value", 0.0)?;
    let applied = song.set_device_parameter(track_index, device_index, parameter_index, value)?;
    Ok(json!({
        "track_index": track_index,
        "device_index": device_index,
        "parameter_index": parameter_index,
        "parameter_name": applied.name,
        "value": applied.value,
        "min": applied.min,
        "max": applied.max,
    }))
}

pub(crate) fn toggle_device(
    song: &dyn SongModel,
    params: &Params<'_>,
) -> Result<Value, CommandError> {
    let track_index = params.index_or("track_index", 0)?;
    let device_index = params.index_or("device_index", 0)?;
    let device = song.toggle_device(track_index, device_index)?;
    Ok(json!({
        "track_index": track_index,
        "device_index": device_index,
        "device_name": device.name,
        "is_active": device.is_active,
    }))
}
