//! Command handler implementations, grouped by the object they address.
//!
//! Every handler has the same shape: pull parameters (with documented
//! defaults) from the mapping, call into the song model, and shape the
//! result the way clients expect it. Range validation lives in the song
//! model so the error message can name the collection's actual bounds.

pub(crate) mod clips;
pub(crate) mod devices;
pub(crate) mod playback;
pub(crate) mod scenes;
pub(crate) mod session;
pub(crate) mod tracks;

use serde::Serialize;
use serde_json::Value;

use super::errors::CommandError;

/// Serialises a handler result into the response payload.
pub(crate) fn to_payload<T: Serialize>(value: &T) -> Result<Value, CommandError> {
    serde_json::to_value(value)
        .map_err(|error| CommandError::internal(format!("failed to serialise result: {error}")))
}
