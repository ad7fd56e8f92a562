//! Typed access to a command's parameter mapping.
//!
//! Every parameter is optional on the wire and falls back to the default its
//! handler documents. A parameter that is present but of the wrong shape is
//! an error; silently coercing it would mask client bugs.

use serde_json::{Map, Value};

use super::errors::CommandError;

/// Read-only view over a command's `params` mapping.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    /// Wraps a raw parameter mapping.
    #[must_use]
    pub const fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Raw value of a parameter, if present.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name)
    }

    /// Integer parameter with a default.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParam`] when present but not an
    /// integer.
    pub fn i64_or(&self, name: &str, default: i64) -> Result<i64, CommandError> {
        match self.map.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| CommandError::invalid_param(name, format!("expected an integer, got {value}"))),
        }
    }

    /// Floating-point parameter with a default; integers are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParam`] when present but not a number.
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, CommandError> {
        match self.map.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| CommandError::invalid_param(name, format!("expected a number, got {value}"))),
        }
    }

    /// String parameter with a default.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParam`] when present but not a string.
    pub fn str_or(&self, name: &str, default: &str) -> Result<String, CommandError> {
        match self.map.get(name) {
            None => Ok(String::from(default)),
            Some(value) => value
                .as_str()
                .map(String::from)
                .ok_or_else(|| CommandError::invalid_param(name, format!("expected a string, got {value}"))),
        }
    }

    /// Boolean parameter with a default.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParam`] when present but not a boolean.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, CommandError> {
        match self.map.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| CommandError::invalid_param(name, format!("expected a boolean, got {value}"))),
        }
    }

    /// Non-negative index parameter with a default.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParam`] when present but not an
    /// integer, or when negative.
    pub fn index_or(&self, name: &str, default: usize) -> Result<usize, CommandError> {
        let raw = self.i64_or(name, i64::try_from(default).unwrap_or(i64::MAX))?;
        usize::try_from(raw)
            .map_err(|_| CommandError::invalid_param(name, format!("index {raw} must not be negative")))
    }

    /// Insertion-point parameter where `-1` (the default) means "append".
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidParam`] when present but not an
    /// integer, or when below `-1`.
    pub fn insertion_point(&self, name: &str) -> Result<Option<usize>, CommandError> {
        let raw = self.i64_or(name, -1)?;
        if raw == -1 {
            return Ok(None);
        }
        usize::try_from(raw).map(Some).map_err(|_| {
            CommandError::invalid_param(name, format!("insertion index {raw} must be -1 or above"))
        })
    }
}
