//! Incremental framing for self-delimiting JSON messages.
//!
//! Messages carry no length prefix: the receiver accumulates bytes and
//! attempts a full-document parse after every chunk. An incomplete document
//! keeps accumulating; a complete one clears the buffer and is handed to the
//! caller. The accumulated buffer is bounded, and exceeding the bound is a
//! fatal condition for the connection that owns it.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Default ceiling on a single message's accumulated bytes (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1_048_576;

/// Errors surfaced while framing messages.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The accumulated buffer exceeded its configured ceiling.
    ///
    /// This is fatal for the connection: the buffer has been discarded and
    /// no message can be recovered from the stream.
    #[error("receive buffer of {size} bytes exceeds the {max_bytes} byte limit")]
    BufferOverflow {
        /// Bytes accumulated when the limit was crossed.
        size: usize,
        /// Configured ceiling.
        max_bytes: usize,
    },
    /// A message failed to serialise before sending.
    #[error("failed to serialise message: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The underlying stream failed during a write.
    #[error("failed to write message: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of feeding one received chunk into a [`FrameBuffer`].
#[derive(Debug)]
pub enum FrameProgress {
    /// The buffer parsed as one complete document, now returned.
    Complete(Value),
    /// More bytes are needed before the document completes.
    Incomplete,
    /// The chunk made the buffer irrecoverably non-UTF-8 and was dropped.
    ///
    /// The previously accumulated bytes are kept; the connection stays
    /// usable since a well-formed retry may arrive in the next read.
    InvalidChunk,
}

/// Serialises a message and writes it to the stream in full.
///
/// The write either delivers every byte to the transport layer (including a
/// flush) or fails; a partial write is never reported as success.
///
/// # Errors
///
/// Returns [`FrameError::Serialize`] when the value cannot be encoded and
/// [`FrameError::Io`] when the stream write or flush fails.
pub fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize,
{
    let bytes = serde_json::to_vec(message).map_err(FrameError::Serialize)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Growable receive buffer that recognises complete JSON documents.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl FrameBuffer {
    /// Builds a buffer bounded by `max_bytes`.
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_bytes,
        }
    }

    /// Appends one received chunk and reports framing progress.
    ///
    /// A chunk that renders the buffer irrecoverably non-UTF-8 is removed
    /// again and reported as [`FrameProgress::InvalidChunk`]; a multi-byte
    /// character split across chunks is treated as incomplete, not invalid.
    /// A document that fails to parse for any other reason keeps
    /// accumulating; the byte ceiling terminates streams that never
    /// converge on a parseable document.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BufferOverflow`] once the accumulated bytes
    /// exceed the ceiling; the buffer is discarded and the connection should
    /// be closed without a response.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<FrameProgress, FrameError> {
        if chunk.is_empty() {
            return Ok(FrameProgress::Incomplete);
        }

        self.buffer.extend_from_slice(chunk);
        if !recoverable_utf8(&self.buffer) {
            self.buffer.truncate(self.buffer.len() - chunk.len());
            return Ok(FrameProgress::InvalidChunk);
        }

        if self.buffer.len() > self.max_bytes {
            let size = self.buffer.len();
            self.buffer.clear();
            return Err(FrameError::BufferOverflow {
                size,
                max_bytes: self.max_bytes,
            });
        }

        match serde_json::from_slice::<Value>(&self.buffer) {
            Ok(value) => {
                self.buffer.clear();
                Ok(FrameProgress::Complete(value))
            }
            Err(error) if error.is_eof() => Ok(FrameProgress::Incomplete),
            // Anything else (stray bytes, trailing garbage) also keeps
            // accumulating; the ceiling is the backstop.
            Err(_) => Ok(FrameProgress::Incomplete),
        }
    }

    /// Bytes currently accumulated towards the next message.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no partial message is pending.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Whether the bytes are valid UTF-8, tolerating a truncated final sequence.
fn recoverable_utf8(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        // `error_len() == None` marks an unexpected end of input: the final
        // character may still complete in a later chunk.
        Err(error) => error.error_len().is_none(),
    }
}
