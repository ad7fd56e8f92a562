//! A single live socket to the host bridge.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::warn;

use stagelink_config::Endpoint;
use stagelink_protocol::{Command, FrameBuffer, FrameError, FrameProgress, Response, write_message};

use crate::errors::ClientError;

const READ_CHUNK_BYTES: usize = 8192;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// One established connection with its framing buffer.
pub(crate) struct HostConnection {
    stream: TcpStream,
    frames: FrameBuffer,
}

impl HostConnection {
    /// Resolves the endpoint and connects with a bounded timeout.
    pub(crate) fn open(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        max_message_bytes: usize,
    ) -> Result<Self, ClientError> {
        let addr = resolve(endpoint)?;
        let stream = TcpStream::connect_timeout(&addr, connect_timeout).map_err(|source| {
            ClientError::Connect {
                endpoint: endpoint.to_string(),
                source,
            }
        })?;
        Ok(Self {
            stream,
            frames: FrameBuffer::new(max_message_bytes),
        })
    }

    /// Writes one command in full.
    pub(crate) fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        write_message(&mut self.stream, command).map_err(|error| match error {
            FrameError::Serialize(source) => ClientError::Serialise(source),
            FrameError::Io(source) => ClientError::Send { source },
            overflow @ FrameError::BufferOverflow { .. } => ClientError::ResponseTooLarge(overflow),
        })
    }

    /// Reads one complete response, bounded by `timeout`.
    ///
    /// A timeout with partial bytes accumulated is an incomplete response,
    /// never a silently truncated one.
    pub(crate) fn receive(&mut self, timeout: Duration) -> Result<Response, ClientError> {
        self.stream
            .set_read_timeout(Some(timeout))
            .map_err(|source| ClientError::Receive { source })?;

        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            let bytes_read = match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(if self.frames.is_empty() {
                        ClientError::ConnectionClosed
                    } else {
                        ClientError::IncompleteResponse
                    });
                }
                Ok(bytes_read) => bytes_read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error)
                    if error.kind() == io::ErrorKind::WouldBlock
                        || error.kind() == io::ErrorKind::TimedOut =>
                {
                    return Err(if self.frames.is_empty() {
                        ClientError::ResponseTimeout { waited: timeout }
                    } else {
                        ClientError::IncompleteResponse
                    });
                }
                Err(source) => return Err(ClientError::Receive { source }),
            };

            let received = chunk.get(..bytes_read).unwrap_or_default();
            match self.frames.push_chunk(received) {
                Ok(FrameProgress::Complete(value)) => {
                    return serde_json::from_value(value).map_err(ClientError::MalformedResponse);
                }
                Ok(FrameProgress::Incomplete) => {}
                Ok(FrameProgress::InvalidChunk) => {
                    warn!(
                        target: CLIENT_TARGET,
                        bytes = bytes_read,
                        "dropping non-UTF-8 chunk from response stream"
                    );
                }
                Err(overflow) => return Err(ClientError::ResponseTooLarge(overflow)),
            }
        }
    }
}

fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, ClientError> {
    let mut addrs =
        (endpoint.host(), endpoint.port())
            .to_socket_addrs()
            .map_err(|source| ClientError::Resolve {
                endpoint: endpoint.to_string(),
                source,
            })?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ClientError::Resolve {
            endpoint: endpoint.to_string(),
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"),
        })
}
