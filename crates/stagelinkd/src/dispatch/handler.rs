//! Per-connection receive loop.
//!
//! Each accepted connection gets one of these loops on its own worker
//! thread: read chunks, reassemble framed commands, dispatch, and write the
//! response before reading the next command. Exactly one response is
//! produced per command, in order; the loop never pipelines.

use std::io::{self, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use stagelink_protocol::{Command, FrameBuffer, FrameProgress, Response, write_message};

use crate::bridge::MainThreadBridge;
use crate::host::SongModel;
use crate::transport::ConnectionHandler;

use super::DISPATCH_TARGET;
use super::registry::CommandRegistry;

const READ_CHUNK_BYTES: usize = 8192;

/// Connection handler that frames, dispatches, and responds.
pub(crate) struct DispatchConnectionHandler {
    registry: Arc<CommandRegistry>,
    song: Arc<dyn SongModel>,
    bridge: MainThreadBridge,
    idle_timeout: Duration,
    max_message_bytes: usize,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(
        registry: Arc<CommandRegistry>,
        song: Arc<dyn SongModel>,
        bridge: MainThreadBridge,
        idle_timeout: Duration,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            registry,
            song,
            bridge,
            idle_timeout,
            max_message_bytes,
        }
    }

    fn serve(&self, mut stream: TcpStream, shutdown: &AtomicBool) {
        if let Err(error) = stream.set_read_timeout(Some(self.idle_timeout)) {
            warn!(target: DISPATCH_TARGET, %error, "failed to arm idle timeout");
            return;
        }

        let mut frames = FrameBuffer::new(self.max_message_bytes);
        let mut chunk = vec![0_u8; READ_CHUNK_BYTES];

        while !shutdown.load(Ordering::SeqCst) {
            let bytes_read = match stream.read(&mut chunk) {
                Ok(0) => {
                    debug!(target: DISPATCH_TARGET, "client disconnected");
                    return;
                }
                Ok(bytes_read) => bytes_read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error)
                    if error.kind() == io::ErrorKind::WouldBlock
                        || error.kind() == io::ErrorKind::TimedOut =>
                {
                    warn!(
                        target: DISPATCH_TARGET,
                        timeout = ?self.idle_timeout,
                        "closing idle connection"
                    );
                    return;
                }
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, %error, "read failed, closing connection");
                    return;
                }
            };

            let received = chunk.get(..bytes_read).unwrap_or_default();
            let message = match frames.push_chunk(received) {
                Ok(FrameProgress::Complete(value)) => value,
                Ok(FrameProgress::Incomplete) => continue,
                Ok(FrameProgress::InvalidChunk) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        bytes = bytes_read,
                        "dropping non-UTF-8 chunk"
                    );
                    continue;
                }
                Err(overflow) => {
                    // Fatal by policy: close without a response so a
                    // flooding client cannot keep the worker busy.
                    warn!(target: DISPATCH_TARGET, error = %overflow, "closing connection");
                    return;
                }
            };

            let response = self.respond_to(message);
            if let Err(error) = write_message(&mut stream, &response) {
                // Best effort only; a failed reply is logged, not retried.
                warn!(target: DISPATCH_TARGET, %error, "failed to send response");
                return;
            }
        }
    }

    fn respond_to(&self, message: Value) -> Response {
        match serde_json::from_value::<Command>(message) {
            Ok(command) => self.registry.dispatch(&command, &self.song, &self.bridge),
            Err(error) => Response::error(format!("invalid command envelope: {error}")),
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: TcpStream, shutdown: &AtomicBool) {
        self.serve(stream, shutdown);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::{SocketAddr, TcpListener};
    use std::thread::{self, JoinHandle};

    use rstest::{fixture, rstest};
    use serde_json::json;

    use crate::host::{HostScheduler, ScheduledTask, StubSong};

    use super::*;

    struct InlineScheduler;

    impl HostScheduler for InlineScheduler {
        fn run_async(&self, task: ScheduledTask) {
            task();
        }

        fn is_on_scheduler_thread(&self) -> bool {
            false
        }
    }

    fn make_handler(max_message_bytes: usize) -> DispatchConnectionHandler {
        DispatchConnectionHandler::new(
            Arc::new(CommandRegistry::standard()),
            Arc::new(StubSong::demo()),
            MainThreadBridge::new(Arc::new(InlineScheduler), Duration::from_secs(1)),
            Duration::from_secs(5),
            max_message_bytes,
        )
    }

    /// One live connection served by a dispatch handler on a background
    /// thread.
    struct HandlerHarness {
        client: TcpStream,
        server: JoinHandle<()>,
    }

    impl HandlerHarness {
        fn spawn(max_message_bytes: usize) -> Self {
            let (listener, addr) = bind_listener();
            let server = thread::spawn(move || {
                let (stream, _) = listener.accept().expect("accept connection");
                let shutdown = AtomicBool::new(false);
                make_handler(max_message_bytes).handle(stream, &shutdown);
            });
            let client = TcpStream::connect(addr).expect("connect client");
            Self { client, server }
        }

        fn send_raw(&mut self, bytes: &[u8]) {
            self.client.write_all(bytes).expect("write request");
            self.client.flush().expect("flush request");
        }

        fn read_response(&mut self) -> Response {
            self.client
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("arm read timeout");
            let mut frames = FrameBuffer::new(1_048_576);
            let mut chunk = [0_u8; 1024];
            loop {
                let bytes_read = self.client.read(&mut chunk).expect("read response");
                assert!(bytes_read > 0, "server closed before responding");
                let received = chunk.get(..bytes_read).expect("chunk bounds");
                if let FrameProgress::Complete(value) =
                    frames.push_chunk(received).expect("no overflow")
                {
                    return serde_json::from_value(value).expect("valid response");
                }
            }
        }

        fn finish(self) {
            drop(self.client);
            self.server.join().expect("join server thread");
        }
    }

    fn bind_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        (listener, addr)
    }

    #[fixture]
    fn harness() -> HandlerHarness {
        HandlerHarness::spawn(1_048_576)
    }

    #[rstest]
    fn health_check_round_trips(mut harness: HandlerHarness) {
        harness.send_raw(br#"{"type":"health_check","params":{}}"#);
        match harness.read_response() {
            Response::Success { result } => assert_eq!(result["status"], "ok"),
            Response::Error { message } => panic!("unexpected error: {message}"),
        }
        harness.finish();
    }

    #[rstest]
    fn commands_split_across_writes_still_dispatch(mut harness: HandlerHarness) {
        harness.send_raw(br#"{"type":"get_ses"#);
        thread::sleep(Duration::from_millis(50));
        harness.send_raw(br#"sion_info","params":{}}"#);
        match harness.read_response() {
            Response::Success { result } => assert_eq!(result["track_count"], 2),
            Response::Error { message } => panic!("unexpected error: {message}"),
        }
        harness.finish();
    }

    #[rstest]
    fn responses_stay_ordered_on_one_connection(mut harness: HandlerHarness) {
        let set = json!({"type": "set_track_volume", "params": {"track_index": 0, "volume": 0.5}});
        harness.send_raw(&serde_json::to_vec(&set).expect("serialise"));
        match harness.read_response() {
            Response::Success { result } => assert_eq!(result["volume"], 0.5),
            Response::Error { message } => panic!("unexpected error: {message}"),
        }

        let get = json!({"type": "get_track_info", "params": {"track_index": 0}});
        harness.send_raw(&serde_json::to_vec(&get).expect("serialise"));
        match harness.read_response() {
            Response::Success { result } => assert_eq!(result["volume"], 0.5),
            Response::Error { message } => panic!("unexpected error: {message}"),
        }
        harness.finish();
    }

    #[rstest]
    fn unknown_commands_keep_the_connection_open(mut harness: HandlerHarness) {
        harness.send_raw(br#"{"type":"totally_bogus","params":{}}"#);
        match harness.read_response() {
            Response::Error { message } => assert!(message.contains("Unknown command")),
            Response::Success { .. } => panic!("bogus command must not succeed"),
        }

        // The same connection still serves valid commands.
        harness.send_raw(br#"{"type":"health_check","params":{}}"#);
        assert!(matches!(harness.read_response(), Response::Success { .. }));
        harness.finish();
    }

    #[rstest]
    fn non_object_envelope_is_a_protocol_error(mut harness: HandlerHarness) {
        harness.send_raw(b"[1,2,3]");
        match harness.read_response() {
            Response::Error { message } => assert!(message.contains("invalid command envelope")),
            Response::Success { .. } => panic!("array envelope must not succeed"),
        }
        harness.finish();
    }

    #[test]
    fn oversized_garbage_closes_the_connection_without_a_response() {
        let mut harness = HandlerHarness::spawn(64);
        harness.send_raw(&vec![b'"'; 1]);
        harness.send_raw(&vec![b'a'; 256]);

        harness
            .client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("arm read timeout");
        let mut chunk = [0_u8; 64];
        let bytes_read = harness.client.read(&mut chunk).expect("read after overflow");
        assert_eq!(bytes_read, 0, "server should close without responding");
        harness.finish();
    }
}
